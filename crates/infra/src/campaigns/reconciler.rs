use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info};

use mailcamp_campaigns::{CampaignLine, PredicateError, RecordRef};
use mailcamp_core::{CampaignId, CampaignLineId, RecordId};

use crate::error::ConfigurationError;
use crate::records::RecordStore;
use crate::storage::{LineStore, StoreError, Stores};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Predicate(#[from] PredicateError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Brings a campaign's lines up to date with its domain.
///
/// Create-only: lines of records that stopped matching are kept, along with
/// their state.
#[derive(Debug, Clone)]
pub struct LineReconciler {
    stores: Stores,
}

impl LineReconciler {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Add one line per matching record not yet on the campaign. Returns the
    /// number of lines added.
    ///
    /// A campaign without a domain, or whose template has no model, is left
    /// alone.
    pub fn reconcile(&self, campaign_id: CampaignId) -> Result<usize, ReconcileError> {
        let campaign = self.stores.campaign(campaign_id)?;
        if campaign.domain.trim().is_empty() {
            debug!(campaign_id = %campaign_id, "campaign has no domain; nothing to reconcile");
            return Ok(0);
        }

        let template = self
            .stores
            .template(campaign.template_id)?
            .ok_or(ConfigurationError::MissingTemplate(campaign.template_id))?;
        let Some(model) = template.model_name() else {
            debug!(campaign_id = %campaign_id, "template has no model; nothing to reconcile");
            return Ok(0);
        };

        let Some(domain) = campaign.parsed_domain()? else {
            return Ok(0);
        };
        let records = self.stores.records.resolve(model)?;

        info!(campaign_id = %campaign_id, model = model, "reconciling campaign lines");

        let candidates = records.search(&domain)?;
        let existing: HashSet<RecordId> = self
            .stores
            .lines
            .list_for_campaign(campaign_id)?
            .iter()
            .filter_map(CampaignLine::record_ref)
            .filter(|r| r.model == model)
            .map(|r| r.id)
            .collect();

        let mut added = 0;
        for record_id in candidates.into_iter().filter(|id| !existing.contains(id)) {
            let line = CampaignLine::for_record(
                CampaignLineId::new(),
                campaign_id,
                RecordRef::new(model, record_id),
            );
            match self.stores.lines.insert(line) {
                Ok(()) => added += 1,
                // Another reconcile got there first.
                Err(StoreError::Conflict(reason)) => {
                    debug!(campaign_id = %campaign_id, record_id = %record_id, reason = %reason, "line already exists");
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(campaign_id = %campaign_id, added, "campaign lines reconciled");
        Ok(added)
    }

    /// Reconcile several campaigns, stopping at the first failure.
    pub fn reconcile_many(&self, campaign_ids: &[CampaignId]) -> Result<usize, ReconcileError> {
        let mut total = 0;
        for id in campaign_ids {
            total += self.reconcile(*id)?;
        }
        Ok(total)
    }
}
