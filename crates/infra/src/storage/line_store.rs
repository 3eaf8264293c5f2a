use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use mailcamp_campaigns::{CampaignLine, RecordRef};
use mailcamp_core::{CampaignId, CampaignLineId};

use super::StoreError;

/// Campaign line storage.
///
/// Enforces one line per (campaign, record) pair, so two reconciliations racing
/// on the same campaign cannot both add a line for the same record.
pub trait LineStore: Send + Sync {
    /// Insert a new line. `Conflict` if the id or the (campaign, record) pair exists.
    fn insert(&self, line: CampaignLine) -> Result<(), StoreError>;
    fn get(&self, id: CampaignLineId) -> Result<Option<CampaignLine>, StoreError>;
    /// Replace an existing line. The record target of a line cannot change.
    fn update(&self, line: &CampaignLine) -> Result<(), StoreError>;
    /// Lines of one campaign in creation order.
    fn list_for_campaign(&self, campaign_id: CampaignId) -> Result<Vec<CampaignLine>, StoreError>;
}

impl<S> LineStore for Arc<S>
where
    S: LineStore + ?Sized,
{
    fn insert(&self, line: CampaignLine) -> Result<(), StoreError> {
        (**self).insert(line)
    }

    fn get(&self, id: CampaignLineId) -> Result<Option<CampaignLine>, StoreError> {
        (**self).get(id)
    }

    fn update(&self, line: &CampaignLine) -> Result<(), StoreError> {
        (**self).update(line)
    }

    fn list_for_campaign(&self, campaign_id: CampaignId) -> Result<Vec<CampaignLine>, StoreError> {
        (**self).list_for_campaign(campaign_id)
    }
}

#[derive(Debug, Default)]
struct Lines {
    by_id: BTreeMap<CampaignLineId, CampaignLine>,
    targets: HashSet<(CampaignId, RecordRef)>,
}

/// In-memory line store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryLineStore {
    inner: RwLock<Lines>,
}

impl InMemoryLineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineStore for InMemoryLineStore {
    fn insert(&self, line: CampaignLine) -> Result<(), StoreError> {
        let mut lines = self.inner.write().map_err(|_| StoreError::poisoned())?;
        if lines.by_id.contains_key(&line.id) {
            return Err(StoreError::Conflict(format!("line {} already exists", line.id)));
        }
        if let Some(record) = line.record_ref() {
            let key = (line.campaign_id, record.clone());
            if !lines.targets.insert(key) {
                return Err(StoreError::Conflict(format!(
                    "campaign {} already has a line for {record}",
                    line.campaign_id
                )));
            }
        }
        lines.by_id.insert(line.id, line);
        Ok(())
    }

    fn get(&self, id: CampaignLineId) -> Result<Option<CampaignLine>, StoreError> {
        let lines = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(lines.by_id.get(&id).cloned())
    }

    fn update(&self, line: &CampaignLine) -> Result<(), StoreError> {
        let mut lines = self.inner.write().map_err(|_| StoreError::poisoned())?;
        let existing = lines
            .by_id
            .get_mut(&line.id)
            .ok_or_else(|| StoreError::NotFound(format!("line {}", line.id)))?;
        if existing.campaign_id != line.campaign_id || existing.record_ref() != line.record_ref() {
            return Err(StoreError::Conflict(format!(
                "line {} cannot change campaign or record",
                line.id
            )));
        }
        *existing = line.clone();
        Ok(())
    }

    fn list_for_campaign(&self, campaign_id: CampaignId) -> Result<Vec<CampaignLine>, StoreError> {
        let lines = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(lines
            .by_id
            .values()
            .filter(|l| l.campaign_id == campaign_id)
            .cloned()
            .collect())
    }
}
