use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use mailcamp_campaigns::{Campaign, CampaignLine, DeliveryChannel, Mail};
use mailcamp_core::{CampaignId, CampaignLineId, DomainError, MailId};

use crate::error::DeliveryError;
use crate::render::{RenderError, TemplateRenderer};
use crate::signing::{CertifiedMailer, CertifiedMessage, CertifiedOutcome};
use crate::storage::{EntityStore, LineStore, StoreError, Stores};

/// Failure that stops a send run. Per-line failures never do.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineFailure {
    pub line_id: CampaignLineId,
    pub reason: String,
}

/// What a send run did for one campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub campaign_id: CampaignId,
    pub drafts_created: usize,
    pub certified: usize,
    pub failures: Vec<LineFailure>,
}

impl SendReport {
    fn new(campaign_id: CampaignId) -> Self {
        Self {
            campaign_id,
            drafts_created: 0,
            certified: 0,
            failures: Vec::new(),
        }
    }
}

enum LineResult {
    Drafted,
    Certified,
}

/// Creates drafts for lines that lack one and routes certified campaigns
/// through the signing service.
///
/// Each line is handled on its own: a failure is recorded on the line (and on
/// its mail, when one exists) and the run moves on.
pub struct CampaignSender {
    stores: Stores,
    renderer: Arc<dyn TemplateRenderer>,
    certified: Option<CertifiedMailer>,
    account: String,
}

impl CampaignSender {
    pub fn new(stores: Stores, renderer: Arc<dyn TemplateRenderer>, account: impl Into<String>) -> Self {
        Self {
            stores,
            renderer,
            certified: None,
            account: account.into(),
        }
    }

    pub fn with_certified(mut self, mailer: CertifiedMailer) -> Self {
        self.certified = Some(mailer);
        self
    }

    pub fn send_emails(&self, campaign_ids: &[CampaignId]) -> Result<Vec<SendReport>, SendError> {
        campaign_ids.iter().map(|id| self.send_campaign(*id)).collect()
    }

    fn send_campaign(&self, campaign_id: CampaignId) -> Result<SendReport, SendError> {
        let campaign = self.stores.campaign(campaign_id)?;
        let pending: Vec<CampaignLine> = self
            .stores
            .lines
            .list_for_campaign(campaign_id)?
            .into_iter()
            .filter(CampaignLine::awaits_draft)
            .collect();

        info!(campaign_id = %campaign_id, lines = pending.len(), channel = ?campaign.channel, "sending campaign");

        let mut report = SendReport::new(campaign_id);
        for mut line in pending {
            match self.send_line(&campaign, &mut line) {
                Ok(LineResult::Drafted) => report.drafts_created += 1,
                Ok(LineResult::Certified) => {
                    report.drafts_created += 1;
                    report.certified += 1;
                }
                Err(error) => {
                    warn!(campaign_id = %campaign_id, line_id = %line.id, error = %error, "campaign line failed");
                    if line.mail_id().is_some() {
                        report.drafts_created += 1;
                    }
                    self.record_failure(&mut line, &error.to_string());
                    report.failures.push(LineFailure {
                        line_id: line.id,
                        reason: error.to_string(),
                    });
                }
            }
        }

        info!(
            campaign_id = %campaign_id,
            drafts = report.drafts_created,
            certified = report.certified,
            failed = report.failures.len(),
            "campaign sent"
        );
        Ok(report)
    }

    fn send_line(&self, campaign: &Campaign, line: &mut CampaignLine) -> Result<LineResult, DeliveryError> {
        let Some(reference) = line.record_ref().cloned() else {
            return Err(DomainError::invariant(format!("line {} has no record to render", line.id)).into());
        };

        let mut rendered = self.renderer.render(campaign.template_id, std::slice::from_ref(&reference))?;
        if rendered.len() != 1 {
            return Err(RenderError::Misaligned {
                expected: 1,
                actual: rendered.len(),
            }
            .into());
        }
        let message = rendered.remove(0);

        let mut mail = Mail::draft(MailId::new(), &self.account, message.subject, Utc::now());
        mail.body_text = message.body_text;
        mail.body_html = message.body_html;
        mail.recipients = message.recipients;
        mail.attachments = message.attachments;
        mail.reference = Some(reference);
        self.stores.mails.upsert(mail.id, mail.clone())?;

        line.attach_mail(mail.id, mail.state())?;
        self.stores.lines.update(line)?;

        if campaign.channel == DeliveryChannel::Plain {
            return Ok(LineResult::Drafted);
        }

        let mailer = self.certified.as_ref().ok_or(DeliveryError::CertifiedUnavailable)?;
        match mailer.send(CertifiedMessage::from_mail(&mail))? {
            CertifiedOutcome::Processed { .. } => Ok(LineResult::Certified),
            CertifiedOutcome::Unrecorded => Ok(LineResult::Drafted),
            CertifiedOutcome::Rejected(reason) => Err(DeliveryError::Rejected(reason)),
        }
    }

    /// Best effort: a store failure here is logged, not raised.
    fn record_failure(&self, line: &mut CampaignLine, reason: &str) {
        if let Some(mail_id) = line.mail_id() {
            if let Err(e) = self.mark_mail_error(mail_id, reason) {
                warn!(mail_id = %mail_id, error = %e, "could not record failure on mail");
            }
        }

        if line.mark_error(reason).is_ok() {
            if let Err(e) = self.stores.lines.update(line) {
                warn!(line_id = %line.id, error = %e, "could not record failure on line");
            }
        }
    }

    fn mark_mail_error(&self, mail_id: MailId, reason: &str) -> Result<(), StoreError> {
        let Some(mut mail) = self.stores.mails.get(&mail_id)? else {
            return Ok(());
        };
        // A mail that already went out keeps its state.
        if mail.mark_error(reason).is_ok() {
            self.stores.mails.upsert(mail_id, mail)?;
        }
        Ok(())
    }
}
