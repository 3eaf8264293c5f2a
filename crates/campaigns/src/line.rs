use serde::{Deserialize, Serialize};

use mailcamp_core::{CampaignId, CampaignLineId, DomainError, DomainResult, Entity, MailId};

use crate::record::RecordRef;
use crate::state::DeliveryState;

/// What a campaign line points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineTarget {
    /// A mailbox entry created outside the campaign engine.
    Mail(MailId),
    /// A business record; the draft is rendered from it.
    Record(RecordRef),
}

/// One (campaign, recipient) tracking row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignLine {
    pub id: CampaignLineId,
    pub campaign_id: CampaignId,
    pub target: Option<LineTarget>,
    /// Draft rendered for a `Record` target.
    mail_id: Option<MailId>,
    /// Line-local state; superseded by the mail's state once a mail exists.
    state: DeliveryState,
    pub error: Option<String>,
}

impl CampaignLine {
    pub fn new(id: CampaignLineId, campaign_id: CampaignId) -> Self {
        Self {
            id,
            campaign_id,
            target: None,
            mail_id: None,
            state: DeliveryState::New,
            error: None,
        }
    }

    pub fn for_record(id: CampaignLineId, campaign_id: CampaignId, record: RecordRef) -> Self {
        Self {
            target: Some(LineTarget::Record(record)),
            ..Self::new(id, campaign_id)
        }
    }

    pub fn for_mail(id: CampaignLineId, campaign_id: CampaignId, mail_id: MailId) -> Self {
        Self {
            target: Some(LineTarget::Mail(mail_id)),
            ..Self::new(id, campaign_id)
        }
    }

    pub fn with_state(mut self, state: DeliveryState) -> Self {
        self.state = state;
        self
    }

    /// Mail backing this line, whichever way it was attached.
    pub fn mail_id(&self) -> Option<MailId> {
        match &self.target {
            Some(LineTarget::Mail(id)) => Some(*id),
            _ => self.mail_id,
        }
    }

    pub fn record_ref(&self) -> Option<&RecordRef> {
        match &self.target {
            Some(LineTarget::Record(r)) => Some(r),
            _ => None,
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    /// State inherited from the backing mail when there is one.
    pub fn effective_state(&self, mail_state: Option<DeliveryState>) -> DeliveryState {
        match (self.mail_id(), mail_state) {
            (Some(_), Some(state)) => state,
            _ => self.state,
        }
    }

    /// Needs a draft rendered from its record.
    pub fn awaits_draft(&self) -> bool {
        self.mail_id().is_none() && self.record_ref().is_some()
    }

    pub fn attach_mail(&mut self, mail_id: MailId, state: DeliveryState) -> DomainResult<()> {
        if let Some(existing) = self.mail_id() {
            return Err(DomainError::conflict(format!(
                "line {} already has mail {existing}",
                self.id
            )));
        }
        self.state = self.state.transition(state)?;
        self.mail_id = Some(mail_id);
        self.error = None;
        Ok(())
    }

    pub fn transition(&mut self, state: DeliveryState) -> DomainResult<()> {
        self.state = self.state.transition(state)?;
        Ok(())
    }

    pub fn mark_error(&mut self, message: impl Into<String>) -> DomainResult<()> {
        self.state = self.state.transition(DeliveryState::Error)?;
        self.error = Some(message.into());
        Ok(())
    }
}

impl Entity for CampaignLine {
    type Id = CampaignLineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailcamp_core::RecordId;

    fn test_record_line() -> CampaignLine {
        CampaignLine::for_record(
            CampaignLineId::new(),
            CampaignId::new(),
            RecordRef::new("res.partner", RecordId::new()),
        )
    }

    #[test]
    fn record_line_awaits_draft_until_mail_attached() {
        let mut line = test_record_line();
        assert!(line.awaits_draft());

        let mail_id = MailId::new();
        line.attach_mail(mail_id, DeliveryState::ToSend).unwrap();

        assert!(!line.awaits_draft());
        assert_eq!(line.mail_id(), Some(mail_id));
        assert_eq!(line.state(), DeliveryState::ToSend);
    }

    #[test]
    fn mail_line_reports_its_mail() {
        let mail_id = MailId::new();
        let line = CampaignLine::for_mail(CampaignLineId::new(), CampaignId::new(), mail_id);
        assert_eq!(line.mail_id(), Some(mail_id));
        assert!(line.record_ref().is_none());
        assert!(!line.awaits_draft());
    }

    #[test]
    fn attaching_twice_conflicts() {
        let mut line = test_record_line();
        line.attach_mail(MailId::new(), DeliveryState::New).unwrap();
        let err = line.attach_mail(MailId::new(), DeliveryState::New).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn effective_state_prefers_mail_state() {
        let mut line = test_record_line();
        assert_eq!(
            line.effective_state(Some(DeliveryState::Sent)),
            DeliveryState::New
        );

        line.attach_mail(MailId::new(), DeliveryState::ToSend).unwrap();
        assert_eq!(
            line.effective_state(Some(DeliveryState::Sent)),
            DeliveryState::Sent
        );
        assert_eq!(line.effective_state(None), DeliveryState::ToSend);
    }

    #[test]
    fn sent_line_cannot_be_marked_failed() {
        let mut line = test_record_line().with_state(DeliveryState::Sent);
        assert!(line.mark_error("smtp down").is_err());
        assert_eq!(line.state(), DeliveryState::Sent);
        assert!(line.error.is_none());
    }
}
