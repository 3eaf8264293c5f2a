use serde::Serialize;

use mailcamp_campaigns::{LineProgress, Progress};
use mailcamp_core::CampaignId;

use crate::storage::{EntityStore, LineStore, StoreError, Stores};

/// Read model of one campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignOverview {
    pub campaign_id: CampaignId,
    pub name: String,
    /// Effective target model, empty when the template has none.
    pub template_obj: String,
    pub lines: usize,
    pub progress_created: f64,
    pub progress_sent: f64,
}

/// Progress metrics, recomputed from the lines on every call.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    stores: Stores,
}

impl ProgressAggregator {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub fn progress(&self, campaign_id: CampaignId) -> Result<Progress, StoreError> {
        let lines = self.stores.lines.list_for_campaign(campaign_id)?;
        let mut tally = Vec::with_capacity(lines.len());
        for line in &lines {
            let mail_state = match line.mail_id() {
                Some(mail_id) => self.stores.mails.get(&mail_id)?.map(|m| m.state()),
                None => None,
            };
            tally.push(LineProgress {
                has_mail: line.mail_id().is_some(),
                effective_state: line.effective_state(mail_state),
            });
        }
        Ok(Progress::tally(tally))
    }

    /// Percentage of lines that have a mail.
    pub fn progress_created(&self, campaign_id: CampaignId) -> Result<f64, StoreError> {
        Ok(self.progress(campaign_id)?.created_percent())
    }

    /// Percentage of lines whose effective state is `sent`.
    pub fn progress_sent(&self, campaign_id: CampaignId) -> Result<f64, StoreError> {
        Ok(self.progress(campaign_id)?.sent_percent())
    }

    pub fn overview(&self, campaign_id: CampaignId) -> Result<CampaignOverview, StoreError> {
        let campaign = self.stores.campaign(campaign_id)?;
        let template = self.stores.template(campaign.template_id)?;
        let progress = self.progress(campaign_id)?;

        Ok(CampaignOverview {
            campaign_id,
            template_obj: campaign.template_obj(template.as_ref()).to_string(),
            name: campaign.name,
            lines: progress.total,
            progress_created: progress.created_percent(),
            progress_sent: progress.sent_percent(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    use mailcamp_campaigns::{Campaign, CampaignLine, DeliveryState, Mail, Template};
    use mailcamp_core::{CampaignLineId, MailId, TemplateId};

    use crate::records::RecordStoreRegistry;

    fn stores() -> Stores {
        Stores::in_memory(RecordStoreRegistry::new())
    }

    fn draft(stores: &Stores, state: DeliveryState) -> MailId {
        let mut mail = Mail::draft(MailId::new(), "sales@example.com", "Prova", Utc::now());
        mail.transition(state).unwrap();
        let id = mail.id;
        stores.mails.upsert(id, mail).unwrap();
        id
    }

    fn line(stores: &Stores, build: impl FnOnce(CampaignLineId) -> CampaignLine) {
        stores.lines.insert(build(CampaignLineId::new())).unwrap();
    }

    #[test]
    fn created_counts_lines_with_a_mail() {
        let stores = stores();
        let aggregator = ProgressAggregator::new(stores.clone());
        let mail = draft(&stores, DeliveryState::ToSend);

        let full = CampaignId::new();
        line(&stores, |id| CampaignLine::for_mail(id, full, mail));
        line(&stores, |id| CampaignLine::for_mail(id, full, mail));

        let half = CampaignId::new();
        line(&stores, |id| CampaignLine::for_mail(id, half, mail));
        line(&stores, |id| CampaignLine::new(id, half));

        assert_eq!(aggregator.progress_created(full).unwrap(), 100.0);
        assert_eq!(aggregator.progress_created(half).unwrap(), 50.0);
        assert_eq!(aggregator.progress_created(CampaignId::new()).unwrap(), 0.0);
    }

    #[test]
    fn sent_uses_line_state_without_a_mail() {
        let stores = stores();
        let aggregator = ProgressAggregator::new(stores.clone());

        let full = CampaignId::new();
        line(&stores, |id| CampaignLine::new(id, full).with_state(DeliveryState::Sent));
        line(&stores, |id| CampaignLine::new(id, full).with_state(DeliveryState::Sent));

        let half = CampaignId::new();
        line(&stores, |id| CampaignLine::new(id, half).with_state(DeliveryState::Sent));
        line(&stores, |id| CampaignLine::new(id, half).with_state(DeliveryState::ToSend));

        assert_eq!(aggregator.progress_sent(full).unwrap(), 100.0);
        assert_eq!(aggregator.progress_sent(half).unwrap(), 50.0);
        assert_eq!(aggregator.progress_sent(CampaignId::new()).unwrap(), 0.0);
    }

    #[test]
    fn sent_follows_the_mail_and_is_never_cached() {
        let stores = stores();
        let aggregator = ProgressAggregator::new(stores.clone());
        let mail_id = draft(&stores, DeliveryState::ToSend);
        let campaign = CampaignId::new();
        // Line-local state says sent, the mail does not.
        line(&stores, |id| {
            CampaignLine::for_mail(id, campaign, mail_id).with_state(DeliveryState::Sent)
        });

        assert_eq!(aggregator.progress_sent(campaign).unwrap(), 0.0);

        let mut mail = stores.mails.get(&mail_id).unwrap().unwrap();
        mail.transition(DeliveryState::Sent).unwrap();
        stores.mails.upsert(mail_id, mail).unwrap();

        assert_eq!(aggregator.progress_sent(campaign).unwrap(), 100.0);
    }

    #[test]
    fn overview_reports_template_obj() {
        let stores = stores();
        let with_model = TemplateId::new();
        let without_model = TemplateId::new();
        stores
            .templates
            .upsert(with_model, Template::new(with_model, "a").with_model("res.partner"))
            .unwrap();
        stores
            .templates
            .upsert(without_model, Template::new(without_model, "b"))
            .unwrap();

        let first = Campaign::new(CampaignId::new(), "first", with_model, Utc::now()).unwrap();
        let second = Campaign::new(CampaignId::new(), "second", without_model, Utc::now()).unwrap();
        stores.campaigns.upsert(first.id, first.clone()).unwrap();
        stores.campaigns.upsert(second.id, second.clone()).unwrap();

        let aggregator = ProgressAggregator::new(stores);
        let overview = aggregator.overview(first.id).unwrap();
        assert_eq!(overview.template_obj, "res.partner");
        assert_eq!(overview.lines, 0);
        assert_eq!(overview.progress_created, 0.0);
        assert_eq!(aggregator.overview(second.id).unwrap().template_obj, "");

        assert!(matches!(
            aggregator.overview(CampaignId::new()),
            Err(StoreError::NotFound(_))
        ));
    }
}
