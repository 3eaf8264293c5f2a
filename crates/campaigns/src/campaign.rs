use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mailcamp_core::{CampaignId, DomainError, DomainResult, Entity, TemplateId};

use crate::domain::{Domain, PredicateError};
use crate::template::Template;

/// How the lines of a campaign are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    /// Draft is created and left to the regular outbound transport.
    #[default]
    Plain,
    /// Rendered content goes through the signing service for an audit trail.
    Certified,
}

/// A named bulk-send effort: one template, one recipient-selection domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub template_id: TemplateId,
    /// Stored domain text; blank means no automatic recipient discovery.
    pub domain: String,
    pub channel: DeliveryChannel,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(
        id: CampaignId,
        name: impl Into<String>,
        template_id: TemplateId,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("campaign name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            template_id,
            domain: String::new(),
            channel: DeliveryChannel::Plain,
            created_at,
        })
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_channel(mut self, channel: DeliveryChannel) -> Self {
        self.channel = channel;
        self
    }

    /// Effective target model: the template's model, else the empty string.
    pub fn template_obj<'t>(&self, template: Option<&'t Template>) -> &'t str {
        template
            .filter(|t| t.id == self.template_id)
            .and_then(Template::model_name)
            .unwrap_or("")
    }

    /// Parse the stored domain. `Ok(None)` when no domain is set.
    pub fn parsed_domain(&self) -> Result<Option<Domain>, PredicateError> {
        if self.domain.trim().is_empty() {
            return Ok(None);
        }
        Domain::parse(&self.domain).map(Some)
    }
}

impl Entity for Campaign {
    type Id = CampaignId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_campaign(template_id: TemplateId) -> Campaign {
        Campaign::new(CampaignId::new(), "Spring newsletter", template_id, Utc::now()).unwrap()
    }

    #[test]
    fn template_obj_follows_template_model() {
        let with_model = Template::new(TemplateId::new(), "t1").with_model("res.partner");
        let without_model = Template::new(TemplateId::new(), "t2");

        let c1 = test_campaign(with_model.id);
        let c2 = test_campaign(without_model.id);

        assert_eq!(c1.template_obj(Some(&with_model)), "res.partner");
        assert_eq!(c2.template_obj(Some(&without_model)), "");
        assert_eq!(c1.template_obj(None), "");
    }

    #[test]
    fn template_obj_ignores_foreign_template() {
        let other = Template::new(TemplateId::new(), "other").with_model("res.partner");
        let campaign = test_campaign(TemplateId::new());
        assert_eq!(campaign.template_obj(Some(&other)), "");
    }

    #[test]
    fn blank_domain_means_no_discovery() {
        let campaign = test_campaign(TemplateId::new()).with_domain("   ");
        assert_eq!(campaign.parsed_domain(), Ok(None));
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = Campaign::new(CampaignId::new(), " ", TemplateId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
