use serde::{Deserialize, Serialize};

use mailcamp_campaigns::Recipients;
use mailcamp_core::TemplateId;

use super::dispatcher::DispatchError;

/// Values collected by the send form before a mailbox run.
///
/// Address overrides replace the template's rendered recipients for every
/// draft of the run; `None` keeps the rendered ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenValues {
    pub template_id: TemplateId,
    pub account: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub cc: Option<String>,
    #[serde(default)]
    pub bcc: Option<String>,
}

impl ScreenValues {
    pub fn new(template_id: TemplateId, account: impl Into<String>) -> Self {
        Self {
            template_id,
            account: account.into(),
            to: None,
            cc: None,
            bcc: None,
        }
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn with_cc(mut self, cc: impl Into<String>) -> Self {
        self.cc = Some(cc.into());
        self
    }

    pub fn with_bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc = Some(bcc.into());
        self
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.account.trim().is_empty() {
            return Err(DispatchError::InvalidScreenValues(
                "no sending account selected".to_string(),
            ));
        }
        Ok(())
    }

    /// Rendered recipients with the overrides applied.
    pub fn apply_overrides(&self, rendered: Recipients) -> Recipients {
        let pick = |over: &Option<String>, fallback: Vec<String>| match over {
            Some(expr) => Recipients::split_addresses(expr),
            None => fallback,
        };
        Recipients {
            to: pick(&self.to, rendered.to),
            cc: pick(&self.cc, rendered.cc),
            bcc: pick(&self.bcc, rendered.bcc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_account_is_rejected() {
        let screen = ScreenValues::new(TemplateId::new(), "  ");
        assert!(matches!(
            screen.validate(),
            Err(DispatchError::InvalidScreenValues(_))
        ));
        assert!(ScreenValues::new(TemplateId::new(), "sales@example.com").validate().is_ok());
    }

    #[test]
    fn overrides_replace_only_what_they_name() {
        let screen = ScreenValues::new(TemplateId::new(), "sales@example.com").with_cc("boss@example.com; audit@example.com");
        let rendered = Recipients {
            to: vec!["ada@example.com".into()],
            cc: vec!["old@example.com".into()],
            bcc: vec![],
        };

        let merged = screen.apply_overrides(rendered);
        assert_eq!(merged.to, vec!["ada@example.com".to_string()]);
        assert_eq!(
            merged.cc,
            vec!["boss@example.com".to_string(), "audit@example.com".to_string()]
        );
        assert!(merged.bcc.is_empty());
    }
}
