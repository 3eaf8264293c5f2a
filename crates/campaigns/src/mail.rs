use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mailcamp_core::{DomainResult, Entity, MailId};

use crate::record::RecordRef;
use crate::state::DeliveryState;

/// Mailbox folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Folder {
    Inbox,
    Drafts,
    Outbox,
    Sent,
    Trash,
    Followup,
}

/// Address lists of a message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Recipients {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
}

impl Recipients {
    pub fn only_to(addresses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            to: addresses.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Split a `a@x, b@y; c@z` address expression.
    pub fn split_addresses(expr: &str) -> Vec<String> {
        expr.split([',', ';'])
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificationState {
    Pending,
    EmailProcessed,
}

/// Receipt of a certified delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certification {
    pub signature_id: String,
    pub state: CertificationState,
}

/// Mailbox entry: a rendered message, draft or delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mail {
    pub id: MailId,
    pub account: String,
    pub folder: Folder,
    state: DeliveryState,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    pub recipients: Recipients,
    /// File name to base64 content.
    #[serde(default)]
    pub attachments: BTreeMap<String, String>,
    /// Record the message was rendered from.
    pub reference: Option<RecordRef>,
    pub certification: Option<Certification>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Mail {
    /// New draft in the drafts folder.
    pub fn draft(
        id: MailId,
        account: impl Into<String>,
        subject: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account: account.into(),
            folder: Folder::Drafts,
            state: DeliveryState::ToSend,
            subject: subject.into(),
            body_text: String::new(),
            body_html: None,
            recipients: Recipients::default(),
            attachments: BTreeMap::new(),
            reference: None,
            certification: None,
            error: None,
            created_at,
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    pub fn transition(&mut self, state: DeliveryState) -> DomainResult<()> {
        self.state = self.state.transition(state)?;
        Ok(())
    }

    /// Signing service accepted the message.
    pub fn mark_certified(&mut self, signature_id: impl Into<String>) {
        self.certification = Some(Certification {
            signature_id: signature_id.into(),
            state: CertificationState::EmailProcessed,
        });
    }

    pub fn mark_error(&mut self, message: impl Into<String>) -> DomainResult<()> {
        self.state = self.state.transition(DeliveryState::Error)?;
        self.error = Some(message.into());
        Ok(())
    }
}

impl Entity for Mail {
    type Id = MailId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
