//! Entity storage abstractions (campaigns, templates, mails, lines).
//!
//! The in-memory implementations back tests and local runs; a durable backend
//! plugs in behind the same traits.

pub mod entity_store;
pub mod line_store;

use std::sync::Arc;

use thiserror::Error;

use mailcamp_campaigns::{Campaign, Mail, Template};
use mailcamp_core::{CampaignId, MailId, TemplateId};

use crate::records::RecordStoreRegistry;

pub use entity_store::{EntityStore, InMemoryEntityStore};
pub use line_store::{InMemoryLineStore, LineStore};

/// Storage failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        Self::Storage("lock poisoned".to_string())
    }
}

/// Every store the campaign engine touches, shareable across worker threads.
#[derive(Clone)]
pub struct Stores {
    pub campaigns: Arc<dyn EntityStore<CampaignId, Campaign>>,
    pub templates: Arc<dyn EntityStore<TemplateId, Template>>,
    pub mails: Arc<dyn EntityStore<MailId, Mail>>,
    pub lines: Arc<dyn LineStore>,
    pub records: Arc<RecordStoreRegistry>,
}

impl Stores {
    /// In-memory stores around an existing record registry.
    pub fn in_memory(records: RecordStoreRegistry) -> Self {
        Self {
            campaigns: Arc::new(InMemoryEntityStore::<CampaignId, Campaign>::new()),
            templates: Arc::new(InMemoryEntityStore::<TemplateId, Template>::new()),
            mails: Arc::new(InMemoryEntityStore::<MailId, Mail>::new()),
            lines: Arc::new(InMemoryLineStore::new()),
            records: Arc::new(records),
        }
    }

    pub fn campaign(&self, id: CampaignId) -> Result<Campaign, StoreError> {
        self.campaigns
            .get(&id)?
            .ok_or_else(|| StoreError::NotFound(format!("campaign {id}")))
    }

    pub fn template(&self, id: TemplateId) -> Result<Option<Template>, StoreError> {
        self.templates.get(&id)
    }
}

impl core::fmt::Debug for Stores {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stores")
            .field("models", &self.records.models())
            .finish_non_exhaustive()
    }
}
