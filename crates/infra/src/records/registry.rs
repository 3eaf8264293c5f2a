use std::collections::BTreeMap;
use std::sync::Arc;

use mailcamp_campaigns::{Record, RecordRef};

use super::store::RecordStore;
use crate::error::ConfigurationError;
use crate::storage::StoreError;

/// Record stores keyed by model name, assembled once at startup.
#[derive(Default)]
pub struct RecordStoreRegistry {
    stores: BTreeMap<String, Arc<dyn RecordStore>>,
}

impl RecordStoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store under its own model name, replacing any previous one.
    pub fn register(&mut self, store: Arc<dyn RecordStore>) {
        self.stores.insert(store.model().to_string(), store);
    }

    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.register(store);
        self
    }

    pub fn resolve(&self, model: &str) -> Result<Arc<dyn RecordStore>, ConfigurationError> {
        self.stores
            .get(model)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownModel(model.to_string()))
    }

    pub fn models(&self) -> Vec<&str> {
        self.stores.keys().map(String::as_str).collect()
    }

    /// Read the record a reference points at; `Ok(None)` if it no longer exists.
    pub fn read(&self, reference: &RecordRef) -> Result<Option<Record>, ReadError> {
        let store = self.resolve(&reference.model)?;
        Ok(store.read(reference.id)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
