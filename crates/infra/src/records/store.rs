use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::{Map, Value as JsonValue};

use mailcamp_campaigns::{Domain, Record};
use mailcamp_core::RecordId;

use crate::storage::StoreError;

/// Search/CRUD capability over the records of one model.
pub trait RecordStore: Send + Sync {
    /// Model name this store serves (e.g. `res.partner`).
    fn model(&self) -> &str;

    /// Ids of the records matching `domain`, in id order.
    fn search(&self, domain: &Domain) -> Result<Vec<RecordId>, StoreError>;

    fn read(&self, id: RecordId) -> Result<Option<Record>, StoreError>;

    fn create(&self, fields: Map<String, JsonValue>) -> Result<RecordId, StoreError>;

    /// Merge `fields` into an existing record.
    fn write(&self, id: RecordId, fields: Map<String, JsonValue>) -> Result<(), StoreError>;
}

/// In-memory record store for tests/dev.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    model: String,
    records: RwLock<BTreeMap<RecordId, Map<String, JsonValue>>>,
}

impl InMemoryRecordStore {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            records: RwLock::new(BTreeMap::new()),
        }
    }
}

impl RecordStore for InMemoryRecordStore {
    fn model(&self) -> &str {
        &self.model
    }

    fn search(&self, domain: &Domain) -> Result<Vec<RecordId>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::poisoned())?;
        Ok(records
            .iter()
            .filter(|(_, fields)| domain.matches(fields))
            .map(|(id, _)| *id)
            .collect())
    }

    fn read(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::poisoned())?;
        Ok(records.get(&id).map(|fields| Record::new(id, fields.clone())))
    }

    fn create(&self, fields: Map<String, JsonValue>) -> Result<RecordId, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::poisoned())?;
        let id = RecordId::new();
        records.insert(id, fields);
        Ok(id)
    }

    fn write(&self, id: RecordId, fields: Map<String, JsonValue>) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::poisoned())?;
        let existing = records
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("{},{id}", self.model)))?;
        existing.extend(fields);
        Ok(())
    }
}
