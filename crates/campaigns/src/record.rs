use core::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use mailcamp_core::{DomainError, Entity, RecordId, ValueObject};

static NULL: JsonValue = JsonValue::Null;

/// Pointer to a business record: model name + record id.
///
/// Renders as `model,id` (e.g. `res.partner,0190...`), which is also the form
/// accepted by `FromStr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub model: String,
    pub id: RecordId,
}

impl RecordRef {
    pub fn new(model: impl Into<String>, id: RecordId) -> Self {
        Self {
            model: model.into(),
            id,
        }
    }
}

impl ValueObject for RecordRef {}

impl core::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{},{}", self.model, self.id)
    }
}

impl FromStr for RecordRef {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (model, id) = s
            .split_once(',')
            .ok_or_else(|| DomainError::invalid_id(format!("record reference without comma: {s}")))?;
        let model = model.trim();
        if model.is_empty() {
            return Err(DomainError::invalid_id(format!(
                "record reference without model: {s}"
            )));
        }
        Ok(Self::new(model, id.parse()?))
    }
}

/// A business record as seen by the campaign engine: an id plus a flat field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: Map<String, JsonValue>,
}

impl Record {
    pub fn new(id: RecordId, fields: Map<String, JsonValue>) -> Self {
        Self { id, fields }
    }

    /// Field value, `Null` when the field is absent.
    pub fn field(&self, name: &str) -> &JsonValue {
        self.fields.get(name).unwrap_or(&NULL)
    }

    /// Field value as a string, if it is one.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(JsonValue::as_str)
    }
}

impl Entity for Record {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
