//! The record envelope.
//!
//! The core only reads `id`, `name` and `updatedAt`; everything else a
//! record carries is kept verbatim in `body`.

use armylist_types::{RecordId, SyncTimestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored army list, custom unit or custom detachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<SyncTimestamp>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new(id: RecordId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            updated_at: None,
            body: Map::new(),
        }
    }

    /// Sets one opaque field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body.insert(key.into(), value);
        self
    }

    /// Decodes a record stored under `key`, tolerating foreign shapes.
    ///
    /// A missing or non-string `id` falls back to `key`. A `name` or
    /// `updatedAt` that cannot be read is dropped. An `updatedAt` in epoch
    /// milliseconds is accepted. Returns `None` only for non-object values.
    pub fn from_stored(key: &str, value: &Value) -> Option<Self> {
        let Value::Object(fields) = value else {
            return None;
        };
        let mut body = fields.clone();
        let id = match body.remove("id") {
            Some(Value::String(id)) => RecordId::from_string(id),
            _ => RecordId::from(key),
        };
        let name = match body.remove("name") {
            Some(Value::String(name)) => name,
            _ => String::new(),
        };
        let updated_at = body.remove("updatedAt").and_then(|stamp| match stamp {
            Value::String(s) => SyncTimestamp::parse(&s).ok(),
            Value::Number(n) => n.as_i64().map(SyncTimestamp::from_millis),
            _ => None,
        });
        Some(Self {
            id,
            name,
            updated_at,
            body,
        })
    }
}

/// One entry of a category's metadata index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordIndexEntry {
    pub id: RecordId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<SyncTimestamp>,
}

impl From<&Record> for RecordIndexEntry {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            updated_at: record.updated_at,
        }
    }
}
