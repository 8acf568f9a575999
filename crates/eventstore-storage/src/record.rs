//! Event record schema for storage

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::time::{express, format_time};
use crate::{Result, StorageError};

/// Field holding the event timestamp
pub const TIME_FIELD: &str = "time";

/// Field holding the event payload
pub const EVENT_FIELD: &str = "event";

/// Backend-assigned identifier, never returned to callers
pub const ID_FIELD: &str = "_id";

/// Names an extra field may not take
pub const RESERVED_FIELDS: [&str; 3] = [TIME_FIELD, EVENT_FIELD, ID_FIELD];

/// A stored event as seen by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event time, UTC or the store's configured offset
    pub time: DateTime<FixedOffset>,

    /// Payload: a string or any JSON value
    pub event: Value,

    /// Extra fields supplied at write time, stored flat beside `time` and `event`
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A borrowed view of one field of a record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRef<'a> {
    Time(DateTime<FixedOffset>),
    Value(&'a Value),
}

impl EventRecord {
    /// Create a record with no extra fields
    pub fn new(time: DateTime<Utc>, event: impl Into<Value>) -> Self {
        Self {
            time: express(time, None),
            event: event.into(),
            fields: Map::new(),
        }
    }

    /// Add an extra field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// The event time as a UTC instant
    pub fn instant(&self) -> DateTime<Utc> {
        self.time.with_timezone(&Utc)
    }

    /// Look up an extra field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Look up any field by name, including `time` and `event`
    pub fn get(&self, name: &str) -> Option<FieldRef<'_>> {
        match name {
            TIME_FIELD => Some(FieldRef::Time(self.time)),
            EVENT_FIELD => Some(FieldRef::Value(&self.event)),
            _ => self.fields.get(name).map(FieldRef::Value),
        }
    }

    /// Build the stored document for this record under `id`
    ///
    /// `time` and `event` are written after the extra fields, so they win
    /// over any colliding extra field.
    pub fn to_document(&self, id: u64) -> Map<String, Value> {
        let mut doc = Map::with_capacity(self.fields.len() + 3);
        doc.insert(ID_FIELD.to_string(), Value::from(id));
        for (name, value) in &self.fields {
            if name != ID_FIELD {
                doc.insert(name.clone(), value.clone());
            }
        }
        doc.insert(TIME_FIELD.to_string(), Value::String(format_time(&self.instant())));
        doc.insert(EVENT_FIELD.to_string(), self.event.clone());
        doc
    }
}

/// A record together with its backend-assigned identifier
///
/// Only backends and the query engine see this type; the engine strips the
/// identifier before anything reaches a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub id: u64,
    pub record: EventRecord,
}

impl StoredEvent {
    /// Decode a stored document, expressing its time in `zone`
    pub fn from_document(mut doc: Map<String, Value>, zone: Option<FixedOffset>) -> Result<Self> {
        let id = doc
            .remove(ID_FIELD)
            .and_then(|v| v.as_u64())
            .ok_or_else(|| StorageError::CorruptDocument {
                id: 0,
                reason: "missing identifier".to_string(),
            })?;

        let time = match doc.remove(TIME_FIELD) {
            Some(Value::String(text)) => DateTime::parse_from_rfc3339(&text)
                .map_err(|e| StorageError::CorruptDocument {
                    id,
                    reason: format!("bad time '{}': {}", text, e),
                })?
                .with_timezone(&Utc),
            _ => {
                return Err(StorageError::CorruptDocument {
                    id,
                    reason: "missing time".to_string(),
                })
            }
        };

        let event = doc.remove(EVENT_FIELD).ok_or_else(|| StorageError::CorruptDocument {
            id,
            reason: "missing event".to_string(),
        })?;

        Ok(Self {
            id,
            record: EventRecord {
                time: express(time, zone),
                event,
                fields: doc,
            },
        })
    }

    /// Re-express the record time in `zone`
    pub fn in_zone(mut self, zone: Option<FixedOffset>) -> Self {
        self.record.time = express(self.record.instant(), zone);
        self
    }
}
