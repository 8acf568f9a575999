//! Event Store Storage - Pluggable backends for timestamped event records
//!
//! This crate provides the storage side of the event store:
//! - a capability trait every backend implements ([`EventBackend`]),
//! - a document backend on an embedded redb document store,
//! - an in-memory backend (for testing and ephemeral stores),
//! - the query/result engine shared by all backends.
//!
//! ## Architecture
//!
//! The storage layer follows a three-layer design:
//! - Layer 1: Document store (client, database, collection, time index)
//! - Layer 2: Capability interface (configure, insert, query, clear)
//! - Layer 3: Event operations (time normalization, classification,
//!   filter composition, cursor vs materialized results)

mod classify;
mod document_backend;
mod engine;
mod error;
mod filter;
mod memory;
mod options;
mod provider;
mod record;

#[cfg(test)]
mod testing;

pub mod document;
pub mod time;

pub use classify::{ClassifyFn, Classifier, RegexClassifier};
pub use document_backend::{DocumentBackend, DEFAULT_COLLECTION, DEFAULT_DB_NAME};
pub use engine::{prepare_record, EventCursor, EventInput, EventQuery, Events};
pub use error::{Result, StorageError};
pub use filter::{Filter, Sort};
pub use memory::InMemoryBackend;
pub use options::{CollectionSelector, ConnectionTarget, DatabaseSelector, StoreOptions, StorePolicy};
pub use provider::{EventBackend, StoredEvents};
pub use record::{EventRecord, FieldRef, StoredEvent, EVENT_FIELD, ID_FIELD, TIME_FIELD};
pub use time::TimeInput;
