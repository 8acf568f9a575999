//! Event Store - Timestamped event records with time-range and field queries
//!
//! This is the root workspace crate that provides integration tests.
//! The implementation lives in the workspace member crates.

// Re-export main crates for convenience
pub use eventstore_runtime as runtime;
pub use eventstore_storage as storage;

pub use eventstore_runtime::{BackendKind, EventStore, StoreRegistry};
pub use eventstore_storage::{
    EventInput, EventQuery, EventRecord, Events, Filter, RegexClassifier, Result, StorageError,
    StoreOptions,
};
