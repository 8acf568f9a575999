//! Event Store Runtime - Store handle and process-wide lifecycle
//!
//! Selects a backend by kind, wraps it in an [`EventStore`] handle with an
//! explicit operation list, and keeps at most one active store per process in
//! a [`StoreRegistry`].
//!
//! ## Lifecycle
//!
//! - Uninitialized: no active store. `EventStore::open` configures one.
//! - Ready: `open` returns the active store and ignores its options.
//! - `EventStore::reset` returns to uninitialized.

mod backend;
mod registry;
mod store;

pub use backend::{Backend, BackendKind};
pub use registry::StoreRegistry;
pub use store::EventStore;
