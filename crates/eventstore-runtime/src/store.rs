//! Event store handle
//!
//! `EventStore` is a cheap-to-clone handle over one configured backend. It
//! exposes a fixed set of operations and forwards each one to the backend
//! unchanged.
//!
//! Two ways to get one:
//! - [`EventStore::new`] builds an independent store owned by the caller.
//! - [`EventStore::open`] goes through the process-wide registry: the first
//!   call configures the store, later calls return the same store and ignore
//!   their options until [`EventStore::reset`].

use std::sync::Arc;

use eventstore_storage::{
    EventBackend, EventInput, EventQuery, Events, Result, StoreOptions, StorePolicy,
};

use crate::backend::{Backend, BackendKind};
use crate::registry::StoreRegistry;

/// Handle to a configured event store
#[derive(Debug, Clone)]
pub struct EventStore {
    backend: Arc<Backend>,
}

impl EventStore {
    // ========== Construction ==========

    /// Build and configure a store that is not shared through the registry
    pub fn new(kind: BackendKind, options: StoreOptions) -> Result<Self> {
        let mut backend = Backend::new(kind);
        backend.configure(options)?;
        Ok(Self {
            backend: Arc::new(backend),
        })
    }

    /// The process-wide store, configuring it on first use
    pub fn open(kind: BackendKind, options: StoreOptions) -> Result<Self> {
        StoreRegistry::global().get_or_init(|| Self::new(kind, options))
    }

    /// Like [`EventStore::open`] with the kind given by name
    ///
    /// The name is only parsed when the store is actually configured, so an
    /// unknown kind is ignored while a store is active.
    pub fn open_named(kind: &str, options: StoreOptions) -> Result<Self> {
        StoreRegistry::global().get_or_init(|| Self::new(kind.parse()?, options))
    }

    /// The process-wide store, if one is active
    pub fn current() -> Option<Self> {
        StoreRegistry::global().current()
    }

    /// Discard the process-wide store
    ///
    /// Handles obtained earlier keep working on the old backend. Returns
    /// whether a store was active.
    pub fn reset() -> bool {
        StoreRegistry::global().reset()
    }

    // ========== Accessors ==========

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn policy(&self) -> Result<&StorePolicy> {
        self.backend.policy()
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// True when both handles share one backend
    pub fn same_store(&self, other: &EventStore) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
    }

    // ========== Operations ==========

    /// Store one event
    pub fn set_event(&self, input: EventInput) -> Result<()> {
        self.backend.store_event(input)
    }

    /// Store events in order, stopping at the first failure
    pub fn set_events(&self, inputs: Vec<EventInput>) -> Result<usize> {
        self.backend.store_events(inputs)
    }

    /// Query events
    pub fn get_events(&self, query: &EventQuery) -> Result<Events> {
        self.backend.get_events(query)
    }

    /// Remove every event; requires a deletable store
    pub fn clear_all_events(&self) -> Result<()> {
        self.backend.clear_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use eventstore_storage::{Filter, StorageError};
    use serde_json::json;

    fn memory(options: StoreOptions) -> EventStore {
        EventStore::new(BackendKind::Memory, options).unwrap()
    }

    #[test]
    fn test_independent_stores() {
        let a = memory(StoreOptions::new());
        let b = memory(StoreOptions::new());
        assert!(!a.same_store(&b));
        assert!(a.same_store(&a.clone()));

        a.set_event(EventInput::new("only in a")).unwrap();
        assert_eq!(a.get_events(&EventQuery::new()).unwrap().into_vec().unwrap().len(), 1);
        assert!(b.get_events(&EventQuery::new()).unwrap().into_vec().unwrap().is_empty());
    }

    #[test]
    fn test_operations_forward() {
        let store = memory(StoreOptions::new().deletable(true));
        let time = Utc.with_ymd_and_hms(2019, 8, 23, 9, 30, 0).unwrap();
        let stored = store
            .set_events(vec![
                EventInput::new("a").at(time).field("level", "INFO"),
                EventInput::new("b").at(time).field("level", "ERROR"),
            ])
            .unwrap();
        assert_eq!(stored, 2);

        let errors = store
            .get_events(&EventQuery::new().filter(Filter::eq("level", "ERROR")).materialize())
            .unwrap()
            .into_vec()
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].event, json!("b"));

        store.clear_all_events().unwrap();
        assert!(store.get_events(&EventQuery::new()).unwrap().into_vec().unwrap().is_empty());
    }

    #[test]
    fn test_batch_stops_at_first_failure() {
        let store = memory(StoreOptions::new());
        let err = store
            .set_events(vec![
                EventInput::new("ok"),
                EventInput::new("bad").at("yesterday-ish"),
                EventInput::new("never"),
            ])
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
        assert_eq!(store.get_events(&EventQuery::new()).unwrap().into_vec().unwrap().len(), 1);
    }

    #[test]
    fn test_configuration_failure_surfaces() {
        let err = EventStore::new(BackendKind::Memory, StoreOptions::new().time_zone("Mars/Olympus"))
            .unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));
    }

    #[test]
    fn test_policy_exposed() {
        let store = memory(StoreOptions::new().read_only(true));
        assert_eq!(store.kind(), BackendKind::Memory);
        assert!(store.policy().unwrap().read_only);
        assert!(store.set_event(EventInput::new("x")).unwrap_err().is_permission_denied());
    }

    // The only test in this crate touching the process-wide registry
    #[test]
    fn test_open_shares_global_store() {
        EventStore::reset();
        let first = EventStore::open(BackendKind::Memory, StoreOptions::new()).unwrap();
        let second = EventStore::open_named("not-a-kind", StoreOptions::new().read_only(true)).unwrap();
        assert!(first.same_store(&second));
        assert!(!second.policy().unwrap().read_only);
        assert!(EventStore::current().unwrap().same_store(&first));

        assert!(EventStore::reset());
        assert!(EventStore::current().is_none());
        assert!(matches!(
            EventStore::open_named("not-a-kind", StoreOptions::new()),
            Err(StorageError::UnsupportedBackend(_))
        ));
        assert!(EventStore::current().is_none());
    }
}
