//! Registry enforcing one active store
//!
//! Holds at most one store. The first successful `get_or_init` configures it;
//! later calls return it unchanged until `reset`.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use eventstore_storage::Result;

use crate::store::EventStore;

/// Process-wide registry behind `EventStore::open`
static GLOBAL: Lazy<StoreRegistry> = Lazy::new(StoreRegistry::new);

/// Slot for the active store
///
/// Initialization runs under the lock, so concurrent first callers configure
/// exactly one store.
#[derive(Debug, Default)]
pub struct StoreRegistry {
    active: Mutex<Option<EventStore>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static StoreRegistry {
        &GLOBAL
    }

    /// Active store, or the one built by `build` if none is active
    ///
    /// `build` only runs when the slot is empty. If it fails the slot stays
    /// empty.
    pub fn get_or_init<F>(&self, build: F) -> Result<EventStore>
    where
        F: FnOnce() -> Result<EventStore>,
    {
        let mut active = self.active.lock();
        if let Some(store) = active.as_ref() {
            debug!(kind = %store.kind(), "store already active, ignoring new configuration");
            return Ok(store.clone());
        }

        let store = build()?;
        debug!(kind = %store.kind(), "store configured");
        *active = Some(store.clone());
        Ok(store)
    }

    pub fn current(&self) -> Option<EventStore> {
        self.active.lock().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Empty the slot; returns whether a store was active
    pub fn reset(&self) -> bool {
        let previous = self.active.lock().take();
        if let Some(store) = &previous {
            debug!(kind = %store.kind(), "store reset");
        }
        previous.is_some()
    }
}
