//! In-memory event backend
//!
//! Fast, non-persistent storage for tests and ephemeral stores. All events are
//! lost when the backend is dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::provider::{EventBackend, StoredEvents};
use crate::{EventRecord, Filter, Result, Sort, StorageError, StoreOptions, StorePolicy, StoredEvent};

/// In-memory backend keeping events in insertion order
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    policy: Option<StorePolicy>,
    events: RwLock<Vec<StoredEvent>>,
    next_id: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    fn ready(&self) -> Result<&StorePolicy> {
        self.policy
            .as_ref()
            .ok_or(StorageError::NotReady("in-memory backend is not configured"))
    }
}

impl EventBackend for InMemoryBackend {
    fn configure(&mut self, options: StoreOptions) -> Result<()> {
        let policy = options.policy()?;
        if options.connection_target.is_some()
            || options.database.is_some()
            || options.collection.is_some()
        {
            debug!("in-memory backend ignores connection, database and collection options");
        }
        self.policy = Some(policy);
        Ok(())
    }

    fn policy(&self) -> Result<&StorePolicy> {
        self.ready()
    }

    fn insert(&self, record: EventRecord) -> Result<()> {
        if self.ready()?.read_only {
            return Err(StorageError::ReadOnly);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.write().push(StoredEvent { id, record });
        Ok(())
    }

    fn query(&self, filter: &Filter, sort: Option<&Sort>) -> Result<StoredEvents> {
        let zone = self.ready()?.time_zone;
        let mut matches: Vec<StoredEvent> = self
            .events
            .read()
            .iter()
            .filter(|stored| filter.matches(&stored.record))
            .map(|stored| stored.clone().in_zone(zone))
            .collect();

        if let Some(sort) = sort {
            matches.sort_by(|a, b| sort.compare(&a.record, &b.record));
        }

        Ok(Box::new(matches.into_iter().map(Ok)))
    }

    fn clear_all(&self) -> Result<()> {
        if !self.ready()?.deletable {
            return Err(StorageError::NotDeletable);
        }
        self.events.write().clear();
        Ok(())
    }
}
