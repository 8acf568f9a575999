//! Backend capability trait

use crate::engine::{prepare_record, EventCursor, EventInput, EventQuery, Events};
use crate::{EventRecord, Filter, Result, Sort, StorageError, StoreOptions, StorePolicy, StoredEvent};

/// Records streamed out of a backend, identifiers still attached
pub type StoredEvents = Box<dyn Iterator<Item = Result<StoredEvent>> + Send>;

/// Pluggable event backend interface
///
/// Implementations provide the capability layer; the event operations are
/// built on top of it and shared by every backend.
pub trait EventBackend: Send + Sync {
    // ========== Capability Interface ==========

    /// Bind to storage and record the store policy
    ///
    /// Fails with `Configuration` on invalid options or an unreachable target.
    fn configure(&mut self, options: StoreOptions) -> Result<()>;

    /// Policy recorded by `configure`; `NotReady` before that
    fn policy(&self) -> Result<&StorePolicy>;

    /// Persist one prepared record
    fn insert(&self, record: EventRecord) -> Result<()>;

    /// Records matching `filter`, optionally sorted
    fn query(&self, filter: &Filter, sort: Option<&Sort>) -> Result<StoredEvents>;

    /// Remove every record; `NotDeletable` unless the store allows it
    fn clear_all(&self) -> Result<()>;

    // ========== Event Operations ==========

    /// Normalize, classify and insert one event
    fn store_event(&self, input: EventInput) -> Result<()> {
        let policy = self.policy()?;
        if policy.read_only {
            return Err(StorageError::ReadOnly);
        }
        let record = prepare_record(policy, input)?;
        self.insert(record)
    }

    /// Store events one by one, stopping at the first failure
    ///
    /// Returns the number of events stored. Not transactional: events before
    /// the failing one stay persisted.
    fn store_events(&self, inputs: Vec<EventInput>) -> Result<usize> {
        let mut stored = 0;
        for input in inputs {
            self.store_event(input)?;
            stored += 1;
        }
        Ok(stored)
    }

    /// Run a query, returning a lazy cursor or a materialized list
    fn get_events(&self, query: &EventQuery) -> Result<Events> {
        let policy = self.policy()?;
        let filter = query.compose_filter(policy.time_zone)?;
        let sort = query.sort();
        let cursor = EventCursor::new(self.query(&filter, sort.as_ref())?);
        if query.materialize {
            Ok(Events::Materialized(cursor.collect::<Result<Vec<_>>>()?))
        } else {
            Ok(Events::Lazy(cursor))
        }
    }
}
