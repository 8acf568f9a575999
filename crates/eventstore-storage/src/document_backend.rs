//! Document-store backend

use tracing::{debug, warn};

use crate::document::{CodecOptions, Collection, DocumentClient};
use crate::options::{CollectionSelector, ConnectionTarget, DatabaseSelector};
use crate::provider::{EventBackend, StoredEvents};
use crate::{EventRecord, Filter, Result, Sort, StorageError, StoreOptions, StorePolicy};

/// Database used when none is selected
pub const DEFAULT_DB_NAME: &str = "DEFAULT_DB_EVENT";

/// Collection used when none is selected
pub const DEFAULT_COLLECTION: &str = "EVENT_STORE";

/// Event backend bound to one document-store collection
///
/// Unconfigured until `configure` succeeds; every other operation fails with
/// `NotReady` before that.
#[derive(Debug, Default)]
pub struct DocumentBackend {
    state: Option<Configured>,
}

#[derive(Debug)]
struct Configured {
    policy: StorePolicy,
    collection: Collection,
}

impl DocumentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bound collection, once configured
    pub fn collection(&self) -> Option<&Collection> {
        self.state.as_ref().map(|s| &s.collection)
    }

    fn ready(&self) -> Result<&Configured> {
        self.state
            .as_ref()
            .ok_or(StorageError::NotReady("document backend is not configured"))
    }
}

impl EventBackend for DocumentBackend {
    fn configure(&mut self, options: StoreOptions) -> Result<()> {
        let policy = options.policy()?;

        let client = match options.connection_target {
            Some(ConnectionTarget::Path(path)) => DocumentClient::connect(path)?,
            Some(ConnectionTarget::Client(client)) => client,
            None => DocumentClient::connect_default()?,
        };

        let database = match options.database {
            Some(DatabaseSelector::Name(name)) => client.database(&name)?,
            Some(DatabaseSelector::Handle(database)) => database,
            None => client.database(DEFAULT_DB_NAME)?,
        };

        let codec = policy
            .time_zone
            .map_or_else(CodecOptions::default, CodecOptions::tz_aware);

        let collection = match options.collection {
            Some(CollectionSelector::Name(name)) => database.collection(&name, codec)?,
            Some(CollectionSelector::Handle(collection)) => {
                if policy.time_zone.is_some() {
                    warn!(
                        collection = collection.name(),
                        "collection handle was opened elsewhere; the time zone option is not applied to it"
                    );
                }
                collection
            }
            None => database.collection(DEFAULT_COLLECTION, codec)?,
        };

        collection.create_time_index()?;
        debug!(
            database = database.name(),
            collection = collection.name(),
            read_only = policy.read_only,
            time_auto = policy.time_auto,
            deletable = policy.deletable,
            "document backend configured"
        );

        self.state = Some(Configured { policy, collection });
        Ok(())
    }

    fn policy(&self) -> Result<&StorePolicy> {
        Ok(&self.ready()?.policy)
    }

    fn insert(&self, record: EventRecord) -> Result<()> {
        let state = self.ready()?;
        if state.policy.read_only {
            return Err(StorageError::ReadOnly);
        }
        state.collection.insert_one(&record)?;
        Ok(())
    }

    fn query(&self, filter: &Filter, sort: Option<&Sort>) -> Result<StoredEvents> {
        let state = self.ready()?;
        state.collection.find(filter.clone(), sort.cloned())
    }

    fn clear_all(&self) -> Result<()> {
        let state = self.ready()?;
        if !state.policy.deletable {
            return Err(StorageError::NotDeletable);
        }
        state.collection.drop_all()
    }
}
