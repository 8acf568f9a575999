//! Store configuration

use std::path::PathBuf;

use chrono::FixedOffset;
use serde::Deserialize;
use serde_json::Value;

use crate::classify::Classifier;
use crate::document::{Collection, DocumentClient, DocumentDatabase};
use crate::time::parse_time_zone;
use crate::{Result, StorageError};

/// Where the document store lives: a data directory or an open client
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "String")]
pub enum ConnectionTarget {
    Path(PathBuf),
    Client(DocumentClient),
}

/// Database by name or as an already-open handle
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "String")]
pub enum DatabaseSelector {
    Name(String),
    Handle(DocumentDatabase),
}

/// Collection by name or as an already-open handle
///
/// An open handle keeps its own codec options; the store's timezone is not
/// applied to it.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "String")]
pub enum CollectionSelector {
    Name(String),
    Handle(Collection),
}

/// Options accepted when configuring a store
///
/// Plain keys can be loaded from JSON (`readOnly`, `timeAuto`, `timeZone`,
/// `connectionTarget`, `database`, `collection`, `deletable`); handles and the
/// classification function are set programmatically.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreOptions {
    /// Reject all writes
    pub read_only: bool,
    /// Stamp every event with the time of the write call
    pub time_auto: bool,
    /// `UTC`, `Z` or a fixed offset like `+02:00`
    pub time_zone: Option<String>,
    pub connection_target: Option<ConnectionTarget>,
    pub database: Option<DatabaseSelector>,
    pub collection: Option<CollectionSelector>,
    #[serde(skip)]
    pub classify: Option<Classifier>,
    /// Allow `clear_all`
    pub deletable: bool,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON object
    ///
    /// Anything but an object is rejected, including the positional array
    /// form serde would otherwise accept for a struct.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(invalid_options)?;
        if !value.is_object() {
            return Err(StorageError::Configuration(format!(
                "store options must be a JSON object, got {}",
                value
            )));
        }
        serde_json::from_value(value).map_err(invalid_options)
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn time_auto(mut self, time_auto: bool) -> Self {
        self.time_auto = time_auto;
        self
    }

    pub fn time_zone(mut self, zone: impl Into<String>) -> Self {
        self.time_zone = Some(zone.into());
        self
    }

    pub fn connection_target(mut self, target: impl Into<ConnectionTarget>) -> Self {
        self.connection_target = Some(target.into());
        self
    }

    pub fn database(mut self, database: impl Into<DatabaseSelector>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn collection(mut self, collection: impl Into<CollectionSelector>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn classify(mut self, classifier: impl Into<Classifier>) -> Self {
        self.classify = Some(classifier.into());
        self
    }

    pub fn deletable(mut self, deletable: bool) -> Self {
        self.deletable = deletable;
        self
    }

    /// Validate the policy part of the options
    pub fn policy(&self) -> Result<StorePolicy> {
        let time_zone = self.time_zone.as_deref().map(parse_time_zone).transpose()?;
        Ok(StorePolicy {
            read_only: self.read_only,
            time_auto: self.time_auto,
            deletable: self.deletable,
            time_zone,
            classifier: self.classify.clone(),
        })
    }
}

fn invalid_options(e: serde_json::Error) -> StorageError {
    StorageError::Configuration(format!("invalid store options: {}", e))
}

/// Write/read policy of a configured store
#[derive(Debug, Clone)]
pub struct StorePolicy {
    pub read_only: bool,
    pub time_auto: bool,
    pub deletable: bool,
    pub time_zone: Option<FixedOffset>,
    pub classifier: Option<Classifier>,
}

impl From<String> for ConnectionTarget {
    fn from(path: String) -> Self {
        ConnectionTarget::Path(PathBuf::from(path))
    }
}

impl From<&str> for ConnectionTarget {
    fn from(path: &str) -> Self {
        ConnectionTarget::Path(PathBuf::from(path))
    }
}

impl From<PathBuf> for ConnectionTarget {
    fn from(path: PathBuf) -> Self {
        ConnectionTarget::Path(path)
    }
}

impl From<&std::path::Path> for ConnectionTarget {
    fn from(path: &std::path::Path) -> Self {
        ConnectionTarget::Path(path.to_path_buf())
    }
}

impl From<DocumentClient> for ConnectionTarget {
    fn from(client: DocumentClient) -> Self {
        ConnectionTarget::Client(client)
    }
}

impl From<String> for DatabaseSelector {
    fn from(name: String) -> Self {
        DatabaseSelector::Name(name)
    }
}

impl From<&str> for DatabaseSelector {
    fn from(name: &str) -> Self {
        DatabaseSelector::Name(name.to_string())
    }
}

impl From<DocumentDatabase> for DatabaseSelector {
    fn from(database: DocumentDatabase) -> Self {
        DatabaseSelector::Handle(database)
    }
}

impl From<String> for CollectionSelector {
    fn from(name: String) -> Self {
        CollectionSelector::Name(name)
    }
}

impl From<&str> for CollectionSelector {
    fn from(name: &str) -> Self {
        CollectionSelector::Name(name.to_string())
    }
}

impl From<Collection> for CollectionSelector {
    fn from(collection: Collection) -> Self {
        CollectionSelector::Handle(collection)
    }
}
