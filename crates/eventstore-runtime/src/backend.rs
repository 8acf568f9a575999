//! Backend kinds and dispatch

use std::fmt;
use std::str::FromStr;

use eventstore_storage::{
    DocumentBackend, EventBackend, EventRecord, Filter, InMemoryBackend, Result, Sort,
    StorageError, StoreOptions, StorePolicy, StoredEvents,
};

/// Supported backend implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    /// Embedded document store (`nosql` or `document`)
    #[default]
    Document,
    /// Non-persistent store (`memory`)
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Document => "document",
            BackendKind::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nosql" | "document" => Ok(BackendKind::Document),
            "memory" => Ok(BackendKind::Memory),
            _ => Err(StorageError::UnsupportedBackend(s.to_string())),
        }
    }
}

/// A backend of one of the supported kinds
#[derive(Debug)]
pub enum Backend {
    Document(DocumentBackend),
    Memory(InMemoryBackend),
}

impl Backend {
    /// Unconfigured backend of the given kind
    pub fn new(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Document => Backend::Document(DocumentBackend::new()),
            BackendKind::Memory => Backend::Memory(InMemoryBackend::new()),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Document(_) => BackendKind::Document,
            Backend::Memory(_) => BackendKind::Memory,
        }
    }

    fn as_dyn(&self) -> &dyn EventBackend {
        match self {
            Backend::Document(backend) => backend,
            Backend::Memory(backend) => backend,
        }
    }
}

impl EventBackend for Backend {
    fn configure(&mut self, options: StoreOptions) -> Result<()> {
        match self {
            Backend::Document(backend) => backend.configure(options),
            Backend::Memory(backend) => backend.configure(options),
        }
    }

    fn policy(&self) -> Result<&StorePolicy> {
        self.as_dyn().policy()
    }

    fn insert(&self, record: EventRecord) -> Result<()> {
        self.as_dyn().insert(record)
    }

    fn query(&self, filter: &Filter, sort: Option<&Sort>) -> Result<StoredEvents> {
        self.as_dyn().query(filter, sort)
    }

    fn clear_all(&self) -> Result<()> {
        self.as_dyn().clear_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventstore_storage::{EventInput, EventQuery};

    #[test]
    fn test_parse_kind() {
        assert_eq!("nosql".parse::<BackendKind>().unwrap(), BackendKind::Document);
        assert_eq!("document".parse::<BackendKind>().unwrap(), BackendKind::Document);
        assert_eq!("Memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert_eq!(BackendKind::default(), BackendKind::Document);
    }

    #[test]
    fn test_unknown_kind() {
        let err = "sql".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedBackend(ref kind) if kind == "sql"));
    }

    #[test]
    fn test_display_round_trips() {
        for kind in [BackendKind::Document, BackendKind::Memory] {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_dispatch_to_memory() {
        let mut backend = Backend::new(BackendKind::Memory);
        assert_eq!(backend.kind(), BackendKind::Memory);
        assert!(matches!(backend.policy(), Err(StorageError::NotReady(_))));

        backend.configure(StoreOptions::new()).unwrap();
        backend.store_event(EventInput::new("x")).unwrap();
        let events = backend.get_events(&EventQuery::new()).unwrap().into_vec().unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_dispatch_to_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = Backend::new(BackendKind::Document);
        backend
            .configure(StoreOptions::new().connection_target(dir.path()).read_only(true))
            .unwrap();
        assert!(backend.policy().unwrap().read_only);
        assert!(matches!(
            backend.store_event(EventInput::new("x")),
            Err(StorageError::ReadOnly)
        ));
    }
}
