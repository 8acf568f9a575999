//! Client and database handles

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use redb::Database;
use tracing::debug;

use super::collection::{CodecOptions, Collection};
use crate::{Result, StorageError};

/// Data directory used when no connection target is given
pub const DEFAULT_DATA_DIR: &str = "eventstore-data";

/// Open database files, shared per path across the process
///
/// redb locks its file, so a second `Database::create` on a path that is
/// still open fails. Weak references let files close once every handle is
/// dropped.
static OPEN_DATABASES: Lazy<Mutex<HashMap<PathBuf, Weak<Database>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// A connection to a document store data directory
#[derive(Debug, Clone)]
pub struct DocumentClient {
    root: PathBuf,
}

impl DocumentClient {
    /// Connect to (and create if needed) a data directory
    pub fn connect(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| unreachable_target(root, e))?;
        let root = fs::canonicalize(root).map_err(|e| unreachable_target(root, e))?;
        if !root.is_dir() {
            return Err(StorageError::Configuration(format!(
                "connection target '{}' is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Connect to [`DEFAULT_DATA_DIR`]
    pub fn connect_default() -> Result<Self> {
        Self::connect(DEFAULT_DATA_DIR)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open (or create) the named database
    pub fn database(&self, name: &str) -> Result<DocumentDatabase> {
        validate_name("database", name)?;
        let path = self.root.join(format!("{}.redb", name));
        let db = open_shared(&path)?;
        Ok(DocumentDatabase {
            name: name.to_string(),
            path,
            db,
        })
    }
}

/// An open database file
#[derive(Clone)]
pub struct DocumentDatabase {
    name: String,
    path: PathBuf,
    db: Arc<Database>,
}

impl DocumentDatabase {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bind a collection with the given codec options
    ///
    /// Tables are created lazily by the first write or index creation.
    pub fn collection(&self, name: &str, codec: CodecOptions) -> Result<Collection> {
        validate_name("collection", name)?;
        Ok(Collection::new(Arc::clone(&self.db), name, codec))
    }
}

impl fmt::Debug for DocumentDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentDatabase")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

fn open_shared(path: &Path) -> Result<Arc<Database>> {
    let mut open = OPEN_DATABASES.lock();
    if let Some(db) = open.get(path).and_then(Weak::upgrade) {
        return Ok(db);
    }

    let db = Database::create(path).map_err(|e| {
        StorageError::Configuration(format!("cannot open database '{}': {}", path.display(), e))
    })?;
    let db = Arc::new(db);
    open.retain(|_, weak| weak.strong_count() > 0);
    open.insert(path.to_path_buf(), Arc::downgrade(&db));
    debug!(path = %path.display(), "opened database file");
    Ok(db)
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::Configuration(format!("invalid {} name '{}'", kind, name)))
    }
}

fn unreachable_target(root: &Path, e: std::io::Error) -> StorageError {
    StorageError::Configuration(format!(
        "cannot reach connection target '{}': {}",
        root.display(),
        e
    ))
}
