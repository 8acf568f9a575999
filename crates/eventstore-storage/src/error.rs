//! Error types for event store operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    // ========== Event store taxonomy ==========

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Store not ready: {0}")]
    NotReady(&'static str),

    #[error("Permission denied: store is read-only")]
    ReadOnly,

    #[error("Permission denied: store is not deletable")]
    NotDeletable,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported backend kind: {0}")]
    UnsupportedBackend(String),

    // ========== Backend failures ==========

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Corrupt document {id}: {reason}")]
    CorruptDocument { id: u64, reason: String },
}

impl StorageError {
    /// True for the two permission failures (read-only insert, non-deletable clear)
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StorageError::ReadOnly | StorageError::NotDeletable)
    }
}
