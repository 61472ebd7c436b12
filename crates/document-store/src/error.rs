use thiserror::Error;

use crate::{DocumentKey, Version};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    /// A write batch was rejected because a document changed since it was read.
    ///
    /// `expected` is `None` for inserts (the document was expected to be absent)
    /// and `actual` is `None` when the document no longer exists.
    #[error(
        "Concurrency conflict on {key}: expected version {expected:?}, found {actual:?}"
    )]
    ConcurrencyConflict {
        key: DocumentKey,
        expected: Option<Version>,
        actual: Option<Version>,
    },

    /// The write batch itself is malformed.
    #[error("Invalid write batch: {0}")]
    InvalidBatch(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocumentStoreError {
    /// Returns true if retrying the read-modify-write cycle may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DocumentStoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, DocumentStoreError>;
