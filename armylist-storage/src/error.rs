//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file-backed storage).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A record with the same name already exists in the category.
    #[error("name already in use: {0}")]
    NameTaken(String),

    /// Backend refused the write (quota, read-only medium, ...).
    #[error("write rejected: {0}")]
    WriteRejected(String),
}
