//! Storage error types.

use thiserror::Error;

use vigil_core::StoreError;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from rusqlite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (e.g., creating directories).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
