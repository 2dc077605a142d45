//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by an object store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage misconfigured: {0}")]
    Config(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Upload of {key} failed: {message}")]
    Upload { key: String, message: String },

    #[error("Delete of {key} failed: {message}")]
    Delete { key: String, message: String },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Bucket unreachable: {0}")]
    Unreachable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn upload(key: impl Into<String>, msg: impl ToString) -> Self {
        Self::Upload {
            key: key.into(),
            message: msg.to_string(),
        }
    }

    pub fn delete(key: impl Into<String>, msg: impl ToString) -> Self {
        Self::Delete {
            key: key.into(),
            message: msg.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
