//! Storage error types.
//!
//! Used by store implementations and callers of storage APIs.

use thiserror::Error;

/// Errors that can occur when using storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl StorageError {
    pub(crate) fn user_not_found(user_id: i64) -> Self {
        StorageError::NotFound(format!("user {}", user_id))
    }

    pub(crate) fn dialog_not_found(dialog_id: &str) -> Self {
        StorageError::NotFound(format!("dialog {}", dialog_id))
    }
}
