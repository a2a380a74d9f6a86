//! Error types for the bot core.
//!
//! [`DbotError`] is the top-level error; [`HandlerError`] is used for handler failures.

use std::time::Duration;
use thiserror::Error;

/// Top-level error for dbot (database, bot transport, handler, config, IO).
#[derive(Error, Debug)]
pub enum DbotError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Bot error: {0}")]
    Bot(String),

    /// Transport throttled the request (Telegram "Too Many Requests").
    #[error("Rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Markup the transport could not parse; the same text may succeed as plain text.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Edit with the text the message already shows.
    #[error("Message is not modified")]
    NotModified,

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<storage::StorageError> for DbotError {
    fn from(e: storage::StorageError) -> Self {
        DbotError::Database(e.to_string())
    }
}

/// Errors produced by handlers (no text, invalid command, auth, state).
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("No text in message")]
    NoText,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("State error: {0}")]
    State(String),
}

/// Result type for core operations; uses [`DbotError`].
pub type Result<T> = std::result::Result<T, DbotError>;
