//! Prompt error types.

use thiserror::Error;

/// Errors from prompt building.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("Chat mode {0} is not supported")]
    UnknownPersona(String),
}
