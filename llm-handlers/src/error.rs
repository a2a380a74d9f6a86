//! Turn-level error taxonomy.

use llm_client::BackendError;
use prompt::PromptError;
use telegram_bot::DbotError;
use thiserror::Error;

/// Why a single turn failed. Every variant ends the turn with one failure notice and nothing
/// is persisted.
#[derive(Error, Debug)]
pub enum TurnError {
    /// Chat mode key not in the catalog; checked before any backend call.
    #[error(transparent)]
    UnknownPersona(#[from] PromptError),

    /// Backend kept failing after the history was trimmed to nothing.
    #[error(transparent)]
    BackendExhausted(BackendError),

    /// Streaming call failed (no shrink-and-retry in streaming mode).
    #[error(transparent)]
    Backend(BackendError),

    /// Outgoing message could not be sent or edited.
    #[error(transparent)]
    Transport(#[from] DbotError),
}
