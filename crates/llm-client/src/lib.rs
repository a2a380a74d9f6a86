//! # ChatGPT backend abstraction
//!
//! Defines the [`ChatBackend`] trait: `ask` returns an ordered stream of partial answers, each
//! carrying the backend-assigned `conversation_id` / `parent_id` that thread turns into one
//! conversation server-side. The same stream serves the blocking mode (consumed fully, last
//! record wins) and the streaming mode (consumed incrementally).
//!
//! [`OpenAIChatBackend`] implements the contract over the chat-completions API by keeping the
//! conversation tree in memory.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

mod config;
mod conversation_tree;
mod openai_backend;

pub use config::{EnvLlmConfig, LlmConfig};
pub use conversation_tree::{ConversationTree, PendingTurn};
pub use openai_backend::OpenAIChatBackend;

/// One partial-answer record: the answer so far plus the conversation linkage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskChunk {
    pub message: String,
    pub conversation_id: String,
    pub parent_id: String,
}

/// Errors reported by a backend. Every variant is eligible for shrink-and-retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend request failed: {0}")]
    Transient(String),

    #[error("Backend returned no answer")]
    EmptyResponse,

    #[error("Invalid backend request: {0}")]
    InvalidRequest(String),
}

impl From<anyhow::Error> for BackendError {
    fn from(e: anyhow::Error) -> Self {
        BackendError::Transient(e.to_string())
    }
}

/// Ordered stream of partial answers for one `ask`.
pub type AskStream = BoxStream<'static, Result<AskChunk, BackendError>>;

/// Conversational backend shared by all users. Injected into the response driver.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends `prompt` as the next message of `conversation_id` (new conversation when `None`),
    /// replying to `parent_id` (conversation root when `None`).
    async fn ask(
        &self,
        prompt: &str,
        conversation_id: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<AskStream, BackendError>;

    /// Clears backend-side session affinity for an abandoned conversation.
    async fn reset_chat(&self, _conversation_id: Option<&str>) -> Result<(), BackendError> {
        Ok(())
    }
}
