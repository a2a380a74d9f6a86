//! One conversational turn against the backend.
//!
//! Non-streaming turns consume the whole answer stream and, on any backend failure, drop the
//! oldest dialog message and try again until the history is empty. Streaming turns hand the
//! stream to a [`StreamRenderer`] and never retry.

use futures::StreamExt;
use llm_client::{AskChunk, BackendError, ChatBackend};
use prompt::{build_prompt, postprocess_answer};
use std::sync::Arc;
use storage::DialogMessage;
use tracing::{info, instrument, warn};

use crate::error::TurnError;
use crate::stream_renderer::StreamRenderer;

/// Result of a non-streaming turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Answer with surrounding whitespace removed.
    pub answer: String,
    pub prompt: String,
    pub conversation_id: String,
    pub parent_id: String,
    /// How many leading dialog messages were dropped before the backend succeeded.
    pub messages_trimmed: usize,
}

/// Result of a streaming turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedTurn {
    /// Last chunk's text, exactly as displayed.
    pub answer: String,
    pub prompt: String,
    pub conversation_id: String,
    pub parent_id: String,
}

#[derive(Clone)]
pub struct ResponseDriver {
    backend: Arc<dyn ChatBackend>,
}

impl ResponseDriver {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Runs a turn and waits for the full answer.
    ///
    /// The prompt is rebuilt from `message` alone on every attempt, so a trimmed history does
    /// not change what is sent; trimming only counts how far back the dialog was cut.
    #[instrument(skip(self, message, history), fields(history_len = history.len()))]
    pub async fn send_turn(
        &self,
        message: &str,
        mut history: Vec<DialogMessage>,
        chat_mode: &str,
        conversation_id: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<TurnOutcome, TurnError> {
        let mut messages_trimmed = 0;
        loop {
            let prompt = build_prompt(message, chat_mode)?;
            match self.ask_to_completion(&prompt, conversation_id, parent_id).await {
                Ok(last) => {
                    info!(
                        conversation_id = %last.conversation_id,
                        messages_trimmed = messages_trimmed,
                        "Turn completed"
                    );
                    return Ok(TurnOutcome {
                        answer: postprocess_answer(&last.message),
                        prompt,
                        conversation_id: last.conversation_id,
                        parent_id: last.parent_id,
                        messages_trimmed,
                    });
                }
                Err(e) if history.is_empty() => {
                    warn!(error = %e, "Backend failed with empty history, giving up");
                    return Err(TurnError::BackendExhausted(e));
                }
                Err(e) => {
                    history.remove(0);
                    messages_trimmed += 1;
                    warn!(
                        error = %e,
                        messages_trimmed = messages_trimmed,
                        remaining = history.len(),
                        "Backend failed, dropped oldest dialog message and retrying"
                    );
                }
            }
        }
    }

    /// Runs a turn, rendering the answer incrementally through `renderer`.
    #[instrument(skip(self, message, history, renderer), fields(history_len = history.len()))]
    pub async fn send_turn_streaming(
        &self,
        message: &str,
        history: Vec<DialogMessage>,
        chat_mode: &str,
        conversation_id: Option<&str>,
        parent_id: Option<&str>,
        renderer: &StreamRenderer,
    ) -> Result<StreamedTurn, TurnError> {
        let prompt = build_prompt(message, chat_mode)?;
        let stream = self
            .backend
            .ask(&prompt, conversation_id, parent_id)
            .await
            .map_err(TurnError::Backend)?;
        let rendered = renderer.render(stream).await?;
        Ok(StreamedTurn {
            answer: rendered.answer,
            prompt,
            conversation_id: rendered.conversation_id,
            parent_id: rendered.parent_id,
        })
    }

    /// Consumes the whole stream; the last record wins. No record at all is an error.
    async fn ask_to_completion(
        &self,
        prompt: &str,
        conversation_id: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<AskChunk, BackendError> {
        let mut stream = self.backend.ask(prompt, conversation_id, parent_id).await?;
        let mut last = None;
        while let Some(item) = stream.next().await {
            last = Some(item?);
        }
        last.ok_or(BackendError::EmptyResponse)
    }
}
