//! Bot abstraction for sending and editing messages.
//!
//! [`Bot`] is transport-agnostic; `TelegramBotAdapter` implements it via teloxide and tests
//! substitute recording mocks.

use crate::core::error::{DbotError, Result};
use crate::core::types::{Chat, Message};
use async_trait::async_trait;

/// Markup requested for outgoing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Plain,
    /// Telegram legacy Markdown (`*bold*`, `_italic_`, `` `code` ``).
    Markdown,
}

/// One inline keyboard button; pressing it delivers `callback_data` back as a callback query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Abstraction for sending and editing messages. Implementations map to a transport (e.g. Telegram).
#[async_trait]
pub trait Bot: Send + Sync {
    /// Sends a text message to the given chat.
    async fn send_message(&self, chat: &Chat, text: &str) -> Result<()>;

    /// Sends a message and returns its id (for later edits).
    async fn send_message_and_return_id(&self, chat: &Chat, text: &str) -> Result<String>;

    /// Replies to `message` (same chat, quoting it) and returns the id of the reply.
    async fn reply_formatted(
        &self,
        message: &Message,
        text: &str,
        format: TextFormat,
    ) -> Result<String>;

    /// Edits an already-sent message. `message_id` is transport-specific (Telegram numeric string).
    /// Sending the text the message already shows fails with [`DbotError::NotModified`].
    async fn edit_formatted(
        &self,
        chat: &Chat,
        message_id: &str,
        text: &str,
        format: TextFormat,
    ) -> Result<()>;

    /// Sends `text` with an inline keyboard (one `Vec` per row) and returns the message id.
    async fn send_keyboard(
        &self,
        chat: &Chat,
        text: &str,
        rows: Vec<Vec<InlineButton>>,
    ) -> Result<String>;

    /// Sends a plain-text reply to the given message.
    async fn reply_to(&self, message: &Message, text: &str) -> Result<()> {
        self.reply_formatted(message, text, TextFormat::Plain)
            .await
            .map(|_| ())
    }

    /// Edits a message as plain text.
    async fn edit_message(&self, chat: &Chat, message_id: &str, text: &str) -> Result<()> {
        self.edit_formatted(chat, message_id, text, TextFormat::Plain)
            .await
    }

    /// Shows the "typing" chat action. Transports without it do nothing.
    async fn send_typing(&self, _chat: &Chat) -> Result<()> {
        Ok(())
    }
}

/// Parses a message id string into an i32. Used by edits.
pub fn parse_message_id(s: &str) -> Result<i32> {
    s.parse()
        .map_err(|_| DbotError::Bot(format!("Invalid message_id for edit: {}", s)))
}

/// True if the transport error means "message is not modified" (edit with unchanged text).
pub fn is_message_not_modified_error(e: &DbotError) -> bool {
    match e {
        DbotError::NotModified => true,
        other => other
            .to_string()
            .to_lowercase()
            .contains("message is not modified"),
    }
}
