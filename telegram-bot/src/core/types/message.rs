//! Message and direction types for the core model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{Chat, User};

/// Direction of the message (from user or from bot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}

/// A single inbound update with user, chat and content.
///
/// `message_type` distinguishes new text (`text`), edits of earlier messages (`edited_text`)
/// and inline keyboard presses (`callback_query`, where `content` is the callback data and `id`
/// the keyboard message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub user: User,
    pub chat: Chat,
    pub content: String,
    pub message_type: String,
    pub direction: MessageDirection,
    pub created_at: DateTime<Utc>,
    pub reply_to_message_id: Option<String>,
}

impl Message {
    pub const TEXT: &'static str = "text";
    pub const EDITED_TEXT: &'static str = "edited_text";
    pub const CALLBACK_QUERY: &'static str = "callback_query";

    pub fn is_edited(&self) -> bool {
        self.message_type == Self::EDITED_TEXT
    }

    pub fn is_callback_query(&self) -> bool {
        self.message_type == Self::CALLBACK_QUERY
    }

    /// Command name without the leading `/` and any `@botname` suffix, if the text is a command.
    pub fn command(&self) -> Option<&str> {
        if self.message_type != Self::TEXT {
            return None;
        }
        let first = self.content.split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}
