//! Dialog record model. Maps to the `dialogs` table; messages are stored as a JSON array.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One exchange of a dialog: the user's text, the bot's answer and the backend parent id
/// returned with that answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogMessage {
    pub user: String,
    pub bot: String,
    pub date: DateTime<Utc>,
    pub parent_id: Option<String>,
}

impl DialogMessage {
    pub fn new(user: impl Into<String>, bot: impl Into<String>, parent_id: Option<String>) -> Self {
        Self {
            user: user.into(),
            bot: bot.into(),
            date: Utc::now(),
            parent_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogRecord {
    pub id: String,
    pub user_id: i64,
    pub conversation_id: Option<String>,
    pub chat_mode: String,
    pub start_time: DateTime<Utc>,
    pub messages: Vec<DialogMessage>,
}

impl DialogRecord {
    pub fn attribute(&self, attribute: DialogAttribute) -> Option<String> {
        match attribute {
            DialogAttribute::ConversationId => self.conversation_id.clone(),
            DialogAttribute::ChatMode => Some(self.chat_mode.clone()),
        }
    }

    /// Parent id for the next backend call: the one stored with the last message.
    pub fn last_parent_id(&self) -> Option<String> {
        self.messages.last().and_then(|m| m.parent_id.clone())
    }
}

/// Readable dialog attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogAttribute {
    ConversationId,
    ChatMode,
}
