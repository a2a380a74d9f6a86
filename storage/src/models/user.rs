//! User record model. Maps to the `users` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat mode assigned to users on first contact.
pub const DEFAULT_CHAT_MODE_KEY: &str = "normal";

/// Display metadata captured when a user is first seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub user_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl NewUser {
    pub fn new(user_id: i64, chat_id: i64) -> Self {
        Self {
            user_id,
            chat_id,
            username: None,
            first_name: None,
            last_name: None,
        }
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    pub fn with_names(mut self, first_name: Option<String>, last_name: Option<String>) -> Self {
        self.first_name = first_name;
        self.last_name = last_name;
        self
    }

    /// Builds the full record for a first contact at `now`.
    pub fn into_record(self, now: DateTime<Utc>) -> UserRecord {
        UserRecord {
            user_id: self.user_id,
            chat_id: self.chat_id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            last_interaction: now,
            first_seen: now,
            current_dialog_id: None,
            current_chat_mode: DEFAULT_CHAT_MODE_KEY.to_string(),
            n_used_tokens: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub last_interaction: DateTime<Utc>,
    pub first_seen: DateTime<Utc>,
    pub current_dialog_id: Option<String>,
    pub current_chat_mode: String,
    pub n_used_tokens: i64,
}

impl UserRecord {
    /// Reads one mutable attribute.
    pub fn attribute(&self, attribute: UserAttribute) -> UserValue {
        match attribute {
            UserAttribute::LastInteraction => UserValue::LastInteraction(self.last_interaction),
            UserAttribute::CurrentDialogId => {
                UserValue::CurrentDialogId(self.current_dialog_id.clone())
            }
            UserAttribute::CurrentChatMode => {
                UserValue::CurrentChatMode(self.current_chat_mode.clone())
            }
            UserAttribute::UsedTokens => UserValue::UsedTokens(self.n_used_tokens),
        }
    }

    /// Overwrites one mutable attribute.
    pub fn apply(&mut self, value: UserValue) {
        match value {
            UserValue::LastInteraction(t) => self.last_interaction = t,
            UserValue::CurrentDialogId(id) => self.current_dialog_id = id,
            UserValue::CurrentChatMode(mode) => self.current_chat_mode = mode,
            UserValue::UsedTokens(n) => self.n_used_tokens = n,
        }
    }
}

/// Mutable user attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserAttribute {
    LastInteraction,
    CurrentDialogId,
    CurrentChatMode,
    UsedTokens,
}

impl UserAttribute {
    /// Column name in the `users` table.
    pub fn column(&self) -> &'static str {
        match self {
            UserAttribute::LastInteraction => "last_interaction",
            UserAttribute::CurrentDialogId => "current_dialog_id",
            UserAttribute::CurrentChatMode => "current_chat_mode",
            UserAttribute::UsedTokens => "n_used_tokens",
        }
    }
}

/// Typed value of a [`UserAttribute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValue {
    LastInteraction(DateTime<Utc>),
    CurrentDialogId(Option<String>),
    CurrentChatMode(String),
    UsedTokens(i64),
}

impl UserValue {
    pub fn attribute(&self) -> UserAttribute {
        match self {
            UserValue::LastInteraction(_) => UserAttribute::LastInteraction,
            UserValue::CurrentDialogId(_) => UserAttribute::CurrentDialogId,
            UserValue::CurrentChatMode(_) => UserAttribute::CurrentChatMode,
            UserValue::UsedTokens(_) => UserAttribute::UsedTokens,
        }
    }
}
