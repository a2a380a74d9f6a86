//! Conversions from teloxide updates to core types.

use crate::core::{Chat, Message, MessageDirection, ToCoreMessage, ToCoreUser, User};
use teloxide::types::CallbackQuery;

pub struct TelegramUserWrapper<'a>(pub &'a teloxide::types::User);

impl<'a> ToCoreUser for TelegramUserWrapper<'a> {
    fn to_core(&self) -> User {
        User {
            id: self.0.id.0 as i64,
            username: self.0.username.clone(),
            first_name: Some(self.0.first_name.clone()),
            last_name: self.0.last_name.clone(),
        }
    }
}

fn core_chat(chat: &teloxide::types::Chat) -> Chat {
    Chat {
        id: chat.id.0,
        chat_type: format!("{:?}", chat.kind),
    }
}

fn unknown_user() -> User {
    User {
        id: 0,
        username: None,
        first_name: None,
        last_name: None,
    }
}

/// Wraps a new or edited text message.
pub struct TelegramMessageWrapper<'a>(pub &'a teloxide::types::Message);

impl<'a> TelegramMessageWrapper<'a> {
    fn build(&self, message_type: &str) -> Message {
        Message {
            id: self.0.id.to_string(),
            user: self
                .0
                .from
                .as_ref()
                .map(|u| TelegramUserWrapper(u).to_core())
                .unwrap_or_else(unknown_user),
            chat: core_chat(&self.0.chat),
            content: self.0.text().unwrap_or("").to_string(),
            message_type: message_type.to_string(),
            direction: MessageDirection::Incoming,
            created_at: chrono::Utc::now(),
            reply_to_message_id: self.0.reply_to_message().map(|m| m.id.to_string()),
        }
    }

    /// Core message for an edit of an earlier message.
    pub fn to_core_edited(&self) -> Message {
        self.build(Message::EDITED_TEXT)
    }
}

impl<'a> ToCoreMessage for TelegramMessageWrapper<'a> {
    fn to_core(&self) -> Message {
        self.build(Message::TEXT)
    }
}

/// Wraps an inline keyboard press. `id` is the keyboard message, `content` the callback data.
pub struct TelegramCallbackWrapper<'a>(pub &'a CallbackQuery);

impl<'a> ToCoreMessage for TelegramCallbackWrapper<'a> {
    fn to_core(&self) -> Message {
        let q = self.0;
        let user = TelegramUserWrapper(&q.from).to_core();
        let (id, chat) = match q.message.as_ref() {
            Some(m) => (m.id().to_string(), core_chat(m.chat())),
            None => (
                String::new(),
                Chat {
                    id: user.id,
                    chat_type: "unknown".to_string(),
                },
            ),
        };
        Message {
            id,
            user,
            chat,
            content: q.data.clone().unwrap_or_default(),
            message_type: Message::CALLBACK_QUERY.to_string(),
            direction: MessageDirection::Incoming,
            created_at: chrono::Utc::now(),
            reply_to_message_id: None,
        }
    }
}
