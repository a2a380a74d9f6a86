//! Wraps teloxide::Bot and implements [`crate::core::Bot`].

use crate::core::{
    is_message_not_modified_error, parse_message_id, Bot as CoreBot, Chat, DbotError,
    InlineButton, Message, Result, TextFormat,
};
use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{
        ChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode,
        ReplyParameters,
    },
    ApiError, RequestError,
};

/// True for Telegram's "can't parse entities" family of markup errors.
fn is_markup_error(text: &str) -> bool {
    let text = text.to_ascii_lowercase();
    text.contains("can't parse entities") || text.contains("can't find end of the entity")
}

/// Maps teloxide errors onto the transport-neutral variants the handlers react to. Only markup
/// errors become [`DbotError::BadRequest`]; other API errors (blocked bot, missing message) are
/// [`DbotError::Bot`].
pub fn map_request_error(e: RequestError) -> DbotError {
    let text = e.to_string();
    let mapped = match e {
        RequestError::RetryAfter(secs) => DbotError::RateLimited {
            retry_after: secs.duration(),
        },
        RequestError::Api(ApiError::MessageNotModified) => DbotError::NotModified,
        RequestError::Api(_) if is_markup_error(&text) => DbotError::BadRequest(text),
        _ => DbotError::Bot(text),
    };
    if is_message_not_modified_error(&mapped) {
        DbotError::NotModified
    } else {
        mapped
    }
}

#[allow(deprecated)]
fn parse_mode(format: TextFormat) -> Option<ParseMode> {
    match format {
        TextFormat::Plain => None,
        TextFormat::Markdown => Some(ParseMode::Markdown),
    }
}

/// Thin wrapper around teloxide::Bot that implements core's Bot trait.
pub struct TelegramBotAdapter {
    bot: teloxide::Bot,
}

impl TelegramBotAdapter {
    pub fn new(bot: teloxide::Bot) -> Self {
        Self { bot }
    }

    /// Returns the underlying teloxide::Bot for direct API use when needed.
    pub fn inner(&self) -> &teloxide::Bot {
        &self.bot
    }
}

#[async_trait]
impl CoreBot for TelegramBotAdapter {
    async fn send_message(&self, chat: &Chat, text: &str) -> Result<()> {
        self.send_message_and_return_id(chat, text).await.map(|_| ())
    }

    async fn send_message_and_return_id(&self, chat: &Chat, text: &str) -> Result<String> {
        let sent = self
            .bot
            .send_message(ChatId(chat.id), text.to_string())
            .await
            .map_err(map_request_error)?;
        Ok(sent.id.to_string())
    }

    async fn reply_formatted(
        &self,
        message: &Message,
        text: &str,
        format: TextFormat,
    ) -> Result<String> {
        let mut request = self
            .bot
            .send_message(ChatId(message.chat.id), text.to_string());
        if let Ok(id) = parse_message_id(&message.id) {
            request = request.reply_parameters(ReplyParameters::new(MessageId(id)));
        }
        if let Some(mode) = parse_mode(format) {
            request = request.parse_mode(mode);
        }
        let sent = request.await.map_err(map_request_error)?;
        Ok(sent.id.to_string())
    }

    async fn edit_formatted(
        &self,
        chat: &Chat,
        message_id: &str,
        text: &str,
        format: TextFormat,
    ) -> Result<()> {
        let id = parse_message_id(message_id)?;
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat.id), MessageId(id), text.to_string());
        if let Some(mode) = parse_mode(format) {
            request = request.parse_mode(mode);
        }
        request.await.map_err(map_request_error)?;
        Ok(())
    }

    async fn send_keyboard(
        &self,
        chat: &Chat,
        text: &str,
        rows: Vec<Vec<InlineButton>>,
    ) -> Result<String> {
        let keyboard = InlineKeyboardMarkup::new(rows.into_iter().map(|row| {
            row.into_iter()
                .map(|b| InlineKeyboardButton::callback(b.label, b.callback_data))
                .collect::<Vec<_>>()
        }));
        let sent = self
            .bot
            .send_message(ChatId(chat.id), text.to_string())
            .reply_markup(keyboard)
            .await
            .map_err(map_request_error)?;
        Ok(sent.id.to_string())
    }

    async fn send_typing(&self, chat: &Chat) -> Result<()> {
        self.bot
            .send_chat_action(ChatId(chat.id), ChatAction::Typing)
            .await
            .map_err(map_request_error)?;
        Ok(())
    }
}
