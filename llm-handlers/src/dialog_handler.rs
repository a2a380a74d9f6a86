//! Dialog controller: maps commands, text messages, edits and chat mode keyboard presses onto
//! the conversation store and the response driver.
//!
//! Updates of one user are handled one at a time (per-user lock); different users run
//! concurrently. A user's lock entry is removed once no update of that user is in flight.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use llm_client::ChatBackend;
use prompt::{chat_modes, find_chat_mode, PromptError};
use std::sync::Arc;
use std::time::Duration;
use storage::{ConversationStore, DialogMessage, DialogRecord, NewUser, StorageError, UserValue};
use telegram_bot::{
    is_message_not_modified_error, Bot, Chat, DbotError, Handler, HandlerResponse, InlineButton,
    Message, Result, TextFormat,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::error::TurnError;
use crate::replies::{
    chat_mode_set, completion_failed, dialog_too_long, greeting, split_message,
    EDITING_NOT_SUPPORTED, HELP_MESSAGE, MESSAGE_LIMIT, NEW_DIALOG, NEW_DIALOG_TIMEOUT,
    NO_MESSAGE_TO_RETRY, SELECT_CHAT_MODE, SET_CHAT_MODE_PREFIX,
};
use crate::response_driver::ResponseDriver;
use crate::stream_renderer::StreamRenderer;

#[derive(Debug, Clone)]
pub struct DialogSettings {
    pub use_streaming: bool,
    /// Idle time after which a plain text message starts a new dialog.
    pub new_dialog_timeout: Duration,
    pub stream_edit_interval: Duration,
    pub typing_interval: Duration,
}

impl Default for DialogSettings {
    fn default() -> Self {
        Self {
            use_streaming: true,
            new_dialog_timeout: Duration::from_secs(600),
            stream_edit_interval: Duration::from_millis(500),
            typing_interval: Duration::from_secs(4),
        }
    }
}

pub struct DialogHandler {
    bot: Arc<dyn Bot>,
    store: Arc<dyn ConversationStore>,
    backend: Arc<dyn ChatBackend>,
    driver: ResponseDriver,
    settings: DialogSettings,
    user_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl DialogHandler {
    pub fn new(
        bot: Arc<dyn Bot>,
        store: Arc<dyn ConversationStore>,
        backend: Arc<dyn ChatBackend>,
        settings: DialogSettings,
    ) -> Self {
        Self {
            bot,
            store,
            driver: ResponseDriver::new(backend.clone()),
            backend,
            settings,
            user_locks: DashMap::new(),
        }
    }

    fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        self.user_locks.entry(user_id).or_default().clone()
    }

    /// Drops the user's lock entry unless another update of that user holds or awaits it.
    fn release_user_lock(&self, user_id: i64, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.user_locks
            .remove_if(&user_id, |_, l| Arc::strong_count(l) == 1);
    }

    /// Users with an update in flight (lock entries currently held).
    pub fn users_in_flight(&self) -> usize {
        self.user_locks.len()
    }

    /// Creates the user on first contact and makes sure a current dialog exists.
    async fn register_user(&self, message: &Message) -> Result<()> {
        let user_id = message.user.id;
        if !self.store.user_exists(user_id).await? {
            info!(user_id = user_id, username = %message.user.display_name(), "Registering new user");
            let new_user = NewUser::new(user_id, message.chat.id)
                .with_username(message.user.username.clone())
                .with_names(message.user.first_name.clone(), message.user.last_name.clone());
            self.store.add_new_user(new_user).await?;
        }
        if self.store.get_user(user_id).await?.current_dialog_id.is_none() {
            self.store.start_new_dialog(user_id).await?;
        }
        Ok(())
    }

    async fn touch(&self, user_id: i64) -> Result<()> {
        self.store
            .set_user_attribute(user_id, UserValue::LastInteraction(Utc::now()))
            .await?;
        Ok(())
    }

    /// Starts a new current dialog and releases the backend conversation of the old one.
    async fn start_new_dialog(&self, user_id: i64) -> Result<String> {
        let old_conversation = match self.store.get_dialog(user_id, None).await {
            Ok(dialog) => dialog.conversation_id,
            Err(StorageError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = self.backend.reset_chat(old_conversation.as_deref()).await {
            warn!(error = %e, user_id = user_id, "Failed to reset backend conversation");
        }
        let dialog_id = self.store.start_new_dialog(user_id).await?;
        info!(user_id = user_id, dialog_id = %dialog_id, "Started new dialog");
        Ok(dialog_id)
    }

    async fn dialog_timed_out(&self, user_id: i64) -> Result<bool> {
        let user = self.store.get_user(user_id).await?;
        let idle = Utc::now().signed_duration_since(user.last_interaction);
        Ok(idle
            .to_std()
            .map(|d| d > self.settings.new_dialog_timeout)
            .unwrap_or(false))
    }

    /// Replies with Markdown, resending as plain text if the markup is rejected.
    async fn reply_markdown(&self, message: &Message, text: &str) -> Result<()> {
        match self
            .bot
            .reply_formatted(message, text, TextFormat::Markdown)
            .await
        {
            Ok(_) => Ok(()),
            Err(DbotError::BadRequest(reason)) => {
                debug!(reason = %reason, "Markdown rejected, replying as plain text");
                self.bot.reply_to(message, text).await
            }
            Err(e) => Err(e),
        }
    }

    async fn edit_markdown(&self, chat: &Chat, message_id: &str, text: &str) -> Result<()> {
        let result = match self
            .bot
            .edit_formatted(chat, message_id, text, TextFormat::Markdown)
            .await
        {
            Err(DbotError::BadRequest(_)) => self.bot.edit_message(chat, message_id, text).await,
            other => other,
        };
        match result {
            Err(e) if is_message_not_modified_error(&e) => Ok(()),
            other => other,
        }
    }

    async fn report_failure(&self, message: &Message, e: TurnError) -> Result<HandlerResponse> {
        error!(error = %e, user_id = message.user.id, "Completion failed");
        let notice = completion_failed(&e);
        self.bot.reply_to(message, &notice).await?;
        Ok(HandlerResponse::Reply(notice))
    }

    async fn on_start(&self, message: &Message) -> Result<HandlerResponse> {
        self.register_user(message).await?;
        self.touch(message.user.id).await?;
        self.start_new_dialog(message.user.id).await?;
        let text = greeting();
        self.reply_markdown(message, &text).await?;
        Ok(HandlerResponse::Reply(text))
    }

    async fn on_help(&self, message: &Message) -> Result<HandlerResponse> {
        self.register_user(message).await?;
        self.touch(message.user.id).await?;
        self.reply_markdown(message, HELP_MESSAGE).await?;
        Ok(HandlerResponse::Reply(HELP_MESSAGE.to_string()))
    }

    async fn on_new(&self, message: &Message) -> Result<HandlerResponse> {
        let user_id = message.user.id;
        self.register_user(message).await?;
        self.touch(user_id).await?;
        self.start_new_dialog(user_id).await?;
        self.bot.reply_to(message, NEW_DIALOG).await?;

        let mode = self.store.get_user(user_id).await?.current_chat_mode;
        match find_chat_mode(&mode) {
            Some(chat_mode) => {
                self.reply_markdown(message, chat_mode.welcome_message).await?;
                Ok(HandlerResponse::Reply(chat_mode.welcome_message.to_string()))
            }
            None => {
                warn!(user_id = user_id, chat_mode = %mode, "Stored chat mode is not in the catalog");
                Ok(HandlerResponse::Reply(NEW_DIALOG.to_string()))
            }
        }
    }

    async fn on_retry(&self, message: &Message) -> Result<HandlerResponse> {
        let user_id = message.user.id;
        self.register_user(message).await?;
        self.touch(user_id).await?;

        let DialogRecord {
            id,
            conversation_id,
            mut messages,
            ..
        } = self.store.get_dialog(user_id, None).await?;
        let Some(last) = messages.pop() else {
            self.bot.reply_to(message, NO_MESSAGE_TO_RETRY).await?;
            return Ok(HandlerResponse::Reply(NO_MESSAGE_TO_RETRY.to_string()));
        };

        self.store
            .set_dialog_messages(user_id, Some(&id), messages, conversation_id)
            .await?;
        info!(user_id = user_id, dialog_id = %id, "Retrying last dialog message");
        self.run_turn(message, &last.user, false).await
    }

    async fn on_mode(&self, message: &Message) -> Result<HandlerResponse> {
        self.register_user(message).await?;
        self.touch(message.user.id).await?;
        let rows: Vec<Vec<InlineButton>> = chat_modes()
            .iter()
            .map(|m| {
                vec![InlineButton::new(
                    m.name,
                    format!("{}{}", SET_CHAT_MODE_PREFIX, m.key),
                )]
            })
            .collect();
        self.bot
            .send_keyboard(&message.chat, SELECT_CHAT_MODE, rows)
            .await?;
        Ok(HandlerResponse::Stop)
    }

    /// Inline keyboard press; `message.id` is the keyboard message.
    async fn on_callback(&self, message: &Message) -> Result<HandlerResponse> {
        let Some(key) = message.content.strip_prefix(SET_CHAT_MODE_PREFIX) else {
            debug!(data = %message.content, "Ignoring unknown callback data");
            return Ok(HandlerResponse::Continue);
        };
        let Some(chat_mode) = find_chat_mode(key) else {
            let text = PromptError::UnknownPersona(key.to_string()).to_string();
            warn!(user_id = message.user.id, chat_mode = %key, "Unknown chat mode selected");
            self.bot.send_message(&message.chat, &text).await?;
            return Ok(HandlerResponse::Reply(text));
        };

        let user_id = message.user.id;
        self.register_user(message).await?;
        self.touch(user_id).await?;
        self.store
            .set_user_attribute(user_id, UserValue::CurrentChatMode(chat_mode.key.to_string()))
            .await?;
        self.start_new_dialog(user_id).await?;

        self.edit_markdown(&message.chat, &message.id, &chat_mode_set(chat_mode.name))
            .await?;
        self.edit_markdown(&message.chat, &message.id, chat_mode.welcome_message)
            .await?;
        Ok(HandlerResponse::Reply(chat_mode.welcome_message.to_string()))
    }

    /// One conversational turn for `text`, persisted only when the backend answered.
    #[instrument(skip(self, message, text), fields(user_id = message.user.id))]
    async fn run_turn(
        &self,
        message: &Message,
        text: &str,
        use_new_dialog_timeout: bool,
    ) -> Result<HandlerResponse> {
        let user_id = message.user.id;
        self.register_user(message).await?;
        if use_new_dialog_timeout && self.dialog_timed_out(user_id).await? {
            self.start_new_dialog(user_id).await?;
            self.bot.reply_to(message, NEW_DIALOG_TIMEOUT).await?;
        }
        self.touch(user_id).await?;
        if let Err(e) = self.bot.send_typing(&message.chat).await {
            debug!(error = %e, "Typing action failed");
        }

        let chat_mode = self.store.get_user(user_id).await?.current_chat_mode;
        let dialog = self.store.get_dialog(user_id, None).await?;
        let conversation_id = dialog.conversation_id.clone();
        let parent_id = dialog.last_parent_id();
        info!(
            dialog_id = %dialog.id,
            chat_mode = %chat_mode,
            history_len = dialog.messages.len(),
            streaming = self.settings.use_streaming,
            "Running turn"
        );

        if self.settings.use_streaming {
            let renderer = StreamRenderer::new(
                self.bot.clone(),
                message.clone(),
                self.settings.stream_edit_interval,
                self.settings.typing_interval,
            );
            let result = self
                .driver
                .send_turn_streaming(
                    text,
                    dialog.messages.clone(),
                    &chat_mode,
                    conversation_id.as_deref(),
                    parent_id.as_deref(),
                    &renderer,
                )
                .await;
            match result {
                Ok(turn) => {
                    self.persist(user_id, dialog, text, &turn.answer, turn.conversation_id, turn.parent_id)
                        .await?;
                    Ok(HandlerResponse::Reply(turn.answer))
                }
                Err(e) => self.report_failure(message, e).await,
            }
        } else {
            let result = self
                .driver
                .send_turn(
                    text,
                    dialog.messages.clone(),
                    &chat_mode,
                    conversation_id.as_deref(),
                    parent_id.as_deref(),
                )
                .await;
            match result {
                Ok(outcome) => {
                    self.persist(
                        user_id,
                        dialog,
                        text,
                        &outcome.answer,
                        outcome.conversation_id,
                        outcome.parent_id,
                    )
                    .await?;
                    if outcome.messages_trimmed > 0 {
                        self.reply_markdown(message, &dialog_too_long(outcome.messages_trimmed))
                            .await?;
                    }
                    for part in split_message(&outcome.answer, MESSAGE_LIMIT) {
                        if !part.is_empty() {
                            self.reply_markdown(message, &part).await?;
                        }
                    }
                    Ok(HandlerResponse::Reply(outcome.answer))
                }
                Err(e) => self.report_failure(message, e).await,
            }
        }
    }

    /// Appends the new exchange to the full (untrimmed) dialog and stores the new linkage.
    async fn persist(
        &self,
        user_id: i64,
        dialog: DialogRecord,
        user_text: &str,
        answer: &str,
        conversation_id: String,
        parent_id: String,
    ) -> Result<()> {
        let mut messages = dialog.messages;
        messages.push(DialogMessage::new(user_text, answer, Some(parent_id)));
        self.store
            .set_dialog_messages(user_id, Some(&dialog.id), messages, Some(conversation_id))
            .await?;
        Ok(())
    }

    async fn dispatch(&self, message: &Message) -> Result<HandlerResponse> {
        if message.is_callback_query() {
            return self.on_callback(message).await;
        }
        if message.is_edited() {
            self.reply_markdown(message, EDITING_NOT_SUPPORTED).await?;
            return Ok(HandlerResponse::Reply(EDITING_NOT_SUPPORTED.to_string()));
        }

        match message.command() {
            Some("start") => self.on_start(message).await,
            Some("help") => self.on_help(message).await,
            Some("new") => self.on_new(message).await,
            Some("retry") => self.on_retry(message).await,
            Some("mode") => self.on_mode(message).await,
            Some(other) => {
                debug!(command = %other, "Ignoring unknown command");
                Ok(HandlerResponse::Continue)
            }
            None if message.content.trim().is_empty() => Ok(HandlerResponse::Continue),
            None => self.run_turn(message, &message.content, true).await,
        }
    }
}

#[async_trait]
impl Handler for DialogHandler {
    #[instrument(skip(self, message), fields(user_id = message.user.id, message_type = %message.message_type))]
    async fn handle(&self, message: &Message) -> Result<HandlerResponse> {
        let user_id = message.user.id;
        let lock = self.user_lock(user_id);
        let response = {
            let _turn = lock.lock().await;
            self.dispatch(message).await
        };
        self.release_user_lock(user_id, lock);
        response
    }
}
