//! Renders a streamed answer into one outgoing message.
//!
//! The first chunk is sent as a reply with a trailing `…`. After that, chunk arrival only
//! updates the latest text; a render ticker edits the message when the latest text differs from
//! what is displayed, and a liveness ticker keeps the "typing" action up. Both tickers are
//! cancelled and joined before the final Markdown edit.

use futures::StreamExt;
use llm_client::{AskChunk, AskStream, BackendError};
use std::sync::Arc;
use std::time::Duration;
use telegram_bot::{is_message_not_modified_error, Bot, Chat, DbotError, Message, TextFormat};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::TurnError;

/// Appended to the first chunk while the answer is still streaming.
pub const PLACEHOLDER_SUFFIX: &str = "…";

/// Longest wait honoured for a rate-limited final edit.
pub const FINAL_EDIT_MAX_WAIT: Duration = Duration::from_secs(10);

/// What the renderer ended up displaying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedAnswer {
    pub answer: String,
    pub conversation_id: String,
    pub parent_id: String,
    /// Id of the edited reply message.
    pub message_id: String,
}

struct Consumed {
    message_id: String,
    last: AskChunk,
}

pub struct StreamRenderer {
    bot: Arc<dyn Bot>,
    /// The user's message; the answer is sent as a reply to it.
    reply_to: Message,
    edit_interval: Duration,
    typing_interval: Duration,
}

impl StreamRenderer {
    pub fn new(
        bot: Arc<dyn Bot>,
        reply_to: Message,
        edit_interval: Duration,
        typing_interval: Duration,
    ) -> Self {
        Self {
            bot,
            reply_to,
            edit_interval,
            typing_interval,
        }
    }

    fn chat(&self) -> &Chat {
        &self.reply_to.chat
    }

    /// Drives `stream` to completion.
    ///
    /// Errors before the first chunk leave no message behind. Errors after it leave the reply at
    /// the last rendered text. A stream that ends without any chunk is
    /// [`BackendError::EmptyResponse`]. Only the placeholder reply can fail on the transport
    /// side; later edits are best effort.
    #[instrument(skip(self, stream), fields(chat_id = self.reply_to.chat.id))]
    pub async fn render(&self, mut stream: AskStream) -> Result<RenderedAnswer, TurnError> {
        let shutdown = CancellationToken::new();
        let _cancel_on_drop = shutdown.clone().drop_guard();

        let mut tickers = Vec::with_capacity(2);
        tickers.push(spawn_typing_ticker(
            self.bot.clone(),
            self.chat().clone(),
            self.typing_interval,
            shutdown.clone(),
        ));

        let consumed = self.consume(&mut stream, &shutdown, &mut tickers).await;

        shutdown.cancel();
        for ticker in tickers {
            if let Err(e) = ticker.await {
                warn!(error = %e, "Ticker task ended abnormally");
            }
        }

        let Consumed { message_id, last } = consumed?;
        self.final_edit(&message_id, &last.message).await;

        Ok(RenderedAnswer {
            answer: last.message,
            conversation_id: last.conversation_id,
            parent_id: last.parent_id,
            message_id,
        })
    }

    async fn consume(
        &self,
        stream: &mut AskStream,
        shutdown: &CancellationToken,
        tickers: &mut Vec<JoinHandle<()>>,
    ) -> Result<Consumed, TurnError> {
        let first = match stream.next().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return Err(TurnError::Backend(e)),
            None => return Err(TurnError::Backend(BackendError::EmptyResponse)),
        };

        let placeholder = format!("{}{}", first.message, PLACEHOLDER_SUFFIX);
        let message_id = self
            .bot
            .reply_formatted(&self.reply_to, &placeholder, TextFormat::Plain)
            .await?;
        debug!(message_id = %message_id, "Placeholder sent");

        let (latest_tx, latest_rx) = watch::channel(first.message.clone());
        tickers.push(spawn_render_ticker(
            self.bot.clone(),
            self.chat().clone(),
            message_id.clone(),
            placeholder,
            latest_rx,
            self.edit_interval,
            shutdown.clone(),
        ));

        let mut last = first;
        while let Some(item) = stream.next().await {
            let chunk = item.map_err(TurnError::Backend)?;
            latest_tx.send_replace(chunk.message.clone());
            last = chunk;
        }

        Ok(Consumed { message_id, last })
    }

    /// Shows the final text, Markdown first.
    ///
    /// Never fails; the streamed answer is already on screen. Malformed markup is retried as
    /// plain text and a rate limit is waited out once (capped at [`FINAL_EDIT_MAX_WAIT`]). Any
    /// other error is logged and leaves the last ticked text.
    async fn final_edit(&self, message_id: &str, text: &str) {
        let mut result = self.edit_final_once(message_id, text).await;
        if let Err(DbotError::RateLimited { retry_after }) = result {
            let wait = retry_after.min(FINAL_EDIT_MAX_WAIT);
            debug!(wait_ms = wait.as_millis() as u64, "Final edit rate limited, retrying once");
            tokio::time::sleep(wait).await;
            result = self.edit_final_once(message_id, text).await;
        }
        match result {
            Ok(()) => {}
            Err(e) if is_message_not_modified_error(&e) => {}
            Err(e) => warn!(
                error = %e,
                message_id = %message_id,
                "Final edit failed, keeping last rendered text"
            ),
        }
    }

    async fn edit_final_once(&self, message_id: &str, text: &str) -> Result<(), DbotError> {
        match self
            .bot
            .edit_formatted(self.chat(), message_id, text, TextFormat::Markdown)
            .await
        {
            Err(DbotError::BadRequest(reason)) => {
                debug!(reason = %reason, "Markdown rejected, editing as plain text");
                self.bot.edit_message(self.chat(), message_id, text).await
            }
            other => other,
        }
    }
}

/// Edits the reply to the latest text on every tick where it changed. Failed edits are dropped
/// and superseded by the next tick.
fn spawn_render_ticker(
    bot: Arc<dyn Bot>,
    chat: Chat,
    message_id: String,
    mut displayed: String,
    mut latest: watch::Receiver<String>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let text = latest.borrow_and_update().clone();
                    if text == displayed {
                        continue;
                    }
                    match bot.edit_message(&chat, &message_id, &text).await {
                        Ok(()) => displayed = text,
                        Err(e) if is_message_not_modified_error(&e) => displayed = text,
                        Err(e) => debug!(error = %e, "Stream edit failed, superseded by next tick"),
                    }
                }
            }
        }
    })
}

/// Sends "typing" every `every` until cancelled. The caller already sent one before the turn.
fn spawn_typing_ticker(
    bot: Arc<dyn Bot>,
    chat: Chat,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = bot.send_typing(&chat).await {
                        debug!(error = %e, "Typing action failed");
                    }
                }
            }
        }
    })
}
