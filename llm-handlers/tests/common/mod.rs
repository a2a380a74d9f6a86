//! Shared test doubles: a recording [`Bot`] and a scripted [`ChatBackend`].

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use llm_client::{AskChunk, AskStream, BackendError, ChatBackend};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use telegram_bot::{
    Bot, Chat, DbotError, InlineButton, Message, MessageDirection, Result, TextFormat, User,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCall {
    Send { text: String },
    Reply { id: String, text: String, format: TextFormat },
    Edit { id: String, text: String, format: TextFormat },
    Keyboard { text: String, rows: Vec<Vec<InlineButton>> },
    Typing,
}

/// Records every successful outgoing call. Failed calls are not recorded.
///
/// - `reject_markdown`: Markdown sends and edits fail with `BadRequest`.
/// - `rate_limited_markdown_edits`: that many Markdown edits fail with `RateLimited`.
/// - `failing_plain_edits`: that many plain edits fail with a generic transport error.
#[derive(Default)]
pub struct MockBot {
    pub calls: Mutex<Vec<BotCall>>,
    next_id: AtomicUsize,
    reject_markdown: bool,
    rate_limited_markdown_edits: AtomicUsize,
    failing_plain_edits: AtomicUsize,
}

impl MockBot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting_markdown() -> Self {
        Self {
            reject_markdown: true,
            ..Self::default()
        }
    }

    pub fn with_rate_limited_markdown_edits(self, n: usize) -> Self {
        self.rate_limited_markdown_edits.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_failing_plain_edits(self, n: usize) -> Self {
        self.failing_plain_edits.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<BotCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn typing_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BotCall::Typing))
            .count()
    }

    /// Replies and plain sends, in order, ignoring edits and typing.
    pub fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BotCall::Send { text } | BotCall::Reply { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<(String, String, TextFormat)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BotCall::Edit { id, text, format } => Some((id, text, format)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BotCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_format(&self, format: TextFormat) -> Result<()> {
        if self.reject_markdown && format == TextFormat::Markdown {
            return Err(DbotError::BadRequest("can't parse entities".to_string()));
        }
        Ok(())
    }

    /// Consumes one failure from `counter` if any are left.
    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn allocate_id(&self) -> String {
        (self.next_id.fetch_add(1, Ordering::SeqCst) + 100).to_string()
    }
}

#[async_trait]
impl Bot for MockBot {
    async fn send_message(&self, _chat: &Chat, text: &str) -> Result<()> {
        self.record(BotCall::Send {
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_message_and_return_id(&self, _chat: &Chat, text: &str) -> Result<String> {
        self.record(BotCall::Send {
            text: text.to_string(),
        });
        Ok(self.allocate_id())
    }

    async fn reply_formatted(
        &self,
        _message: &Message,
        text: &str,
        format: TextFormat,
    ) -> Result<String> {
        self.check_format(format)?;
        let id = self.allocate_id();
        self.record(BotCall::Reply {
            id: id.clone(),
            text: text.to_string(),
            format,
        });
        Ok(id)
    }

    async fn edit_formatted(
        &self,
        _chat: &Chat,
        message_id: &str,
        text: &str,
        format: TextFormat,
    ) -> Result<()> {
        self.check_format(format)?;
        match format {
            TextFormat::Markdown if Self::take_failure(&self.rate_limited_markdown_edits) => {
                return Err(DbotError::RateLimited {
                    retry_after: Duration::from_secs(3),
                });
            }
            TextFormat::Plain if Self::take_failure(&self.failing_plain_edits) => {
                return Err(DbotError::Bot("connection reset".to_string()));
            }
            _ => {}
        }
        self.record(BotCall::Edit {
            id: message_id.to_string(),
            text: text.to_string(),
            format,
        });
        Ok(())
    }

    async fn send_keyboard(
        &self,
        _chat: &Chat,
        text: &str,
        rows: Vec<Vec<InlineButton>>,
    ) -> Result<String> {
        self.record(BotCall::Keyboard {
            text: text.to_string(),
            rows,
        });
        Ok(self.allocate_id())
    }

    async fn send_typing(&self, _chat: &Chat) -> Result<()> {
        self.record(BotCall::Typing);
        Ok(())
    }
}

/// One recorded `ask` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskCall {
    pub prompt: String,
    pub conversation_id: Option<String>,
    pub parent_id: Option<String>,
}

/// Backend that fails the first `failures` calls, then streams `chunks` (cumulative texts).
///
/// Conversation id is the requested one or `conv-1`; parent id is `node-<call number>`.
pub struct ScriptedBackend {
    failures: AtomicUsize,
    chunks: Vec<String>,
    chunk_delay: Option<Duration>,
    /// Yield an error after this many chunks.
    error_after: Option<usize>,
    pub calls: Mutex<Vec<AskCall>>,
    pub resets: Mutex<Vec<Option<String>>>,
}

impl ScriptedBackend {
    pub fn answering(chunks: &[&str]) -> Self {
        Self {
            failures: AtomicUsize::new(0),
            chunks: chunks.iter().map(|s| s.to_string()).collect(),
            chunk_delay: None,
            error_after: None,
            calls: Mutex::new(Vec::new()),
            resets: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures = AtomicUsize::new(failures);
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn with_error_after(mut self, chunks: usize) -> Self {
        self.error_after = Some(chunks);
        self
    }

    pub fn calls(&self) -> Vec<AskCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn resets(&self) -> Vec<Option<String>> {
        self.resets.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn ask(
        &self,
        prompt: &str,
        conversation_id: Option<&str>,
        parent_id: Option<&str>,
    ) -> std::result::Result<AskStream, BackendError> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(AskCall {
                prompt: prompt.to_string(),
                conversation_id: conversation_id.map(str::to_string),
                parent_id: parent_id.map(str::to_string),
            });
            calls.len()
        };

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BackendError::Transient("context too long".to_string()));
        }

        let conversation_id = conversation_id.unwrap_or("conv-1").to_string();
        let parent_id = format!("node-{}", call_number);
        let mut items: Vec<std::result::Result<AskChunk, BackendError>> = self
            .chunks
            .iter()
            .map(|text| {
                Ok(AskChunk {
                    message: text.clone(),
                    conversation_id: conversation_id.clone(),
                    parent_id: parent_id.clone(),
                })
            })
            .collect();
        if let Some(n) = self.error_after {
            items.truncate(n);
            items.push(Err(BackendError::Transient("stream interrupted".to_string())));
        }

        let delay = self.chunk_delay;
        Ok(futures::stream::iter(items)
            .then(move |item| async move {
                if let Some(d) = delay {
                    tokio::time::sleep(d).await;
                }
                item
            })
            .boxed())
    }

    async fn reset_chat(&self, conversation_id: Option<&str>) -> std::result::Result<(), BackendError> {
        self.resets
            .lock()
            .unwrap()
            .push(conversation_id.map(str::to_string));
        Ok(())
    }
}

fn message(user_id: i64, id: &str, content: &str, message_type: &str) -> Message {
    Message {
        id: id.to_string(),
        user: User {
            id: user_id,
            username: Some(format!("user{}", user_id)),
            first_name: Some("Test".to_string()),
            last_name: None,
        },
        chat: Chat {
            id: user_id,
            chat_type: "private".to_string(),
        },
        content: content.to_string(),
        message_type: message_type.to_string(),
        direction: MessageDirection::Incoming,
        created_at: Utc::now(),
        reply_to_message_id: None,
    }
}

pub fn text_message(user_id: i64, content: &str) -> Message {
    message(user_id, "1", content, Message::TEXT)
}

pub fn edited_message(user_id: i64, content: &str) -> Message {
    message(user_id, "1", content, Message::EDITED_TEXT)
}

/// Keyboard press on message `keyboard_id` carrying `data`.
pub fn callback(user_id: i64, keyboard_id: &str, data: &str) -> Message {
    message(user_id, keyboard_id, data, Message::CALLBACK_QUERY)
}
