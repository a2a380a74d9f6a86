//! # Prompt
//!
//! Chat modes (personas) and the prompt text sent to the ChatGPT backend.
//!
//! ## Modules
//!
//! - [`chat_mode`] – static persona catalog (`normal`, `assistant`, ...)
//! - [`builder`] – [`build_prompt`]: persona + message → literal prompt
//!
//! Dialog history is never interpolated into the prompt; context is carried by the backend's
//! conversation / parent linkage.

mod builder;
mod chat_mode;
mod error;

pub use builder::{build_prompt, postprocess_answer, ANSWER_MARKER, USER_MARKER};
pub use chat_mode::{chat_modes, find_chat_mode, ChatMode, CHAT_MODES, DEFAULT_CHAT_MODE};
pub use error::PromptError;

/// Role of a message, one-to-one with OpenAI Chat Completions API `role` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    /// System instruction (API `role: "system"`).
    System,
    /// User message (API `role: "user"`).
    User,
    /// Assistant message (API `role: "assistant"`).
    Assistant,
}

/// A single chat message, one-to-one with one element of OpenAI `messages` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}
