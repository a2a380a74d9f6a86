//! Prompt building: persona prefix + current message.

use crate::chat_mode::{find_chat_mode, DEFAULT_CHAT_MODE};
use crate::error::PromptError;

/// Marker placed before the user message in persona prompts.
pub const USER_MARKER: &str = "User: ";

/// Marker that closes persona prompts; the model continues after it.
pub const ANSWER_MARKER: &str = "ChatGPT: ";

/// Builds the literal prompt for `message` under `chat_mode`.
///
/// `"normal"` returns the message unchanged; every other persona returns
/// `prompt_start + "\n\n" + "User: " + message + "\n" + "ChatGPT: "`.
/// Fails with [`PromptError::UnknownPersona`] when the key is not in the catalog.
pub fn build_prompt(message: &str, chat_mode: &str) -> Result<String, PromptError> {
    let mode = find_chat_mode(chat_mode)
        .ok_or_else(|| PromptError::UnknownPersona(chat_mode.to_string()))?;

    if mode.key == DEFAULT_CHAT_MODE {
        return Ok(message.to_string());
    }

    let mut prompt = String::with_capacity(
        mode.prompt_start.len() + message.len() + USER_MARKER.len() + ANSWER_MARKER.len() + 3,
    );
    prompt.push_str(mode.prompt_start);
    prompt.push_str("\n\n");
    prompt.push_str(USER_MARKER);
    prompt.push_str(message);
    prompt.push('\n');
    prompt.push_str(ANSWER_MARKER);
    Ok(prompt)
}

/// Final answer clean-up: trims leading/trailing whitespace.
pub fn postprocess_answer(answer: &str) -> String {
    answer.trim().to_string()
}
