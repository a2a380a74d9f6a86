//! User-facing texts.

pub const HELP_MESSAGE: &str = "Commands:
⚪ /new – Start new dialog
⚪ /retry – Regenerate last bot answer
⚪ /mode – Select chat mode
⚪ /help – Show help
";

pub const NEW_DIALOG: &str = "Starting new dialog ✅";
pub const NEW_DIALOG_TIMEOUT: &str = "Starting new dialog due to timeout ✅";
pub const NO_MESSAGE_TO_RETRY: &str = "No message to retry 🤷‍♂️";
pub const EDITING_NOT_SUPPORTED: &str = "🥲 Unfortunately, message **editing** is not supported";
pub const SELECT_CHAT_MODE: &str = "Select chat mode:";

/// Callback data prefix of the chat mode keyboard buttons.
pub const SET_CHAT_MODE_PREFIX: &str = "set_chat_mode|";

/// Telegram's limit on the length of one text message, in characters.
pub const MESSAGE_LIMIT: usize = 4096;

pub fn greeting() -> String {
    format!(
        "Hi! I'm **ChatGPT** bot implemented with GPT-3.5 OpenAI API 🤖\n\n{}\nAnd now... ask me anything!",
        HELP_MESSAGE
    )
}

pub fn completion_failed(reason: &impl std::fmt::Display) -> String {
    format!("Something went wrong during completion. Reason: {}", reason)
}

pub fn chat_mode_set(name: &str) -> String {
    format!("**{}** chat mode is set", name)
}

/// Note sent when shrink-and-retry dropped `n` (> 0) leading dialog messages.
pub fn dialog_too_long(n: usize) -> String {
    if n == 1 {
        "✍️ __Note:__ Your current dialog is too long, so your **first message** was removed from the context.\n Send /new command to start new dialog".to_string()
    } else {
        format!(
            "✍️ __Note:__ Your current dialog is too long, so **{} first messages** were removed from the context.\n Send /new command to start new dialog",
            n
        )
    }
}

/// Splits `text` into pieces of at most `limit` characters, never inside a character.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() || limit == 0 {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit)
        .map(|c| c.iter().collect::<String>())
        .collect()
}
