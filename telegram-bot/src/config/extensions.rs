//! App extensions: dialog behavior settings layered on top of [`super::BaseConfig`].
//! LLM config (model, API key, streaming) lives in llm-client.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Dialog-level settings consumed by handlers.
pub trait AppExtensions: Send + Sync {
    /// Usernames allowed to talk to the bot; empty means everyone.
    fn allowed_usernames(&self) -> &[String];
    /// Idle time after which a plain message starts a new dialog.
    fn new_dialog_timeout(&self) -> Duration;
    /// Interval between edits of a streamed answer.
    fn stream_edit_interval(&self) -> Duration;
    /// Interval between "typing" actions while an answer is in flight.
    fn typing_interval(&self) -> Duration;
}

#[derive(Debug, Clone)]
pub struct BaseAppExtensions {
    pub allowed_telegram_usernames: Vec<String>,
    pub new_dialog_timeout_secs: u64,
    pub stream_edit_interval_ms: u64,
    pub typing_interval_secs: u64,
}

impl Default for BaseAppExtensions {
    fn default() -> Self {
        Self {
            allowed_telegram_usernames: Vec::new(),
            new_dialog_timeout_secs: 600,
            stream_edit_interval_ms: 500,
            typing_interval_secs: 4,
        }
    }
}

impl AppExtensions for BaseAppExtensions {
    fn allowed_usernames(&self) -> &[String] {
        &self.allowed_telegram_usernames
    }
    fn new_dialog_timeout(&self) -> Duration {
        Duration::from_secs(self.new_dialog_timeout_secs)
    }
    fn stream_edit_interval(&self) -> Duration {
        Duration::from_millis(self.stream_edit_interval_ms)
    }
    fn typing_interval(&self) -> Duration {
        Duration::from_secs(self.typing_interval_secs)
    }
}

/// Splits a comma list of usernames; drops blanks and a leading `@`.
pub fn parse_usernames(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('@'))
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(s) => s
            .trim()
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got `{}`", key, s)),
        Err(_) => Ok(default),
    }
}

impl BaseAppExtensions {
    /// Load from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let allowed_telegram_usernames = env::var("ALLOWED_TELEGRAM_USERNAMES")
            .map(|s| parse_usernames(&s))
            .unwrap_or_default();
        let stream_edit_interval_ms =
            env_u64("STREAM_EDIT_INTERVAL_MS", defaults.stream_edit_interval_ms)?;
        let typing_interval_secs = env_u64("TYPING_INTERVAL_SECS", defaults.typing_interval_secs)?;
        if stream_edit_interval_ms == 0 || typing_interval_secs == 0 {
            anyhow::bail!("STREAM_EDIT_INTERVAL_MS and TYPING_INTERVAL_SECS must be positive");
        }

        Ok(Self {
            allowed_telegram_usernames,
            new_dialog_timeout_secs: env_u64(
                "NEW_DIALOG_TIMEOUT_SECS",
                defaults.new_dialog_timeout_secs,
            )?,
            stream_edit_interval_ms,
            typing_interval_secs,
        })
    }
}
