//! Base config: Telegram connection, logging, persistence. Loaded from env.

use anyhow::{Context, Result};
use std::env;

/// Which `ConversationStore` backs the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    Sqlite,
    Memory,
}

impl StoreType {
    fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreType::Sqlite),
            "memory" => Ok(StoreType::Memory),
            other => anyhow::bail!("STORE_TYPE must be `sqlite` or `memory`, got `{}`", other),
        }
    }
}

/// Base config: Telegram-related, logging, persistence.
#[derive(Debug, Clone)]
pub struct BaseConfig {
    /// BOT_TOKEN
    pub bot_token: String,
    /// TELEGRAM_API_URL or TELOXIDE_API_URL
    pub telegram_api_url: Option<String>,
    /// LOG_FILE
    pub log_file: String,
    /// DATABASE_URL (SQLite `file:` / `sqlite:` URL or path)
    pub database_url: String,
    /// STORE_TYPE
    pub store_type: StoreType,
}

impl BaseConfig {
    /// Load from environment variables. `token` overrides BOT_TOKEN if provided.
    pub fn load(token: Option<String>) -> Result<Self> {
        let bot_token = match token {
            Some(t) => t,
            None => env::var("BOT_TOKEN").context("BOT_TOKEN not set")?,
        };
        let telegram_api_url = env::var("TELEGRAM_API_URL")
            .or_else(|_| env::var("TELOXIDE_API_URL"))
            .ok();
        let log_file =
            env::var("LOG_FILE").unwrap_or_else(|_| "logs/telegram-bot.log".to_string());
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "file:./chatgpt_telegram_bot.db".to_string());
        let store_type = match env::var("STORE_TYPE") {
            Ok(s) => StoreType::parse(&s)?,
            Err(_) => StoreType::Sqlite,
        };

        Ok(Self {
            bot_token,
            telegram_api_url,
            log_file,
            database_url,
            store_type,
        })
    }

    /// Validate config (telegram_api_url must be a valid URL if set).
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("BOT_TOKEN is empty");
        }
        if let Some(ref url_str) = self.telegram_api_url {
            if reqwest::Url::parse(url_str).is_err() {
                anyhow::bail!(
                    "TELEGRAM_API_URL (or TELOXIDE_API_URL) is set but not a valid URL: {}",
                    url_str
                );
            }
        }
        Ok(())
    }
}
