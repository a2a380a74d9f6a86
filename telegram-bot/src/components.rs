//! Component factory: builds BotComponents from config. Isolates assembly logic from runner.

use anyhow::{Context, Result};
use std::sync::Arc;
use storage::{ConversationStore, InMemoryConversationStore, SqliteConversationStore};
use tracing::{error, info, instrument};

use crate::chain::HandlerChain;
use crate::config::{BotConfig, StoreType};
use crate::core::{Bot, Handler};
use crate::handlers::{AuthHandler, LoggingHandler};
use crate::telegram::TelegramBotAdapter;

/// Core dependencies handed to the handler factory.
#[derive(Clone)]
pub struct BotComponents {
    pub teloxide_bot: teloxide::Bot,
    /// Bot used by handlers to talk back; the Telegram adapter unless overridden (tests).
    pub handler_bot: Arc<dyn Bot>,
    pub store: Arc<dyn ConversationStore>,
}

/// Creates the conversation store selected by STORE_TYPE.
#[instrument(skip(config))]
pub async fn create_store(config: &BotConfig) -> Result<Arc<dyn ConversationStore>> {
    match config.store_type() {
        StoreType::Sqlite => {
            info!(database_url = %config.database_url(), "Using SQLite conversation store");
            let store = SqliteConversationStore::new(config.database_url())
                .await
                .map_err(|e| {
                    error!(error = %e, database_url = %config.database_url(), "Failed to initialize storage");
                    anyhow::anyhow!("Failed to initialize storage: {}", e)
                })?;
            Ok(Arc::new(store))
        }
        StoreType::Memory => {
            info!("Using in-memory conversation store");
            Ok(Arc::new(InMemoryConversationStore::new()))
        }
    }
}

/// teloxide Bot with the optional API URL override applied.
pub fn build_teloxide_bot(config: &BotConfig) -> Result<teloxide::Bot> {
    let bot = teloxide::Bot::new(config.bot_token().to_string());
    match config.telegram_api_url() {
        Some(url_str) => {
            let url = reqwest::Url::parse(url_str)
                .with_context(|| format!("Invalid TELEGRAM_API_URL: {}", url_str))?;
            info!(url = %url_str, "Using custom Telegram API URL");
            Ok(bot.set_api_url(url))
        }
        None => Ok(bot),
    }
}

/// Builds BotComponents. `handler_bot_override` replaces the Telegram adapter for handlers.
#[instrument(skip(config, store, handler_bot_override))]
pub async fn build_bot_components(
    config: &BotConfig,
    store: Arc<dyn ConversationStore>,
    handler_bot_override: Option<Arc<dyn Bot>>,
) -> Result<BotComponents> {
    let teloxide_bot = build_teloxide_bot(config)?;
    let handler_bot = handler_bot_override
        .unwrap_or_else(|| Arc::new(TelegramBotAdapter::new(teloxide_bot.clone())));
    Ok(BotComponents {
        teloxide_bot,
        handler_bot,
        store,
    })
}

/// Builds the handler chain (logging → allowlist → application handler).
pub fn build_handler_chain(config: &BotConfig, handler: Arc<dyn Handler>) -> HandlerChain {
    HandlerChain::new()
        .add_handler(Arc::new(LoggingHandler))
        .add_handler(Arc::new(AuthHandler::new(
            config.extensions().allowed_usernames().to_vec(),
        )))
        .add_handler(handler)
}
