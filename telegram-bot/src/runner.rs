//! Entry points: build components, let the caller create the application handler, then run the
//! dispatcher.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::chain::HandlerChain;
use crate::components::{build_bot_components, build_handler_chain, create_store, BotComponents};
use crate::config::BotConfig;
use crate::core::{init_tracing, Bot, Handler};
use crate::telegram::run_dispatcher;

/// Main entry: validate config, init logging, build components, create the handler via the
/// factory, then run the dispatcher until Ctrl-C.
#[instrument(skip(config, make_handler))]
pub async fn run_bot<F>(config: BotConfig, make_handler: F) -> Result<()>
where
    F: FnOnce(&BotConfig, BotComponents) -> Result<Arc<dyn Handler>>,
{
    config.validate()?;
    init_tracing(config.log_file())?;

    info!(
        database_url = %config.database_url(),
        store_type = ?config.store_type(),
        "Initializing bot"
    );

    let store = create_store(&config).await?;
    let components = build_bot_components(&config, store, None).await?;
    let teloxide_bot = components.teloxide_bot.clone();
    let handler = make_handler(&config, components)?;
    let handler_chain = build_handler_chain(&config, handler);

    info!("Bot started successfully");
    run_dispatcher(teloxide_bot, handler_chain).await
}

/// Builds the handler chain without starting the dispatcher or logging. Used by integration
/// tests that inject a mock bot and a store and drive the chain with core messages.
pub async fn build_chain_only<F>(
    config: &BotConfig,
    store: Arc<dyn storage::ConversationStore>,
    handler_bot: Arc<dyn Bot>,
    make_handler: F,
) -> Result<HandlerChain>
where
    F: FnOnce(&BotConfig, BotComponents) -> Result<Arc<dyn Handler>>,
{
    config.validate()?;
    let components = build_bot_components(config, store, Some(handler_bot)).await?;
    let handler = make_handler(config, components)?;
    Ok(build_handler_chain(config, handler))
}
