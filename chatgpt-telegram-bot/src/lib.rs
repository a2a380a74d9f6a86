//! # chatgpt_telegram_bot
//!
//! Entry points for running the ChatGPT bot: [`run_chatgpt_bot`] for production and
//! [`build_chatgpt_chain`] for driving the full chain with a mock bot and backend.

mod assembly;

use anyhow::Result;
use llm_client::{ChatBackend, EnvLlmConfig, LlmConfig};
use std::sync::Arc;
use storage::ConversationStore;
use telegram_bot::{build_chain_only, run_bot, Bot, BotConfig, HandlerChain};

pub use assembly::{build_dialog_handler, build_openai_backend, dialog_settings};

/// Runs the bot with the OpenAI backend. LLM config is read before the dispatcher starts so a
/// missing `OPENAI_API_KEY` fails fast.
pub async fn run_chatgpt_bot(config: BotConfig) -> Result<()> {
    let llm_cfg = EnvLlmConfig::from_env()?;
    let use_streaming = llm_cfg.use_streaming();
    run_bot(config, move |config, components| {
        let backend = build_openai_backend(&llm_cfg);
        Ok(build_dialog_handler(config, components, backend, use_streaming))
    })
    .await
}

/// Same pipeline as [`run_chatgpt_bot`] without the dispatcher: returns the handler chain.
pub async fn build_chatgpt_chain(
    config: &BotConfig,
    store: Arc<dyn ConversationStore>,
    handler_bot: Arc<dyn Bot>,
    backend: Arc<dyn ChatBackend>,
    use_streaming: bool,
) -> Result<HandlerChain> {
    build_chain_only(config, store, handler_bot, move |config, components| {
        Ok(build_dialog_handler(config, components, backend, use_streaming))
    })
    .await
}
