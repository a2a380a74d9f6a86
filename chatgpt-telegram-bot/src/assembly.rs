//! Assembly: turns env config into the OpenAI backend and the dialog handler.

use anyhow::Result;
use llm_client::{ChatBackend, EnvLlmConfig, LlmConfig, OpenAIChatBackend};
use llm_handlers::{DialogHandler, DialogSettings};
use openai_client::mask_token;
use std::sync::Arc;
use telegram_bot::{BotComponents, BotConfig, Handler};
use tracing::info;

/// Dialog settings from the app extensions plus the streaming switch.
pub fn dialog_settings(config: &BotConfig, use_streaming: bool) -> DialogSettings {
    let ext = config.extensions();
    DialogSettings {
        use_streaming,
        new_dialog_timeout: ext.new_dialog_timeout(),
        stream_edit_interval: ext.stream_edit_interval(),
        typing_interval: ext.typing_interval(),
    }
}

pub fn build_openai_backend(llm_cfg: &EnvLlmConfig) -> Arc<dyn ChatBackend> {
    info!(
        api_key = %mask_token(llm_cfg.api_key()),
        base_url = %llm_cfg.base_url(),
        model = %llm_cfg.model(),
        streaming = llm_cfg.use_streaming(),
        custom_system_prompt = llm_cfg.system_prompt().is_some(),
        "Configuring OpenAI backend"
    );
    Arc::new(
        OpenAIChatBackend::with_base_url(
            llm_cfg.api_key().to_string(),
            llm_cfg.base_url().to_string(),
        )
        .with_model(llm_cfg.model().to_string())
        .with_system_prompt_opt(llm_cfg.system_prompt().map(String::from)),
    )
}

/// Dialog handler over the components' bot and store.
pub fn build_dialog_handler(
    config: &BotConfig,
    components: BotComponents,
    backend: Arc<dyn ChatBackend>,
    use_streaming: bool,
) -> Arc<dyn Handler> {
    Arc::new(DialogHandler::new(
        components.handler_bot,
        components.store,
        backend,
        dialog_settings(config, use_streaming),
    ))
}
