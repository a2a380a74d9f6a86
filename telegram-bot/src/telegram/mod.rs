//! Telegram transport layer: update adapters, Bot implementation, dispatcher runner.

mod adapters;
mod bot_adapter;
mod runner;

pub use adapters::{TelegramCallbackWrapper, TelegramMessageWrapper, TelegramUserWrapper};
pub use bot_adapter::{map_request_error, TelegramBotAdapter};
pub use runner::run_dispatcher;
