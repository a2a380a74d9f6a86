//! # Telegram bot framework
//!
//! Transport-agnostic core (Handler, Bot, Message), the handler chain, env config, logging,
//! and the Telegram dispatcher. Application handlers are injected through [`run_bot`].

pub mod chain;
pub mod cli;
pub mod components;
pub mod config;
pub mod core;
pub mod handlers;
pub mod runner;
pub mod telegram;

pub use cli::{load_config, Cli, Commands};

pub use core::{
    init_tracing, is_message_not_modified_error, parse_message_id, Bot, Chat, DbotError, Handler,
    HandlerError, HandlerResponse, InlineButton, Message, MessageDirection, Result, TextFormat,
    ToCoreMessage, ToCoreUser, User,
};

pub use chain::HandlerChain;

pub use telegram::{
    map_request_error, run_dispatcher, TelegramBotAdapter, TelegramCallbackWrapper,
    TelegramMessageWrapper, TelegramUserWrapper,
};

pub use components::{build_bot_components, build_handler_chain, create_store, BotComponents};
pub use config::{AppExtensions, BaseAppExtensions, BaseConfig, BotConfig, StoreType};
pub use handlers::{AuthHandler, LoggingHandler};
pub use runner::{build_chain_only, run_bot};
