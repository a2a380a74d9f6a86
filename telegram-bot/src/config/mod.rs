//! Bot configuration: BaseConfig (Telegram + log + persistence) + AppExtensions (dialog settings).

mod base;
mod bot_config;
mod extensions;


pub use base::{BaseConfig, StoreType};
pub use bot_config::BotConfig;
pub use extensions::{parse_usernames, AppExtensions, BaseAppExtensions};
