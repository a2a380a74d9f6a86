//! BotConfig: BaseConfig + BaseAppExtensions. Use load() for env-based loading.

use anyhow::Result;

use super::{AppExtensions, BaseAppExtensions, BaseConfig, StoreType};

pub struct BotConfig {
    pub base: BaseConfig,
    pub extensions: BaseAppExtensions,
}

impl BotConfig {
    /// Load full config from environment variables. If `token` is provided it overrides BOT_TOKEN.
    /// Call validate() after load to check config before init.
    pub fn load(token: Option<String>) -> Result<Self> {
        let base = BaseConfig::load(token)?;
        let extensions = BaseAppExtensions::from_env()?;
        Ok(Self { base, extensions })
    }

    pub fn validate(&self) -> Result<()> {
        self.base.validate()
    }

    pub fn base(&self) -> &BaseConfig {
        &self.base
    }
    pub fn extensions(&self) -> &dyn AppExtensions {
        &self.extensions
    }

    pub fn bot_token(&self) -> &str {
        &self.base.bot_token
    }
    pub fn database_url(&self) -> &str {
        &self.base.database_url
    }
    pub fn log_file(&self) -> &str {
        &self.base.log_file
    }
    pub fn telegram_api_url(&self) -> Option<&str> {
        self.base.telegram_api_url.as_deref()
    }
    pub fn store_type(&self) -> StoreType {
        self.base.store_type
    }
}
