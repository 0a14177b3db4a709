use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct ItemsConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
}

impl ItemsConfig {
    pub fn load() -> Result<Self, AppError> {
        Ok(ItemsConfig {
            common: core_config::Config::load()?,
        })
    }
}
