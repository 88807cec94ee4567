use config::{Config, ConfigError, Environment, File};
use ladder_common::LadderSettings;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ladder: LadderSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("database.url", "postgres://localhost/ladder")?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., LADDER__DATABASE__URL)
            .add_source(Environment::with_prefix("LADDER").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
