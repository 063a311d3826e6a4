//! Hierarchical config loading: programmatic defaults, merged with an
//! optional YAML file, merged with environment variables (highest
//! precedence). `DAYKEEPER_` prefixed env vars use `__` as the nesting
//! separator (e.g. `DAYKEEPER_SERVER__BIND_ADDR`).

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use super::model::AppConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid rate_limit.max_requests: {0}, must be at least 1")]
    InvalidMaxRequests(u32),

    #[error("invalid rate_limit.window_secs: {0}, must be at least 1")]
    InvalidWindowSecs(u64),

    #[error("invalid logging.level: {0}, must be one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid logging.format: {0}, must be one of json, pretty")]
    InvalidLogFormat(String),

    #[error("database.url cannot be empty")]
    EmptyDatabaseUrl,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads config from (lowest to highest precedence): built-in defaults,
    /// `config.yaml` in the working directory (optional), `DAYKEEPER_*`
    /// environment variables.
    pub fn load() -> Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file("config.yaml"))
            .merge(Env::prefixed("DAYKEEPER_").split("__"))
            .extract()
            .context("failed to extract configuration")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("DAYKEEPER_").split("__"))
            .extract()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
        if config.database.url.is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }
        if config.rate_limit.max_requests == 0 {
            return Err(ConfigError::InvalidMaxRequests(config.rate_limit.max_requests));
        }
        if config.rate_limit.window_secs == 0 {
            return Err(ConfigError::InvalidWindowSecs(config.rate_limit.window_secs));
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        ConfigLoader::validate(&config).expect("default config should validate");
    }

    #[test]
    fn rejects_zero_max_requests() {
        let mut config = AppConfig::default();
        config.rate_limit.max_requests = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxRequests(0))
        ));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidLogLevel(_))));
    }
}
