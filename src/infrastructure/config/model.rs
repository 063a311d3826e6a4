//! Application configuration shape.
//!
//! One top-level struct composed of nested, independently-defaulted
//! sections, every field `#[serde(default = ...)]` so a partial YAML
//! document or an empty one both produce a valid config.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub wake_client: WakeClientConfig,
    #[serde(default)]
    pub user: UserConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            auth: AuthConfig::default(),
            wake_client: WakeClientConfig::default(),
            user: UserConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "sqlite://daykeeper.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Fixed-window rate limit applied per remote address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

const fn default_window_secs() -> u64 {
    60
}

const fn default_max_requests() -> u32 {
    120
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
        }
    }
}

/// `x-api-key`/`x-admin-key` credentials. Empty string disables the
/// corresponding check (useful for local dev), never logged.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct AuthConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub admin_key: String,
}

impl AuthConfig {
    pub fn api_key_required(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn admin_key_required(&self) -> bool {
        !self.admin_key.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WakeClientConfig {
    #[serde(default = "default_wake_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_wake_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

const fn default_wake_timeout_secs() -> u64 {
    5
}

const fn default_wake_connect_timeout_secs() -> u64 {
    3
}

impl Default for WakeClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_wake_timeout_secs(),
            connect_timeout_secs: default_wake_connect_timeout_secs(),
        }
    }
}

/// Seeds the `user.*` settings rows on first run; subsequent changes
/// happen through the settings store, not this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UserConfig {
    #[serde(default = "default_user_id")]
    pub id: String,
    #[serde(default = "default_user_timezone")]
    pub timezone: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: default_user_id(),
            timezone: default_user_timezone(),
        }
    }
}

fn default_user_id() -> String {
    "unknown".to_string()
}

fn default_user_timezone() -> String {
    "Local".to_string()
}
