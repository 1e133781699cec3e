//! # configs
//!
//! Layered configuration for Rusty-Ratings: built-in defaults, then an
//! optional `rusty-ratings.toml`, then `RATINGS__SECTION__KEY` environment
//! variables (a `.env` file is honoured).

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub const ENV_PREFIX: &str = "RATINGS";
pub const CONFIG_FILE: &str = "rusty-ratings";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub counter: CounterConfig,
    pub cache: CacheConfig,
    pub verification: VerificationConfig,
    pub auth: AuthConfig,
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterBackend {
    Memory,
    Redis,
}

/// Whether increments extend the window expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Expiry set once, when the key is created.
    Fixed,
    /// Expiry pushed back on every increment.
    Sliding,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CounterConfig {
    pub backend: CounterBackend,
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub window_secs: u64,
    pub mode: WindowMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    pub max_recent: u64,
    pub min_ratio_sample: u64,
    pub low_score_max: u8,
    pub high_score_min: u8,
    pub low_ratio: f64,
    pub high_ratio: f64,
}

#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for caller tokens.
    pub secret: SecretString,
    /// Users allowed to list individual ratings.
    #[serde(default)]
    pub moderators: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

impl AppConfig {
    /// Loads `.env`, the optional config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            info!(path = %path.display(), "loaded .env");
        }
        let builder = Self::defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("auth.moderators"),
            );
        Self::from_builder(builder)
    }

    /// Builder pre-populated with every default.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080_i64)?
            .set_default("database.url", "sqlite:rusty_ratings.db")?
            .set_default("database.max_connections", 5_i64)?
            .set_default("counter.backend", "memory")?
            .set_default("counter.key_prefix", "rr:recent")?
            .set_default("counter.window_secs", 300_i64)?
            .set_default("counter.mode", "fixed")?
            .set_default("cache.ttl_secs", 300_i64)?
            .set_default("verification.max_recent", 100_i64)?
            .set_default("verification.min_ratio_sample", 5_i64)?
            .set_default("verification.low_score_max", 1_i64)?
            .set_default("verification.high_score_min", 4_i64)?
            .set_default("verification.low_ratio", 0.6)?
            .set_default("verification.high_ratio", 0.6)?
            .set_default("auth.secret", "dev-secret")?
            .set_default("auth.moderators", Vec::<String>::new())?
            .set_default("log_level", "info")?
            .set_default("log_format", "compact")?)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let cfg: AppConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid =
            |msg: &str| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg.to_string())) };

        if self.database.max_connections == 0 {
            return invalid("database.max_connections must be at least 1");
        }
        if self.counter.window_secs == 0 {
            return invalid("counter.window_secs must be positive");
        }
        if self.counter.backend == CounterBackend::Redis && self.counter.redis_url.is_none() {
            return invalid("counter.redis_url is required for the redis backend");
        }
        if self.cache.ttl_secs == 0 {
            return invalid("cache.ttl_secs must be positive");
        }

        let v = &self.verification;
        if v.low_score_max > 5 || v.high_score_min > 5 {
            return invalid("verification score bounds must be within 0..=5");
        }
        for ratio in [v.low_ratio, v.high_ratio] {
            if !(0.0..=1.0).contains(&ratio) {
                return invalid("verification ratios must be within 0.0..=1.0");
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}
