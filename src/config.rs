//! Configuration management

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    #[serde(default)]
    pub tls_cert: String,
    #[serde(default)]
    pub tls_key: String,
    /// Directory holding a pre-built dashboard frontend (served at `/`)
    #[serde(default)]
    pub static_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub driver: String,
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Knobs for the store performance computation and the raw report queries
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// Store selected when a page request names none
    #[serde(default = "default_store")]
    pub default_store: String,
    /// Length of the trailing window used when a request omits its dates
    #[serde(default = "default_window_days")]
    pub default_window_days: i64,
    /// Hourly entries/exits above this count raise an alert
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: i64,
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_store() -> String {
    "ASWAQ Barsha".to_string()
}

fn default_window_days() -> i64 {
    10
}

fn default_alert_threshold() -> i64 {
    100
}

fn default_query_timeout_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_store: default_store(),
            default_window_days: default_window_days(),
            alert_threshold: default_alert_threshold(),
            query_timeout_ms: default_query_timeout_ms(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl AnalyticsConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_live_enabled")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_live_enabled() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            enabled: default_live_enabled(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";

        let builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("FOOTFALL").separator("__"));

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate server config
        if self.server.http_port == 0 {
            anyhow::bail!("Invalid http_port: 0 is not allowed");
        }
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }

        // Validate database config
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.database.driver != "sqlite" {
            anyhow::bail!("Invalid database driver '{}'. Must be 'sqlite'", self.database.driver);
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }

        // Validate TLS (both or neither must be set)
        let has_cert = !self.server.tls_cert.is_empty();
        let has_key = !self.server.tls_key.is_empty();
        if has_cert != has_key {
            anyhow::bail!("TLS configuration incomplete: both tls_cert and tls_key must be set, or neither");
        }

        // Validate logging level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("Invalid logging level '{}'. Must be one of: {:?}", self.logging.level, valid_levels);
        }

        // Validate analytics knobs
        if self.analytics.default_window_days < 0 {
            anyhow::bail!("analytics.default_window_days cannot be negative");
        }
        if self.analytics.max_attempts == 0 {
            anyhow::bail!("analytics.max_attempts must be at least 1");
        }
        if self.analytics.query_timeout_ms == 0 {
            anyhow::bail!("analytics.query_timeout_ms must be greater than 0");
        }
        if self.live.enabled && self.live.poll_interval_secs == 0 {
            anyhow::bail!("live.poll_interval_secs must be greater than 0");
        }

        Ok(())
    }

    pub fn tls_enabled(&self) -> bool {
        !self.server.tls_cert.is_empty() && !self.server.tls_key.is_empty()
    }
}
