use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::adapters::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_INTERVAL, DEFAULT_YAHOO_BASE};
use crate::domain::Delivery;
use crate::error::{QuoteSyncError, Result};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Chart API base, e.g. `https://query2.finance.yahoo.com/v8`
    pub base_url: String,
    /// Candle interval requested from the chart endpoint
    pub interval: String,
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_YAHOO_BASE.to_string(),
            interval: DEFAULT_INTERVAL.to_string(),
            user_agent: concat!("quote-sync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    #[default]
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// PostgreSQL connection URL
    pub database_url: Option<String>,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Apply bundled migrations on first connect
    pub run_migrations: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_url: None,
            max_connections: 5,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    Http,
    #[default]
    Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    Fanout,
    Direct,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub backend: BusBackend,
    /// Endpoint the HTTP publisher posts to
    pub topic_url: Option<String>,
    pub delivery: DeliveryMode,
    /// Required for direct delivery
    pub destination: Option<String>,
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: BusBackend::default(),
            topic_url: None,
            delivery: DeliveryMode::default(),
            destination: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl BusConfig {
    pub fn delivery(&self) -> Result<Delivery> {
        match self.delivery {
            DeliveryMode::Fanout => Ok(Delivery::Fanout),
            DeliveryMode::Direct => match self.destination.as_deref().map(str::trim) {
                Some(destination) if !destination.is_empty() => Ok(Delivery::Direct {
                    destination: destination.to_string(),
                }),
                _ => Err(QuoteSyncError::InvalidConfig(vec![
                    "bus.destination is required for direct delivery".to_string(),
                ])),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info,quote_sync=debug,sqlx=warn".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("store.max_connections", 5)?
            .set_default("bus.channel_capacity", DEFAULT_CHANNEL_CAPACITY as u64)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("QUOTE_SYNC_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (QUOTE_SYNC_STORE__DATABASE_URL, etc.)
            .add_source(
                Environment::with_prefix("QUOTE_SYNC")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.source.base_url.trim().is_empty() {
            errors.push("source.base_url must not be empty".to_string());
        }
        if self.source.interval.trim().is_empty() {
            errors.push("source.interval must not be empty".to_string());
        }

        if self.store.backend == StoreBackend::Postgres {
            if is_blank(&self.store.database_url) {
                errors.push("store.database_url is required for the postgres backend".to_string());
            }
            if self.store.max_connections == 0 {
                errors.push("store.max_connections must be positive".to_string());
            }
        }

        match self.bus.backend {
            BusBackend::Http if is_blank(&self.bus.topic_url) => {
                errors.push("bus.topic_url is required for the http backend".to_string());
            }
            BusBackend::Channel if self.bus.channel_capacity == 0 => {
                errors.push("bus.channel_capacity must be positive".to_string());
            }
            _ => {}
        }

        if self.bus.delivery == DeliveryMode::Direct && is_blank(&self.bus.destination) {
            errors.push("bus.destination is required for direct delivery".to_string());
        }

        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!("server.bind '{}' is not a socket address", self.server.bind));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
