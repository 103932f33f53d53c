//! Application configuration management.
//!
//! Sources are layered in this order, later ones overriding earlier ones:
//! `config/default.toml`, `config/{RUN_MODE}.toml`, then environment variables
//! prefixed with `SPLITLEDGER` using `__` as the nesting separator
//! (e.g. `SPLITLEDGER__DATABASE__URL`).

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger engine tuning.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Log output configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Ledger engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// How many times a write is re-run after losing an optimistic-lock race.
    #[serde(default = "default_max_write_retries")]
    pub max_write_retries: u32,
    /// Whether the creator of a transaction also receives its notification.
    #[serde(default)]
    pub notify_creator: bool,
    /// Upper bound on settlements accepted in one bulk request.
    #[serde(default = "default_max_bulk_settlements")]
    pub max_bulk_settlements: usize,
}

fn default_max_write_retries() -> u32 {
    3
}

fn default_max_bulk_settlements() -> usize {
    50
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_write_retries: default_max_write_retries(),
            notify_creator: false,
            max_bulk_settlements: default_max_bulk_settlements(),
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` env-filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "splitledger=debug,sea_orm=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("SPLITLEDGER").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Parses configuration from an inline TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or misses required keys.
    pub fn from_toml(document: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(document, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
