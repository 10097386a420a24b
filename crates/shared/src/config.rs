//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger engine tuning.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
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

/// Running-balance job and event bus tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Rows read per page during the organization-wide pass.
    #[serde(default = "default_organization_page_size")]
    pub organization_page_size: u64,
    /// Rows read per page during a single-office recompute.
    #[serde(default = "default_office_page_size")]
    pub office_page_size: u64,
    /// Number of row updates flushed per storage round trip.
    #[serde(default = "default_flush_batch_size")]
    pub flush_batch_size: usize,
    /// Upper bound on pages read by one job run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Seconds between scheduled running-balance runs.
    #[serde(default = "default_schedule_interval_secs")]
    pub schedule_interval_secs: u64,
    /// Capacity of the posting event broadcast channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_organization_page_size() -> u64 {
    500_000
}

fn default_office_page_size() -> u64 {
    10_000
}

fn default_flush_batch_size() -> usize {
    1_000
}

fn default_max_iterations() -> u32 {
    10_000
}

fn default_schedule_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_event_channel_capacity() -> usize {
    1_024
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            organization_page_size: default_organization_page_size(),
            office_page_size: default_office_page_size(),
            flush_batch_size: default_flush_batch_size(),
            max_iterations: default_max_iterations(),
            schedule_interval_secs: default_schedule_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
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
            .add_source(config::Environment::with_prefix("LEDGERLINE").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
