//! Configuration handling for dual-pool.
//!
//! The binary reads [`Config`] from CLI arguments and environment variables and
//! turns it into a library-level [`StoreConfig`]. Library users build a
//! `StoreConfig` directly.

use crate::db::breaker::{
    BreakerConfig, DEFAULT_BREAKER_TIMEOUT_MS, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_SUCCESS_THRESHOLD,
};
use crate::error::{DbError, DbResult};
use crate::models::StoreMode;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SQLITE_PATH: &str = "data/database.sqlite";
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_SLOW_QUERY_MS: u64 = 1000;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 0;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Networked connection pool options.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 10)
    pub max_connections: Option<u32>,
    /// Minimum connections in pool (default: 0)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
}

impl PoolOptions {
    pub fn max_connections_or_default(&self) -> u32 {
        self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    pub fn idle_timeout_or_default(&self) -> u64 {
        self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS)
    }

    pub fn acquire_timeout_or_default(&self) -> u64 {
        self.acquire_timeout_secs
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let max = self.max_connections_or_default();
        if max == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }
        let min = self.min_connections_or_default();
        if min > max {
            return Err(format!(
                "min_connections ({}) cannot exceed max_connections ({})",
                min, max
            ));
        }
        if self.acquire_timeout_or_default() == 0 {
            return Err("acquire_timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Everything `Pool::open` needs.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL URL; selects the networked backend when present and non-empty
    pub database_url: Option<String>,
    /// SQLite file used by the embedded backend
    pub sqlite_path: PathBuf,
    pub pool_options: PoolOptions,
    pub breaker: BreakerConfig,
    /// Pause before the single retry of a connection-class failure
    pub retry_delay: Duration,
    /// Networked statements slower than this are logged at warn level
    pub slow_query_threshold: Duration,
    /// Extra column names normalized to booleans on the embedded backend
    pub bool_columns: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            sqlite_path: PathBuf::from(DEFAULT_SQLITE_PATH),
            pool_options: PoolOptions::default(),
            breaker: BreakerConfig::default(),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            slow_query_threshold: Duration::from_millis(DEFAULT_SLOW_QUERY_MS),
            bool_columns: Vec::new(),
        }
    }
}

impl StoreConfig {
    pub fn embedded(path: impl Into<PathBuf>) -> Self {
        Self::default().with_sqlite_path(path)
    }

    pub fn networked(url: impl Into<String>) -> Self {
        Self::default().with_database_url(url)
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_sqlite_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sqlite_path = path.into();
        self
    }

    pub fn with_pool_options(mut self, options: PoolOptions) -> Self {
        self.pool_options = options;
        self
    }

    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    pub fn with_bool_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bool_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// The networked URL, if one is configured.
    pub fn networked_url(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn mode(&self) -> StoreMode {
        if self.networked_url().is_some() {
            StoreMode::Networked
        } else {
            StoreMode::Embedded
        }
    }

    pub fn validate(&self) -> DbResult<()> {
        self.pool_options.validate().map_err(DbError::config)?;
        if self.breaker.failure_threshold == 0 {
            return Err(DbError::config("failure_threshold must be greater than 0"));
        }
        if self.breaker.success_threshold == 0 {
            return Err(DbError::config("success_threshold must be greater than 0"));
        }
        if self.mode() == StoreMode::Embedded && self.sqlite_path.as_os_str().is_empty() {
            return Err(DbError::config("sqlite_path cannot be empty"));
        }
        Ok(())
    }
}

/// Configuration for the dual-pool binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dual-pool",
    about = "Run SQL against PostgreSQL or an embedded SQLite file through one interface",
    version,
    author
)]
pub struct Config {
    /// PostgreSQL connection URL. When absent the embedded SQLite backend is used.
    #[arg(long, value_name = "URL", env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// SQLite database file for the embedded backend
    #[arg(long, default_value = DEFAULT_SQLITE_PATH, env = "SQLITE_PATH")]
    pub sqlite_path: PathBuf,

    /// Maximum networked pool connections
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "DB_MAX_CONNECTIONS")]
    pub max_connections: u32,

    /// Minimum networked pool connections
    #[arg(long, default_value_t = DEFAULT_MIN_CONNECTIONS, env = "DB_MIN_CONNECTIONS")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS,
        env = "DB_ACQUIRE_TIMEOUT_SECS"
    )]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_IDLE_TIMEOUT_SECS,
        env = "DB_IDLE_TIMEOUT_SECS"
    )]
    pub idle_timeout_secs: u64,

    /// Consecutive failures that open the circuit breaker
    #[arg(
        long,
        default_value_t = DEFAULT_FAILURE_THRESHOLD,
        env = "BREAKER_FAILURE_THRESHOLD"
    )]
    pub failure_threshold: u32,

    /// Half-open successes that close the circuit breaker
    #[arg(
        long,
        default_value_t = DEFAULT_SUCCESS_THRESHOLD,
        env = "BREAKER_SUCCESS_THRESHOLD"
    )]
    pub success_threshold: u32,

    /// How long the breaker stays open, in milliseconds
    #[arg(
        long,
        default_value_t = DEFAULT_BREAKER_TIMEOUT_MS,
        env = "BREAKER_TIMEOUT_MS"
    )]
    pub breaker_timeout_ms: u64,

    /// Delay before retrying a connection failure, in milliseconds
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_MS, env = "DB_RETRY_DELAY_MS")]
    pub retry_delay_ms: u64,

    /// Slow query warning threshold in milliseconds
    #[arg(long, default_value_t = DEFAULT_SLOW_QUERY_MS, env = "DB_SLOW_QUERY_MS")]
    pub slow_query_ms: u64,

    /// Extra boolean-like column names for the embedded backend.
    /// Can be specified multiple times or as comma-separated values.
    #[arg(
        long = "bool-column",
        value_name = "COLUMN",
        env = "DB_BOOL_COLUMNS",
        value_delimiter = ','
    )]
    pub bool_columns: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,

    /// SQL to run once, written with `$1..$n` placeholders
    #[arg(short, long)]
    pub query: Option<String>,

    /// Positional query parameter, parsed as JSON and falling back to a string
    #[arg(short, long = "param", value_name = "VALUE")]
    pub params: Vec<String>,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            database_url: None,
            sqlite_path: PathBuf::from(DEFAULT_SQLITE_PATH),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            breaker_timeout_ms: DEFAULT_BREAKER_TIMEOUT_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            slow_query_ms: DEFAULT_SLOW_QUERY_MS,
            bool_columns: Vec::new(),
            log_level: "info".to_string(),
            json_logs: false,
            query: None,
            params: Vec::new(),
        }
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: Some(self.max_connections),
            min_connections: Some(self.min_connections),
            idle_timeout_secs: Some(self.idle_timeout_secs),
            acquire_timeout_secs: Some(self.acquire_timeout_secs),
        }
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            timeout: Duration::from_millis(self.breaker_timeout_ms),
        }
    }

    /// Build the library configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            database_url: self.database_url.clone(),
            sqlite_path: self.sqlite_path.clone(),
            pool_options: self.pool_options(),
            breaker: self.breaker_config(),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            slow_query_threshold: Duration::from_millis(self.slow_query_ms),
            bool_columns: self.bool_columns.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
