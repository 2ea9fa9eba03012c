//! SQLite storage configuration
//!
//! Pool sizing, timeouts and journal settings for an on-disk SQLite database.

use std::path::PathBuf;
use std::time::Duration;

use super::error::{StorageError, StorageResult};

/// Upper bound on pooled connections.
pub const MAX_POOL_SIZE: u32 = 100;

/// SQLite database configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Database file path
    pub path: PathBuf,

    /// Connection pool size (default: 8)
    pub pool_size: u32,

    /// How long to wait for a pooled connection (default: 5s)
    pub connection_timeout: Duration,

    /// SQLite busy timeout for lock contention (default: 5000ms)
    pub busy_timeout: Duration,

    /// Enable WAL mode (default: true)
    pub enable_wal: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/zrata-cache.db"),
            pool_size: 8,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_millis(5000),
            enable_wal: true,
        }
    }
}

impl SqliteConfig {
    /// Create a new configuration with the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `StorageError::InvalidConfig` if any value is out of range.
    pub fn validate(&self) -> StorageResult<()> {
        if self.pool_size == 0 {
            return Err(StorageError::InvalidConfig(
                "pool_size must be greater than 0".to_string(),
            ));
        }
        if self.pool_size > MAX_POOL_SIZE {
            return Err(StorageError::InvalidConfig(format!(
                "pool_size too large (max: {MAX_POOL_SIZE})"
            )));
        }
        if self.connection_timeout.is_zero() {
            return Err(StorageError::InvalidConfig(
                "connection_timeout must be greater than 0".to_string(),
            ));
        }
        if self.busy_timeout.is_zero() {
            return Err(StorageError::InvalidConfig(
                "busy_timeout must be greater than 0".to_string(),
            ));
        }
        if self.path.as_os_str().is_empty() {
            return Err(StorageError::InvalidConfig("database path cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Create a builder for more complex configurations
    pub fn builder(path: impl Into<PathBuf>) -> SqliteConfigBuilder {
        SqliteConfigBuilder { config: Self::new(path) }
    }
}

/// Builder for SqliteConfig with validation
#[derive(Debug)]
pub struct SqliteConfigBuilder {
    config: SqliteConfig,
}

impl SqliteConfigBuilder {
    /// Set pool size
    pub fn pool_size(mut self, size: u32) -> Self {
        self.config.pool_size = size;
        self
    }

    /// Set connection timeout
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Set busy timeout
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.config.busy_timeout = timeout;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> StorageResult<SqliteConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
