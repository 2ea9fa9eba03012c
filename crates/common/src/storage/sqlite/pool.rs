//! SQLite connection pool
//!
//! r2d2 pool over plain SQLite files with pragmas applied to every new
//! connection.

use std::sync::Arc;
use std::time::Instant;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info, instrument, warn};

use super::connection::SqliteConnection;
use super::pragmas::apply_connection_pragmas;
use crate::storage::config::SqliteConfig;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::metrics::{PoolMetrics, StorageMetrics};

/// Pool health snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub healthy: bool,
    pub connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
    pub message: Option<String>,
    pub metrics: PoolMetrics,
}

/// SQLite connection pool
///
/// Manages a pool of SQLite connections using r2d2. Acquisition timing and
/// failures are recorded in [`StorageMetrics`].
#[derive(Debug)]
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteConfig,
    metrics: Arc<StorageMetrics>,
}

impl SqlitePool {
    /// Create a new connection pool
    ///
    /// Validates the config, creates the parent directory if needed, and
    /// opens one connection eagerly so a bad path fails here rather than on
    /// first use.
    ///
    /// # Errors
    /// Returns an error if the config is invalid, the directory cannot be
    /// created, or the database cannot be opened.
    #[instrument(skip(config), fields(db_path = %config.path.display(), pool_size = config.pool_size))]
    pub fn new(config: &SqliteConfig) -> StorageResult<Self> {
        config.validate()?;

        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let metrics = Arc::new(StorageMetrics::new(config.pool_size));

        let pool_config = config.clone();
        let manager = SqliteConnectionManager::file(&config.path).with_init(move |conn| {
            apply_connection_pragmas(conn, &pool_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        });

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!("Failed to create connection pool: {}", e);
                StorageError::Connection(format!("Failed to create pool: {}", e))
            })?;

        info!("SQLite pool created with {} connections", config.pool_size);

        Ok(Self { pool, config: config.clone(), metrics })
    }

    /// Get a connection from the pool
    #[instrument(level = "trace", skip(self), fields(pool_size = self.config.pool_size))]
    pub fn get_connection(&self) -> StorageResult<SqliteConnection> {
        let start = Instant::now();

        match self.pool.get() {
            Ok(conn) => {
                let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                self.metrics.record_connection_acquired(duration_ms);
                debug!("Connection acquired in {}ms", duration_ms);
                Ok(SqliteConnection::new(conn, Arc::clone(&self.metrics)))
            }
            Err(e) => {
                let err_str = e.to_string().to_lowercase();

                if err_str.contains("timed out") || err_str.contains("timeout") {
                    self.metrics.record_connection_timeout();
                    warn!("Connection timeout after {:?}", self.config.connection_timeout);
                    Err(StorageError::Timeout(self.config.connection_timeout.as_secs()))
                } else {
                    self.metrics.record_connection_error();
                    warn!("Connection error: {}", e);
                    Err(StorageError::Connection(format!("Failed to get connection: {}", e)))
                }
            }
        }
    }

    /// Check that a connection can be acquired and answers a trivial query
    pub fn health_check(&self) -> HealthStatus {
        let state = self.pool.state();
        let check = self
            .get_connection()
            .and_then(|conn| conn.query_row("SELECT 1", &[], |row| row.get::<_, i32>(0)));

        HealthStatus {
            healthy: check.is_ok(),
            connections: state.connections,
            idle_connections: state.idle_connections,
            max_connections: self.config.pool_size,
            message: check.err().map(|e| format!("Pool unhealthy: {}", e)),
            metrics: self.metrics.snapshot(),
        }
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> &Arc<StorageMetrics> {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> PoolMetrics {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }
}
