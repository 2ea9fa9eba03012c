//! Database connection manager backed by the shared SQLite pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::params;
use tracing::{debug, info};
use zrata_common::storage::{HealthStatus, SqliteConfig, SqliteConnection, SqlitePool};
use zrata_domain::{CacheError, Result, StorageSettings};

use crate::errors::to_cache_error;

const SCHEMA_VERSION: i32 = 2;
const SCHEMA_SQL: &str = include_str!("schema.sql");
const ORIGIN_INDEXES_SQL: &str = include_str!("origin_indexes.sql");

/// Database manager that wraps a [`SqlitePool`].
pub struct DbManager {
    pool: Arc<SqlitePool>,
    path: PathBuf,
}

impl DbManager {
    /// Open (creating if needed) the database described by `settings`.
    pub fn new(settings: &StorageSettings) -> Result<Self> {
        let path = settings.path.clone();
        let config = SqliteConfig::builder(&path)
            .pool_size(settings.pool_size)
            .busy_timeout(settings.busy_timeout())
            .connection_timeout(settings.connection_timeout())
            .build()
            .map_err(to_cache_error)?;

        let pool = Arc::new(SqlitePool::new(&config).map_err(to_cache_error)?);

        info!(
            db_path = %path.display(),
            max_connections = pool.metrics().max_pool_size(),
            "sqlite pool initialised"
        );

        Ok(Self { pool, path })
    }

    /// Open with default pool settings.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::new(&StorageSettings::sqlite(db_path.as_ref()))
    }

    /// Borrow the underlying pool.
    pub fn pool(&self) -> &Arc<SqlitePool> {
        &self.pool
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<SqliteConnection> {
        self.pool.get_connection().map_err(to_cache_error)
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn)
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify a connection can be acquired and answers a trivial query.
    pub fn health_check(&self) -> Result<HealthStatus> {
        let status = self.pool.health_check();
        if status.healthy {
            Ok(status)
        } else {
            Err(CacheError::storage_transient(
                status.message.unwrap_or_else(|| "database unhealthy".to_owned()),
            ))
        }
    }
}

fn create_schema(conn: &SqliteConnection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(to_cache_error)?;
    add_origin_columns(conn)?;
    conn.execute_batch(ORIGIN_INDEXES_SQL).map_err(to_cache_error)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, CAST(strftime('%s','now') AS INTEGER))",
        params![SCHEMA_VERSION],
    )
    .map_err(to_cache_error)?;
    Ok(())
}

/// Version 1 tables predate entry origins; their rows get empty origins.
fn add_origin_columns(conn: &SqliteConnection) -> Result<()> {
    let columns: Vec<String> = conn
        .query_map("SELECT name FROM pragma_table_info('cache_entries')", &[], |row| row.get(0))
        .map_err(to_cache_error)?;
    for column in ["strategy_identifier", "dataset_fingerprint"] {
        if !columns.iter().any(|c| c == column) {
            debug!(column, "adding origin column to cache_entries");
            conn.execute(
                &format!("ALTER TABLE cache_entries ADD COLUMN {column} TEXT NOT NULL DEFAULT ''"),
                &[],
            )
            .map_err(to_cache_error)?;
        }
    }
    Ok(())
}
