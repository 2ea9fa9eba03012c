//! SQLite pragma management
//!
//! Applies per-connection pragmas for concurrency and durability.

use rusqlite::Connection;

use crate::storage::config::SqliteConfig;
use crate::storage::error::{StorageError, StorageResult};

/// Apply connection-level pragmas
///
/// These pragmas are applied to each connection in the pool:
/// - WAL mode so readers never block the single writer
/// - NORMAL synchronous mode (durable across application crashes under WAL)
/// - WAL autocheckpoint
/// - Busy timeout for lock contention between pooled writers
pub fn apply_connection_pragmas(conn: &Connection, config: &SqliteConfig) -> StorageResult<()> {
    let mut pragma_sql = String::new();

    if config.enable_wal {
        pragma_sql.push_str("PRAGMA journal_mode=WAL;\n");
        pragma_sql.push_str("PRAGMA wal_autocheckpoint=1000;\n");
    }

    pragma_sql.push_str("PRAGMA synchronous=NORMAL;\n");

    conn.execute_batch(&pragma_sql)
        .map_err(|e| StorageError::Query(format!("Failed to apply pragmas: {}", e)))?;

    // Separate call as it takes a parameter
    conn.busy_timeout(config.busy_timeout)
        .map_err(|e| StorageError::Query(format!("Failed to set busy timeout: {}", e)))?;

    Ok(())
}
