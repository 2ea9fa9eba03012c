//! Pooled SQLite connection wrapper

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{
    Connection as RusqliteConnection, OptionalExtension, Row, ToSql, Transaction,
    TransactionBehavior,
};
use tracing::instrument;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::metrics::StorageMetrics;

/// Pooled SQLite connection
///
/// Returned to the pool when dropped. Derefs to the underlying rusqlite
/// connection for anything the helpers below do not cover; only the helpers
/// are counted in the pool's query metrics.
pub struct SqliteConnection {
    inner: PooledConnection<SqliteConnectionManager>,
    metrics: Arc<StorageMetrics>,
}

impl SqliteConnection {
    /// Create a new connection wrapper from a pooled connection
    pub fn new(conn: PooledConnection<SqliteConnectionManager>, metrics: Arc<StorageMetrics>) -> Self {
        Self { inner: conn, metrics }
    }

    fn tracked<T>(&self, result: StorageResult<T>) -> StorageResult<T> {
        self.metrics.record_query(&result);
        result
    }

    /// Execute a statement and return the number of changed rows
    #[instrument(level = "trace", skip(self, params), fields(sql = %sql))]
    pub fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> StorageResult<usize> {
        self.tracked(self.inner.execute(sql, params).map_err(StorageError::from))
    }

    /// Execute a SQL query that returns exactly one row
    #[instrument(level = "trace", skip(self, params, f), fields(sql = %sql))]
    pub fn query_row<T, F>(&self, sql: &str, params: &[&dyn ToSql], f: F) -> StorageResult<T>
    where
        F: FnOnce(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        self.tracked(self.inner.query_row(sql, params, f).map_err(StorageError::from))
    }

    /// Execute a SQL query that returns at most one row
    #[instrument(level = "trace", skip(self, params, f), fields(sql = %sql))]
    pub fn query_optional<T, F>(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        f: F,
    ) -> StorageResult<Option<T>>
    where
        F: FnOnce(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        self.tracked(self.inner.query_row(sql, params, f).optional().map_err(StorageError::from))
    }

    /// Run a query and collect every mapped row
    #[instrument(level = "trace", skip(self, params, f), fields(sql = %sql))]
    pub fn query_map<T, F>(&self, sql: &str, params: &[&dyn ToSql], f: F) -> StorageResult<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        self.tracked(collect_rows(&self.inner, sql, params, f).map_err(StorageError::from))
    }

    /// Begin an IMMEDIATE transaction
    ///
    /// Takes the write lock up front so a read-then-write inside the
    /// transaction cannot interleave with another writer.
    #[instrument(level = "trace", skip(self))]
    pub fn immediate_transaction(&mut self) -> StorageResult<Transaction<'_>> {
        let result = self
            .inner
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from);
        self.metrics.record_query(&result);
        result
    }
}

fn collect_rows<T, F>(
    conn: &RusqliteConnection,
    sql: &str,
    params: &[&dyn ToSql],
    f: F,
) -> Result<Vec<T>, rusqlite::Error>
where
    F: FnMut(&Row<'_>) -> Result<T, rusqlite::Error>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, f)?;
    rows.collect()
}

impl Deref for SqliteConnection {
    type Target = RusqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for SqliteConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage::sqlite::connection.
    use tempfile::TempDir;

    use super::*;
    use crate::storage::config::SqliteConfig;
    use crate::storage::sqlite::SqlitePool;

    fn pool(dir: &TempDir) -> SqlitePool {
        SqlitePool::new(&SqliteConfig::new(dir.path().join("test.db"))).unwrap()
    }

    /// Validates execute and query_row round trip.
    ///
    /// Assertions:
    /// - Confirms the insert changes `1` row.
    /// - Confirms `result` equals `"Bob"`.
    #[test]
    fn test_connection_execute_and_query_row() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool(&temp_dir);
        let conn = pool.get_connection().unwrap();

        conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", &[]).unwrap();
        let name = "Bob";
        assert_eq!(conn.execute("INSERT INTO test (name) VALUES (?)", &[&name]).unwrap(), 1);

        let result: String =
            conn.query_row("SELECT name FROM test WHERE id = ?", &[&1], |row| row.get(0)).unwrap();
        assert_eq!(result, "Bob");
    }

    /// Validates `query_optional` maps a missing row to `None`.
    ///
    /// Assertions:
    /// - Ensures the lookup of an absent id returns `None`.
    #[test]
    fn test_query_optional_missing_row() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool(&temp_dir);
        let conn = pool.get_connection().unwrap();

        conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", &[]).unwrap();
        let missing: Option<String> = conn
            .query_optional("SELECT name FROM test WHERE id = ?", &[&42], |row| row.get(0))
            .unwrap();
        assert!(missing.is_none());
    }

    /// Validates `query_map` and immediate transactions.
    ///
    /// Assertions:
    /// - Confirms committed rows come back in insertion order.
    #[test]
    fn test_immediate_transaction_and_query_map() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool(&temp_dir);
        let mut conn = pool.get_connection().unwrap();

        conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", &[]).unwrap();
        {
            let tx = conn.immediate_transaction().unwrap();
            tx.execute("INSERT INTO test (name) VALUES ('Charlie')", []).unwrap();
            tx.execute("INSERT INTO test (name) VALUES ('Diana')", []).unwrap();
            tx.commit().unwrap();
        }

        let names: Vec<String> =
            conn.query_map("SELECT name FROM test ORDER BY id", &[], |row| row.get(0)).unwrap();
        assert_eq!(names, vec!["Charlie".to_string(), "Diana".to_string()]);
    }

    /// Validates that helper calls feed the pool's query counters.
    ///
    /// Assertions:
    /// - Confirms successful statements count as executed.
    /// - Confirms a failing statement counts as failed.
    #[test]
    fn test_helpers_record_query_metrics() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool(&temp_dir);
        let conn = pool.get_connection().unwrap();

        conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY)", &[]).unwrap();
        let _: Vec<i64> = conn.query_map("SELECT id FROM test", &[], |row| row.get(0)).unwrap();
        assert!(conn.execute("INSERT INTO missing_table VALUES (1)", &[]).is_err());

        let snapshot = pool.metrics_snapshot();
        assert_eq!(snapshot.queries_executed, 2);
        assert_eq!(snapshot.queries_failed, 1);
    }
}
