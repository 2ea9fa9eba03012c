//! SQLite-backed cache storage.
//!
//! Implements the `CacheStorage` port over a single `cache_entries` table,
//! with indexed lookups by dataset and by strategy. All database operations
//! run in `spawn_blocking` to avoid blocking the async runtime.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;
use tracing::{info, instrument, warn};
use zrata_common::storage::SqliteConnection;
use zrata_core::storage::{check_existing, CacheStorage};
use zrata_domain::{
    CacheEntry, CacheError, EntryMetadata, EntryOrigin, Fingerprint, Result, StorageSettings,
};

use super::manager::DbManager;
use crate::errors::{map_join_error, to_cache_error};

/// SQLite-backed cache storage.
///
/// Cloning is cheap; clones share the pool.
#[derive(Clone)]
pub struct SqliteCacheStorage {
    db: Arc<DbManager>,
}

impl SqliteCacheStorage {
    /// Wrap an existing manager. The schema must already exist.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Open the database described by `settings`, create the schema and
    /// check the pool answers.
    pub fn open(settings: &StorageSettings) -> Result<Self> {
        let db = DbManager::new(settings)?;
        db.run_migrations()?;
        let health = db.health_check().map_err(|err| {
            warn!(db_path = %db.path().display(), error = %err, "sqlite health check failed");
            err
        })?;
        info!(
            db_path = %db.path().display(),
            connections = health.connections,
            queries_executed = health.metrics.queries_executed,
            avg_acquisition_ms = health.metrics.avg_acquisition_time_ms,
            "sqlite cache storage opened"
        );
        Ok(Self::new(Arc::new(db)))
    }

    pub fn db(&self) -> &Arc<DbManager> {
        &self.db
    }

    /// Run `op` on a pooled connection inside `spawn_blocking`.
    async fn with_connection<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<T> {
            let mut conn = db.get_connection()?;
            op(&mut conn)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl CacheStorage for SqliteCacheStorage {
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let fingerprint = fingerprint.clone();
        self.with_connection(move |conn| query_exists(conn, &fingerprint)).await
    }

    #[instrument(level = "debug", skip(self), fields(fingerprint = %fingerprint))]
    async fn get(&self, fingerprint: &Fingerprint) -> Result<CacheEntry> {
        let key = fingerprint.clone();
        self.with_connection(move |conn| query_entry(conn, &key))
            .await?
            .ok_or_else(|| CacheError::NotFound(fingerprint.clone()))
    }

    #[instrument(
        level = "debug",
        skip(self, payload),
        fields(fingerprint = %fingerprint, size_bytes = payload.len())
    )]
    async fn put(
        &self,
        fingerprint: &Fingerprint,
        origin: &EntryOrigin,
        payload: Vec<u8>,
    ) -> Result<CacheEntry> {
        let entry = CacheEntry::new(fingerprint.clone(), origin.clone(), payload);
        self.with_connection(move |conn| insert_if_absent(conn, entry)).await
    }

    #[instrument(level = "debug", skip(self), fields(fingerprint = %fingerprint))]
    async fn delete(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let fingerprint = fingerprint.clone();
        self.with_connection(move |conn| delete_entry(conn, &fingerprint)).await
    }

    async fn list_entries(&self) -> Result<Vec<EntryMetadata>> {
        self.with_connection(|conn| query_metadata(conn, MetadataFilter::All)).await
    }

    async fn list_by_dataset(&self, dataset_fingerprint: &str) -> Result<Vec<EntryMetadata>> {
        let dataset = dataset_fingerprint.to_owned();
        self.with_connection(move |conn| query_metadata(conn, MetadataFilter::Dataset(&dataset)))
            .await
    }

    async fn list_by_strategy(&self, strategy_identifier: &str) -> Result<Vec<EntryMetadata>> {
        let strategy = strategy_identifier.to_owned();
        self.with_connection(move |conn| query_metadata(conn, MetadataFilter::Strategy(&strategy)))
            .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn clear(&self) -> Result<usize> {
        self.with_connection(|conn| delete_all(conn)).await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

// ============================================================================
// Synchronous SQL Operations (called inside spawn_blocking)
// ============================================================================

const SELECT_ENTRY: &str = "SELECT fingerprint, strategy_identifier, dataset_fingerprint, payload, created_at
     FROM cache_entries WHERE fingerprint = ?1";

const SELECT_METADATA: &str =
    "SELECT fingerprint, strategy_identifier, dataset_fingerprint, created_at, size_bytes
     FROM cache_entries";

const METADATA_ORDER: &str = "ORDER BY created_at ASC, fingerprint ASC";

enum MetadataFilter<'a> {
    All,
    Dataset(&'a str),
    Strategy(&'a str),
}

fn query_exists(conn: &SqliteConnection, fingerprint: &Fingerprint) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM cache_entries WHERE fingerprint = ?1)",
        params![fingerprint.as_str()],
        |row| row.get::<_, bool>(0),
    )
    .map_err(to_cache_error)
}

fn query_entry(conn: &SqliteConnection, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
    conn.query_optional(SELECT_ENTRY, params![fingerprint.as_str()], row_to_entry)
        .map_err(to_cache_error)
}

/// Insert unless the fingerprint exists; otherwise compare with the stored
/// payload and origin. Runs under an IMMEDIATE transaction so two writers
/// cannot both miss and insert.
fn insert_if_absent(conn: &mut SqliteConnection, entry: CacheEntry) -> Result<CacheEntry> {
    let fingerprint = entry.fingerprint.clone();
    let tx = conn.immediate_transaction().map_err(to_cache_error)?;

    let inserted = tx
        .execute(
            "INSERT INTO cache_entries
                 (fingerprint, strategy_identifier, dataset_fingerprint, payload, created_at, size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(fingerprint) DO NOTHING",
            params![
                fingerprint.as_str(),
                &entry.origin.strategy_identifier,
                &entry.origin.dataset_fingerprint,
                &entry.payload,
                entry.created_at.timestamp_millis(),
                i64::try_from(entry.size_bytes).unwrap_or(i64::MAX),
            ],
        )
        .map_err(to_cache_error)?;

    let result = if inserted == 1 {
        Ok(entry)
    } else {
        let existing = tx
            .query_row(SELECT_ENTRY, params![fingerprint.as_str()], row_to_entry)
            .optional()
            .map_err(to_cache_error)?
            .ok_or_else(|| CacheError::storage("entry vanished inside write transaction"))?;
        check_existing(existing, &fingerprint, &entry.origin, &entry.payload)
    };

    tx.commit().map_err(to_cache_error)?;
    result
}

fn delete_entry(conn: &SqliteConnection, fingerprint: &Fingerprint) -> Result<bool> {
    let removed = conn
        .execute("DELETE FROM cache_entries WHERE fingerprint = ?1", params![fingerprint.as_str()])
        .map_err(to_cache_error)?;
    Ok(removed > 0)
}

fn query_metadata(conn: &SqliteConnection, filter: MetadataFilter<'_>) -> Result<Vec<EntryMetadata>> {
    let rows = match filter {
        MetadataFilter::All => conn.query_map(
            &format!("{SELECT_METADATA} {METADATA_ORDER}"),
            params![],
            row_to_metadata,
        ),
        MetadataFilter::Dataset(dataset) => conn.query_map(
            &format!("{SELECT_METADATA} WHERE dataset_fingerprint = ?1 {METADATA_ORDER}"),
            params![dataset],
            row_to_metadata,
        ),
        MetadataFilter::Strategy(strategy) => conn.query_map(
            &format!("{SELECT_METADATA} WHERE strategy_identifier = ?1 {METADATA_ORDER}"),
            params![strategy],
            row_to_metadata,
        ),
    };
    rows.map_err(to_cache_error)
}

fn delete_all(conn: &SqliteConnection) -> Result<usize> {
    conn.execute("DELETE FROM cache_entries", params![]).map_err(to_cache_error)
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    Ok(CacheEntry::with_created_at(
        fingerprint_column(row, 0)?,
        EntryOrigin::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
        row.get(3)?,
        timestamp_column(row, 4)?,
    ))
}

fn row_to_metadata(row: &Row<'_>) -> rusqlite::Result<EntryMetadata> {
    Ok(EntryMetadata {
        fingerprint: fingerprint_column(row, 0)?,
        origin: EntryOrigin::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
        created_at: timestamp_column(row, 3)?,
        size_bytes: u64::try_from(row.get::<_, i64>(4)?).unwrap_or(0),
    })
}

fn fingerprint_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Fingerprint> {
    let raw: String = row.get(idx)?;
    Fingerprint::parse(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp {millis} out of range").into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn setup() -> (TempDir, SqliteCacheStorage) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let storage = SqliteCacheStorage::open(&StorageSettings::sqlite(temp_dir.path().join("cache.db")))
            .expect("storage opened");
        (temp_dir, storage)
    }

    fn fp(c: char) -> Fingerprint {
        Fingerprint::parse(&c.to_string().repeat(64)).unwrap()
    }

    fn origin() -> EntryOrigin {
        EntryOrigin::new("sma_crossover", "prices-2024")
    }

    #[tokio::test]
    async fn round_trip_preserves_payload_bytes() {
        let (_dir, storage) = setup();
        let payload = vec![0_u8, 159, 146, 150, 255, b'{', b'}'];

        let stored = storage.put(&fp('a'), &origin(), payload.clone()).await.unwrap();
        let read = storage.get(&fp('a')).await.unwrap();

        assert_eq!(read.payload, payload);
        assert_eq!(read.size_bytes, payload.len() as u64);
        assert_eq!(read.created_at.timestamp_millis(), stored.created_at.timestamp_millis());
        assert_eq!(read.origin, origin());
        assert!(storage.exists(&fp('a')).await.unwrap());
    }

    #[tokio::test]
    async fn missing_entry_is_not_found() {
        let (_dir, storage) = setup();
        assert!(matches!(storage.get(&fp('b')).await, Err(CacheError::NotFound(_))));
        assert!(storage.lookup(&fp('b')).await.unwrap().is_none());
        assert!(!storage.exists(&fp('b')).await.unwrap());
    }

    /// Validates write idempotency and collision detection.
    ///
    /// Assertions:
    /// - rewriting identical bytes succeeds
    /// - different bytes fail with `FingerprintCollisionOrStaleWrite`
    /// - the original payload survives
    #[tokio::test]
    async fn put_never_overwrites() {
        let (_dir, storage) = setup();
        storage.put(&fp('c'), &origin(), b"first".to_vec()).await.unwrap();
        storage.put(&fp('c'), &origin(), b"first".to_vec()).await.unwrap();

        let err = storage.put(&fp('c'), &origin(), b"second".to_vec()).await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::FingerprintCollisionOrStaleWrite { stored_size: 5, attempted_size: 6, .. }
        ));
        assert_eq!(storage.get(&fp('c')).await.unwrap().payload, b"first");
    }

    #[tokio::test]
    async fn list_delete_and_clear() {
        let (_dir, storage) = setup();
        storage.put(&fp('d'), &origin(), b"1".to_vec()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.put(&fp('e'), &origin(), b"22".to_vec()).await.unwrap();

        let listed = storage.list_entries().await.unwrap();
        assert_eq!(listed.iter().map(|m| m.size_bytes).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(listed[0].fingerprint, fp('d'));

        assert!(storage.delete(&fp('d')).await.unwrap());
        assert!(!storage.delete(&fp('d')).await.unwrap());
        assert_eq!(storage.clear().await.unwrap(), 1);
        assert!(storage.list_entries().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_identical_puts_store_once() {
        let (_dir, storage) = setup();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move { storage.put(&fp('f'), &origin(), b"same".to_vec()).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(storage.list_entries().await.unwrap().len(), 1);
    }

    /// Validates the indexed origin queries.
    ///
    /// Assertions:
    /// - dataset and strategy filters return only matching rows, oldest first
    /// - the same bytes under a different origin are a collision
    #[tokio::test]
    async fn listing_by_dataset_and_strategy() {
        let (_dir, storage) = setup();
        storage.put(&fp('1'), &EntryOrigin::new("sma", "d1"), b"1".to_vec()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.put(&fp('2'), &EntryOrigin::new("rsi", "d1"), b"2".to_vec()).await.unwrap();
        storage.put(&fp('3'), &EntryOrigin::new("rsi", "d2"), b"3".to_vec()).await.unwrap();

        let d1 = storage.list_by_dataset("d1").await.unwrap();
        assert_eq!(d1.iter().map(|m| m.fingerprint.clone()).collect::<Vec<_>>(), vec![fp('1'), fp('2')]);

        let rsi = storage.list_by_strategy("rsi").await.unwrap();
        assert_eq!(rsi.len(), 2);
        assert!(rsi.iter().all(|m| m.origin.strategy_identifier == "rsi"));
        assert!(storage.list_by_strategy("macd").await.unwrap().is_empty());

        let err = storage.put(&fp('1'), &EntryOrigin::new("rsi", "d1"), b"1".to_vec()).await.unwrap_err();
        assert!(matches!(err, CacheError::FingerprintCollisionOrStaleWrite { .. }));
    }

    #[tokio::test]
    async fn statements_are_counted_in_pool_metrics() {
        let (_dir, storage) = setup();
        let before = storage.db().pool().metrics_snapshot().queries_executed;
        storage.put(&fp('9'), &origin(), b"x".to_vec()).await.unwrap();
        storage.get(&fp('9')).await.unwrap();

        let after = storage.db().pool().metrics_snapshot();
        assert!(after.queries_executed >= before + 2);
        assert_eq!(after.queries_failed, 0);
    }
}
