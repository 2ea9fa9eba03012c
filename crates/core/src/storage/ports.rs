//! Storage port for cached computation results.
//!
//! Adapters (memory, SQLite, filesystem) implement [`CacheStorage`]; the
//! manager only ever talks to this trait.
//!
//! # Example
//!
//! ```no_run
//! use zrata_core::CacheStorage;
//! use zrata_domain::Fingerprint;
//!
//! async fn cached_bytes(storage: &dyn CacheStorage, fp: &Fingerprint) -> Option<usize> {
//!     storage.lookup(fp).await.ok().flatten().map(|entry| entry.payload.len())
//! }
//! ```

use async_trait::async_trait;
use zrata_domain::{CacheEntry, CacheError, EntryMetadata, EntryOrigin, Fingerprint, Result};

/// Durable mapping from fingerprint to cache entry.
///
/// Every operation is atomic per entry: a concurrent reader sees either no
/// entry or a complete one, never a partial write. Adapters report medium
/// failures as `StorageUnavailable` and never as `NotFound`.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Whether an entry exists for `fingerprint`.
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool>;

    /// Read the entry for `fingerprint`.
    ///
    /// Fails with `NotFound` when no entry exists.
    async fn get(&self, fingerprint: &Fingerprint) -> Result<CacheEntry>;

    /// Store `payload` under `fingerprint`, tagged with its `origin`.
    ///
    /// Writing the same payload and origin twice is a no-op that returns the
    /// existing entry. Anything different for an existing fingerprint fails
    /// with `FingerprintCollisionOrStaleWrite` and leaves the stored entry
    /// alone.
    async fn put(
        &self,
        fingerprint: &Fingerprint,
        origin: &EntryOrigin,
        payload: Vec<u8>,
    ) -> Result<CacheEntry>;

    /// Remove the entry; returns whether one existed.
    async fn delete(&self, fingerprint: &Fingerprint) -> Result<bool>;

    /// Metadata of every entry, oldest first.
    async fn list_entries(&self) -> Result<Vec<EntryMetadata>>;

    /// Remove every entry; returns how many were removed.
    async fn clear(&self) -> Result<usize>;

    /// Metadata of entries computed over `dataset_fingerprint`, oldest first.
    async fn list_by_dataset(&self, dataset_fingerprint: &str) -> Result<Vec<EntryMetadata>> {
        let mut entries = self.list_entries().await?;
        entries.retain(|entry| entry.origin.dataset_fingerprint == dataset_fingerprint);
        Ok(entries)
    }

    /// Metadata of entries produced by `strategy_identifier`, oldest first.
    async fn list_by_strategy(&self, strategy_identifier: &str) -> Result<Vec<EntryMetadata>> {
        let mut entries = self.list_entries().await?;
        entries.retain(|entry| entry.origin.strategy_identifier == strategy_identifier);
        Ok(entries)
    }

    /// Like [`get`](Self::get) with `NotFound` folded into `None`.
    async fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
        match self.get(fingerprint).await {
            Ok(entry) => Ok(Some(entry)),
            Err(CacheError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Outcome of comparing a write against what is already stored
///
/// Shared by adapters so every backend reports collisions identically.
pub fn check_existing(
    existing: CacheEntry,
    fingerprint: &Fingerprint,
    origin: &EntryOrigin,
    attempted: &[u8],
) -> Result<CacheEntry> {
    if existing.payload == attempted && existing.origin == *origin {
        Ok(existing)
    } else {
        tracing::error!(
            fingerprint = %fingerprint,
            stored_size = existing.size_bytes,
            attempted_size = attempted.len(),
            stored_strategy = %existing.origin.strategy_identifier,
            attempted_strategy = %origin.strategy_identifier,
            "Refusing to overwrite cache entry with a different payload"
        );
        Err(CacheError::FingerprintCollisionOrStaleWrite {
            fingerprint: fingerprint.clone(),
            stored_size: existing.size_bytes,
            attempted_size: attempted.len() as u64,
        })
    }
}
