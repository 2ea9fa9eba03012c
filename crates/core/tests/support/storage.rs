//! Storage doubles for exercising manager error paths

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use zrata_core::{CacheStorage, MemoryCacheStorage};
use zrata_domain::{CacheEntry, CacheError, EntryMetadata, EntryOrigin, Fingerprint, Result};

/// Wraps [`MemoryCacheStorage`], counting writes and optionally failing them
/// or evicting them as soon as they land
#[derive(Debug, Default)]
pub struct InstrumentedStorage {
    inner: MemoryCacheStorage,
    puts: AtomicUsize,
    fail_puts: AtomicBool,
    evict_next_puts: AtomicUsize,
    hide_next_gets: AtomicUsize,
}

impl InstrumentedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Report the next `count` reads as `NotFound` whatever is stored
    pub fn hide_next_gets(&self, count: usize) {
        self.hide_next_gets.store(count, Ordering::SeqCst);
    }

    /// Delete each of the next `count` writes right after it succeeds
    pub fn evict_next_puts(&self, count: usize) {
        self.evict_next_puts.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStorage for InstrumentedStorage {
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool> {
        self.inner.exists(fingerprint).await
    }

    async fn get(&self, fingerprint: &Fingerprint) -> Result<CacheEntry> {
        if take_one(&self.hide_next_gets) {
            return Err(CacheError::NotFound(fingerprint.clone()));
        }
        self.inner.get(fingerprint).await
    }

    async fn put(
        &self,
        fingerprint: &Fingerprint,
        origin: &EntryOrigin,
        payload: Vec<u8>,
    ) -> Result<CacheEntry> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(CacheError::storage_transient("disk full"));
        }
        let entry = self.inner.put(fingerprint, origin, payload).await?;
        if take_one(&self.evict_next_puts) {
            self.inner.delete(fingerprint).await?;
        }
        Ok(entry)
    }

    async fn delete(&self, fingerprint: &Fingerprint) -> Result<bool> {
        self.inner.delete(fingerprint).await
    }

    async fn list_entries(&self) -> Result<Vec<EntryMetadata>> {
        self.inner.list_entries().await
    }

    async fn clear(&self) -> Result<usize> {
        self.inner.clear().await
    }

    fn backend_name(&self) -> &'static str {
        "instrumented"
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}
