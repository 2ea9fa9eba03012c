//! In-memory storage backend

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use zrata_domain::{CacheEntry, CacheError, EntryMetadata, EntryOrigin, Fingerprint, Result};

use super::ports::{check_existing, CacheStorage};

/// Process-lifetime storage behind a `RwLock`
///
/// Entries vanish when the value is dropped. Used in tests and by callers
/// that only want to deduplicate work within one run.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    entries: RwLock<BTreeMap<Fingerprint, CacheEntry>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self.entries.read().contains_key(fingerprint))
    }

    async fn get(&self, fingerprint: &Fingerprint) -> Result<CacheEntry> {
        self.entries
            .read()
            .get(fingerprint)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(fingerprint.clone()))
    }

    async fn put(
        &self,
        fingerprint: &Fingerprint,
        origin: &EntryOrigin,
        payload: Vec<u8>,
    ) -> Result<CacheEntry> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(fingerprint) {
            return check_existing(existing.clone(), fingerprint, origin, &payload);
        }
        let entry = CacheEntry::new(fingerprint.clone(), origin.clone(), payload);
        entries.insert(fingerprint.clone(), entry.clone());
        Ok(entry)
    }

    async fn delete(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self.entries.write().remove(fingerprint).is_some())
    }

    async fn list_entries(&self) -> Result<Vec<EntryMetadata>> {
        let mut metadata: Vec<_> = self.entries.read().values().map(CacheEntry::metadata).collect();
        metadata.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        Ok(metadata)
    }

    async fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.write();
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
