//! Cache manager: lookup, single-flight computation and eviction
//!
//! [`CacheManager::get_or_compute`] is the entry point. For each fingerprint
//! at most one computation runs at a time; concurrent callers wait on the
//! owner's completion signal and then read the stored result.

mod config;
pub mod eviction;
mod pending;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use zrata_common::cache::{CacheStats, MetricsCollector};
use zrata_domain::{
    BoxError, CacheError, CacheSettings, ComputationRequest, EntryMetadata, EntryOrigin,
    Fingerprint, Result, StorageSummary,
};

pub use self::config::ManagerConfig;
use self::pending::{next_outcome, Claim, ClaimGuard, Outcome, PendingTable, Signal};
use crate::hashing::FingerprintHasher;
use crate::storage::CacheStorage;

/// Coordinates the hasher, storage and in-flight computations
///
/// State lives in the value: two managers only share results when built over
/// the same storage.
pub struct CacheManager {
    hasher: FingerprintHasher,
    storage: Arc<dyn CacheStorage>,
    pending: PendingTable,
    config: ManagerConfig,
    metrics: MetricsCollector,
}

impl CacheManager {
    /// Manager with the default hasher and no wait timeout
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        let metrics = MetricsCollector::new();
        Self {
            hasher: FingerprintHasher::default(),
            storage,
            pending: PendingTable::new(metrics.clone()),
            config: ManagerConfig::default(),
            metrics,
        }
    }

    /// Manager configured from loaded settings
    pub fn from_settings(storage: Arc<dyn CacheStorage>, settings: &CacheSettings) -> Self {
        Self::new(storage)
            .with_hasher(FingerprintHasher::from_settings(&settings.hashing))
            .with_config(ManagerConfig::from(&settings.manager))
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: FingerprintHasher) -> Self {
        self.hasher = hasher;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn hasher(&self) -> &FingerprintHasher {
        &self.hasher
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn fingerprint(&self, request: &ComputationRequest) -> Result<Fingerprint> {
        self.hasher.fingerprint(request)
    }

    /// Return the cached result for `request`, computing it at most once
    ///
    /// On a hit `compute` is never called. On a miss exactly one concurrent
    /// caller runs it and stores the serialized result; the others wait and
    /// then read what was stored. Failures are not cached: the next call
    /// after a failure computes again.
    ///
    /// # Errors
    /// - `InvalidRequest` if the request cannot be fingerprinted
    /// - `ComputationFailure` if `compute` fails (for every waiter too)
    /// - `ComputationAborted` if the computing caller was dropped
    /// - `WaitTimeout` if a configured wait limit elapsed
    /// - storage and serialization errors from the backend
    pub async fn get_or_compute<T, F, Fut, E>(
        &self,
        request: &ComputationRequest,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        let fingerprint = self.hasher.fingerprint(request)?;

        if let Some(value) = self.read_cached(&fingerprint).await? {
            self.metrics.record_hit();
            debug!(fingerprint = %fingerprint, strategy = request.strategy_identifier(), "Cache hit");
            return Ok(value);
        }
        self.metrics.record_miss();

        let guard = loop {
            match self.pending.claim(&fingerprint) {
                Claim::Owner(guard) => break guard,
                Claim::Waiter(signal) => {
                    debug!(fingerprint = %fingerprint, "Joining in-flight computation");
                    if let Some(value) = self.wait_for_owner(&fingerprint, signal).await? {
                        self.metrics.record_coalesced();
                        return Ok(value);
                    }
                    // Stored and then evicted before we could read it
                }
            }
        };

        debug!(
            fingerprint = %fingerprint,
            strategy = request.strategy_identifier(),
            "Cache miss, computing"
        );
        self.compute_as_owner(guard, &fingerprint, &EntryOrigin::of(request), compute).await
    }

    async fn compute_as_owner<T, F, Fut, E>(
        &self,
        guard: ClaimGuard<'_>,
        fingerprint: &Fingerprint,
        origin: &EntryOrigin,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        let result = self.run_owned(fingerprint, origin, compute).await;
        match &result {
            Ok(_) => guard.release(Outcome::Stored),
            Err(err) => guard.release(Outcome::Failed(err.clone())),
        }
        result
    }

    async fn run_owned<T, F, Fut, E>(
        &self,
        fingerprint: &Fingerprint,
        origin: &EntryOrigin,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        // A previous owner may have finished between our miss and our claim.
        // The miss is already counted, so this is served like a waiter.
        if let Some(value) = self.read_cached(fingerprint).await? {
            self.metrics.record_coalesced();
            return Ok(value);
        }

        let started = Instant::now();
        self.metrics.record_computation();
        let value = match compute().await {
            Ok(value) => value,
            Err(err) => {
                self.metrics.record_failure();
                let err = CacheError::computation_failure(err);
                warn!(fingerprint = %fingerprint, error = %err, "Computation failed");
                return Err(err);
            }
        };

        let (value, payload) = encode_checked(value).map_err(|err| {
            self.metrics.record_failure();
            warn!(fingerprint = %fingerprint, error = %err, "Result does not survive encoding, not storing");
            err
        })?;
        let entry = self.storage.put(fingerprint, origin, payload).await?;
        debug!(
            fingerprint = %fingerprint,
            size_bytes = entry.size_bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Computed and stored"
        );
        Ok(value)
    }

    /// Wait for another caller's computation and read what it stored
    ///
    /// `Ok(None)` means the owner succeeded but the entry is already gone.
    async fn wait_for_owner<T: DeserializeOwned>(
        &self,
        fingerprint: &Fingerprint,
        signal: Signal,
    ) -> Result<Option<T>> {
        let outcome = match self.config.wait_timeout {
            Some(limit) => tokio::time::timeout(limit, next_outcome(signal, fingerprint))
                .await
                .map_err(|_| {
                    debug!(fingerprint = %fingerprint, waited_ms = limit.as_millis() as u64, "Wait timed out");
                    CacheError::WaitTimeout { fingerprint: fingerprint.clone(), waited: limit }
                })?,
            None => next_outcome(signal, fingerprint).await,
        };

        match outcome {
            Outcome::Stored => self.read_cached(fingerprint).await,
            Outcome::Failed(err) => Err(err),
        }
    }

    async fn read_cached<T: DeserializeOwned>(&self, fingerprint: &Fingerprint) -> Result<Option<T>> {
        match self.storage.lookup(fingerprint).await? {
            Some(entry) => Ok(Some(serde_json::from_slice(&entry.payload)?)),
            None => Ok(None),
        }
    }

    /// Cached result for `request`, if any; never computes
    pub async fn lookup<T: DeserializeOwned>(&self, request: &ComputationRequest) -> Result<Option<T>> {
        let fingerprint = self.hasher.fingerprint(request)?;
        self.read_cached(&fingerprint).await
    }

    /// Drop the cached result for `request`
    pub async fn invalidate(&self, request: &ComputationRequest) -> Result<bool> {
        let fingerprint = self.hasher.fingerprint(request)?;
        self.evict(&fingerprint).await
    }

    pub async fn evict(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let removed = self.storage.delete(fingerprint).await?;
        if removed {
            self.metrics.record_evictions(1);
            debug!(fingerprint = %fingerprint, "Evicted cache entry");
        }
        Ok(removed)
    }

    /// Delete every entry created before `cutoff`
    pub async fn evict_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let entries = self.storage.list_entries().await?;
        let removed = self.delete_all(eviction::older_than(&entries, cutoff)).await?;
        info!(removed, cutoff = %cutoff, "Evicted entries older than cutoff");
        Ok(removed)
    }

    /// Delete the oldest entries until the total payload size fits
    pub async fn evict_to_budget(&self, max_total_bytes: u64) -> Result<usize> {
        let entries = self.storage.list_entries().await?;
        let removed = self.delete_all(eviction::to_fit_budget(&entries, max_total_bytes)).await?;
        info!(removed, max_total_bytes, "Evicted entries to fit size budget");
        Ok(removed)
    }

    async fn delete_all(&self, fingerprints: Vec<Fingerprint>) -> Result<usize> {
        let mut removed = 0;
        for fingerprint in fingerprints {
            if self.storage.delete(&fingerprint).await? {
                removed += 1;
            }
        }
        self.metrics.record_evictions(removed as u64);
        Ok(removed)
    }

    /// Metadata of every entry computed over `dataset_fingerprint`
    pub async fn entries_for_dataset(&self, dataset_fingerprint: &str) -> Result<Vec<EntryMetadata>> {
        self.storage.list_by_dataset(dataset_fingerprint).await
    }

    /// Metadata of every entry produced by `strategy_identifier`
    pub async fn entries_for_strategy(&self, strategy_identifier: &str) -> Result<Vec<EntryMetadata>> {
        self.storage.list_by_strategy(strategy_identifier).await
    }

    /// Delete every entry computed over `dataset_fingerprint`
    ///
    /// Used after a dataset is re-uploaded under the same name.
    pub async fn evict_dataset(&self, dataset_fingerprint: &str) -> Result<usize> {
        let entries = self.storage.list_by_dataset(dataset_fingerprint).await?;
        let removed = self.delete_all(entries.into_iter().map(|e| e.fingerprint).collect()).await?;
        info!(removed, dataset = dataset_fingerprint, "Evicted entries for dataset");
        Ok(removed)
    }

    /// Delete every entry produced by `strategy_identifier`
    pub async fn evict_strategy(&self, strategy_identifier: &str) -> Result<usize> {
        let entries = self.storage.list_by_strategy(strategy_identifier).await?;
        let removed = self.delete_all(entries.into_iter().map(|e| e.fingerprint).collect()).await?;
        info!(removed, strategy = strategy_identifier, "Evicted entries for strategy");
        Ok(removed)
    }

    /// Totals over what is currently stored
    pub async fn summary(&self) -> Result<StorageSummary> {
        let entries = self.storage.list_entries().await?;
        Ok(StorageSummary::from_entries(&entries))
    }

    /// Delete everything in storage
    pub async fn clear(&self) -> Result<usize> {
        let removed = self.storage.clear().await?;
        self.metrics.record_evictions(removed as u64);
        info!(removed, backend = self.storage.backend_name(), "Cleared cache");
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    /// Number of computations currently in flight
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Serialize `value` and decode it back
///
/// Returns the decoded value so the caller sees exactly what later hits will
/// see. Values JSON cannot carry (non-finite floats become `null`) fail here
/// instead of poisoning the entry.
fn encode_checked<T: Serialize + DeserializeOwned>(value: T) -> Result<(T, Vec<u8>)> {
    let payload = serde_json::to_vec(&value)?;
    let decoded = serde_json::from_slice(&payload).map_err(|err| {
        CacheError::serialization(format!("result does not round-trip through JSON: {err}"))
    })?;
    Ok((decoded, payload))
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("hasher", &self.hasher)
            .field("backend", &self.storage.backend_name())
            .field("pending", &self.pending.len())
            .field("config", &self.config)
            .finish()
    }
}
