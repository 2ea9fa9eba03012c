//! Cache statistics and metrics tracking
//!
//! Tracks how lookups resolve (hit, miss) and what happened to the misses
//! (computed, failed, aborted, or coalesced onto another caller's run).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from storage without computing
    pub hits: u64,

    /// Requests that found nothing stored on first check
    pub misses: u64,

    /// Computations started by a claim owner
    pub computations: u64,

    /// Computations that returned an error or a result JSON cannot carry
    pub failures: u64,

    /// Computations abandoned before completion
    pub aborted: u64,

    /// Misses served by another caller's computation, including one that
    /// finished between the first check and the claim
    pub coalesced: u64,

    /// Entries removed through eviction helpers
    pub evictions: u64,
}

impl CacheStats {
    /// Total number of lookups (hits + misses)
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// Calculate hit rate (hits / total lookups)
    pub fn hit_rate(&self) -> f64 {
        let total = self.requests();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate miss rate (misses / total lookups)
    pub fn miss_rate(&self) -> f64 {
        if self.requests() == 0 {
            0.0
        } else {
            1.0 - self.hit_rate()
        }
    }
}

/// Thread-safe metrics collector for cache operations
///
/// Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    failures: AtomicU64,
    aborted: AtomicU64,
    coalesced: AtomicU64,
    evictions: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.inner.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_computation(&self) {
        self.inner.computations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.inner.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abort(&self) {
        self.inner.aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.inner.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> CacheStats {
        let c = &self.inner;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            computations: c.computations.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            aborted: c.aborted.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
        }
    }
}
