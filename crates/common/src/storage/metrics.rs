//! Storage metrics tracking
//!
//! Atomic counters for pool acquisition and statement execution, readable as
//! a [`PoolMetrics`] snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of [`StorageMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    pub connections_acquired: u64,
    pub connections_timeout: u64,
    pub connections_error: u64,
    pub avg_acquisition_time_ms: u64,
    pub queries_executed: u64,
    pub queries_failed: u64,
}

/// Lock-free storage metrics tracker
#[derive(Debug)]
pub struct StorageMetrics {
    connections_acquired: AtomicU64,
    connections_timeout: AtomicU64,
    connections_error: AtomicU64,
    total_connection_time_ms: AtomicU64,
    queries_executed: AtomicU64,
    queries_failed: AtomicU64,
    max_pool_size: u32,
}

impl StorageMetrics {
    /// Create a new metrics tracker
    pub fn new(max_pool_size: u32) -> Self {
        Self {
            connections_acquired: AtomicU64::new(0),
            connections_timeout: AtomicU64::new(0),
            connections_error: AtomicU64::new(0),
            total_connection_time_ms: AtomicU64::new(0),
            queries_executed: AtomicU64::new(0),
            queries_failed: AtomicU64::new(0),
            max_pool_size,
        }
    }

    /// Record a successful connection acquisition
    pub fn record_connection_acquired(&self, duration_ms: u64) {
        self.connections_acquired.fetch_add(1, Ordering::Relaxed);
        self.total_connection_time_ms.fetch_add(duration_ms, Ordering::Relaxed);
    }

    pub fn record_connection_timeout(&self) {
        self.connections_timeout.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_error(&self) {
        self.connections_error.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one statement or transaction
    pub fn record_query<T, E>(&self, result: &Result<T, E>) {
        if result.is_ok() {
            self.queries_executed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.queries_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get average connection acquisition time in milliseconds
    pub fn avg_connection_time_ms(&self) -> u64 {
        let total = self.total_connection_time_ms.load(Ordering::Relaxed);
        let count = self.connections_acquired.load(Ordering::Relaxed);

        if count == 0 {
            0
        } else {
            total / count
        }
    }

    /// Get the maximum pool size
    pub fn max_pool_size(&self) -> u32 {
        self.max_pool_size
    }

    pub fn snapshot(&self) -> PoolMetrics {
        PoolMetrics {
            connections_acquired: self.connections_acquired.load(Ordering::Relaxed),
            connections_timeout: self.connections_timeout.load(Ordering::Relaxed),
            connections_error: self.connections_error.load(Ordering::Relaxed),
            avg_acquisition_time_ms: self.avg_connection_time_ms(),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
        }
    }
}
