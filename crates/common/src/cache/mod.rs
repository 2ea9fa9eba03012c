//! Cache statistics
//!
//! Lock-free counters for computation-cache activity and the snapshot type
//! handed to callers.

pub mod stats;

pub use stats::{CacheStats, MetricsCollector};
