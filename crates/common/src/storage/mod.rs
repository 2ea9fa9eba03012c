//! SQLite storage primitives
//!
//! Connection pooling, per-connection pragmas, configuration and error types
//! shared by every SQLite-backed store.

pub mod config;
pub mod error;
pub mod metrics;
pub mod sqlite;

// Re-export commonly used types
pub use config::{SqliteConfig, SqliteConfigBuilder};
pub use error::{StorageError, StorageResult};
pub use metrics::{PoolMetrics, StorageMetrics};
pub use sqlite::{apply_connection_pragmas, HealthStatus, SqliteConnection, SqlitePool};
