//! # Zrata Infrastructure
//!
//! Infrastructure implementations of the core storage port.
//!
//! This crate contains:
//! - SQLite storage (r2d2 pool, WAL)
//! - Filesystem storage (one file per entry)
//! - Configuration loading from environment and files
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Implements `CacheStorage` from `zrata-core`
//! - Contains all "impure" code (database, filesystem, process environment)

pub mod config;
pub mod database;
pub mod errors;
pub mod filesystem;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use database::{DbManager, SqliteCacheStorage};
pub use errors::InfraError;
pub use filesystem::FsCacheStorage;
pub use observability::init_tracing;
pub use storage::open_storage;
