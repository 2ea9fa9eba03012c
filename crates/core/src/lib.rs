//! # Zrata Core
//!
//! Computation-cache logic with no infrastructure dependencies.
//!
//! This crate contains:
//! - The fingerprint hasher
//! - The `CacheStorage` port and an in-memory adapter
//! - The `CacheManager` with single-flight coordination and eviction
//!
//! ## Architecture Principles
//! - Depends only on `zrata-common` and `zrata-domain`
//! - No database or filesystem code; adapters live in `zrata-infra`
//! - All storage access goes through the `CacheStorage` trait

pub mod hashing;
pub mod manager;
pub mod storage;

pub use hashing::FingerprintHasher;
pub use manager::{CacheManager, ManagerConfig};
pub use storage::{CacheStorage, MemoryCacheStorage};
pub use zrata_common::cache::CacheStats;
