//! # Zrata Domain
//!
//! Data types shared by every layer of the computation cache.
//!
//! This crate contains:
//! - Requests, parameter values, fingerprints and stored entries
//! - The `CacheError` taxonomy and Result alias
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - Depends only on `zrata-common` (foundation tier)
//! - No I/O, no async runtime

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
pub use zrata_common::hash::HashAlgorithm;
