//! Domain constants
//!
//! Defaults and limits shared by the hasher, storage and configuration.

/// Hex length of every fingerprint (256-bit digest)
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Fractional digits kept when canonicalizing floats
pub const DEFAULT_FLOAT_PRECISION: u8 = 10;
/// Beyond 17 significant digits an f64 carries no further information
pub const MAX_FLOAT_PRECISION: u8 = 17;

// Storage defaults
pub const DEFAULT_CACHE_PATH: &str = "data/zrata-cache.db";
pub const DEFAULT_POOL_SIZE: u32 = 8;
pub const MAX_POOL_SIZE: u32 = 100;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 5;

// Configuration
pub const ENV_PREFIX: &str = "ZRATA_CACHE_";
pub const DEFAULT_LOG_LEVEL: &str = "info";
