//! Error types used throughout the cache

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use zrata_common::error::ErrorSeverity;
use zrata_common::impl_error_classification;

use crate::types::Fingerprint;

/// Boxed error produced by a caller's compute closure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A compute error shared between the owner and every waiter
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Every way a cache operation can fail
///
/// `Clone` so one computation failure can be handed to every caller that
/// was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The request cannot be fingerprinted
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Direct storage read for an absent fingerprint
    #[error("No cache entry for fingerprint {0}")]
    NotFound(Fingerprint),

    /// A different payload was written for a fingerprint that already exists
    #[error(
        "Fingerprint {fingerprint} already holds a different payload \
         (stored {stored_size} bytes, attempted {attempted_size} bytes)"
    )]
    FingerprintCollisionOrStaleWrite { fingerprint: Fingerprint, stored_size: u64, attempted_size: u64 },

    /// The compute closure returned an error
    #[error("Computation failed: {0}")]
    ComputationFailure(#[source] SharedError),

    /// The computing task was dropped before it finished
    #[error("Computation for fingerprint {0} was aborted before completing")]
    ComputationAborted(Fingerprint),

    /// The storage medium failed or returned corrupt data
    #[error("Storage unavailable: {message}")]
    StorageUnavailable { message: String, retryable: bool },

    /// A result could not be encoded for storage or decoded from it
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A waiter gave up on another caller's computation
    #[error("Timed out after {waited:?} waiting for fingerprint {fingerprint}")]
    WaitTimeout { fingerprint: Fingerprint, waited: Duration },
}

impl CacheError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Wrap a compute closure's error
    pub fn computation_failure(err: impl Into<BoxError>) -> Self {
        Self::ComputationFailure(Arc::from(err.into()))
    }

    /// Storage failure that a retry will not fix (corruption, bad schema)
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable { message: message.into(), retryable: false }
    }

    /// Storage failure that may clear on retry (busy database, pool timeout)
    pub fn storage_transient(message: impl Into<String>) -> Self {
        Self::StorageUnavailable { message: message.into(), retryable: true }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Short, stable name of the variant for structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::NotFound(_) => "not_found",
            Self::FingerprintCollisionOrStaleWrite { .. } => "fingerprint_collision",
            Self::ComputationFailure(_) => "computation_failure",
            Self::ComputationAborted(_) => "computation_aborted",
            Self::StorageUnavailable { .. } => "storage_unavailable",
            Self::Serialization(_) => "serialization",
            Self::WaitTimeout { .. } => "wait_timeout",
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl_error_classification!(CacheError,
    Self::InvalidRequest(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::NotFound(_) => {
        retryable: false,
        severity: ErrorSeverity::Info,
        critical: false,
    },
    Self::FingerprintCollisionOrStaleWrite { .. } => {
        retryable: false,
        severity: ErrorSeverity::Critical,
        critical: true,
    },
    Self::ComputationFailure(_) => {
        retryable: true,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::ComputationAborted(_) => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::StorageUnavailable { retryable: true, .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::StorageUnavailable { retryable: false, .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::Serialization(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::WaitTimeout { .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
);

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("No config file found in any of the standard locations")]
    NoConfigFile,

    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid {format} format: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

impl ConfigError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid { field, message: message.into() }
    }
}

/// Result type alias for cache operations
pub type Result<T, E = CacheError> = std::result::Result<T, E>;
