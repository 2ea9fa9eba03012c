//! Common error types and classification shared by the Zrata crates
//!
//! The error handling system is built on three pieces:
//!
//! 1. **`CommonError`**: failures raised by common itself, currently setting
//!    validation (an unknown hash algorithm name, for instance)
//!
//! 2. **`ErrorClassification` trait**: a standard interface for classifying
//!    errors by retryability, severity and criticality
//!
//! 3. **`ErrorSeverity` enum**: one severity scale for logging decisions
//!    across every error type
//!
//! Layer-specific errors (`StorageError`, `CacheError`) implement
//! `ErrorClassification` either by hand or through
//! [`impl_error_classification!`](crate::impl_error_classification).
//!
//! ## ErrorSeverity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Entry not found |
//! | **Warning** | Degraded but operational | Wait timeout, aborted computation |
//! | **Error** | Failure requiring attention | I/O errors, invalid input |
//! | **Critical** | Integrity at risk | Fingerprint collision, internal errors |
//!
//! ## Example
//!
//! ```rust
//! use zrata_common::error::{CommonError, ErrorClassification, ErrorSeverity};
//!
//! let err = CommonError::validation("strategy_identifier", "must not be empty");
//! assert!(!err.is_retryable());
//! assert_eq!(err.severity(), ErrorSeverity::Error);
//! ```

use std::fmt;
use std::time::Duration;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors raised by the common crate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommonError {
    /// A setting or argument failed validation
    #[error("Validation error for field '{field}'{}: {message}", value_suffix(.value))]
    Validation { field: String, message: String, value: Option<String> },
}

fn value_suffix(value: &Option<String>) -> String {
    value.as_ref().map(|v| format!(" (value: '{v}')")).unwrap_or_default()
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into(), value: None }
    }

    /// Validation error that echoes the rejected value
    pub fn validation_with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation { field: field.into(), message: message.into(), value: Some(value.into()) }
    }
}

/// Error classification trait for consistent error handling across layers
///
/// Callers use it to decide whether to retry and at which level to log,
/// without matching on every concrete error type.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: a timed-out wait, an aborted
    /// computation, a busy database.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    ///
    /// Critical errors typically indicate corrupted or conflicting stored data
    /// or violated internal invariants.
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for logging and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Macro to implement ErrorClassification for an error enum
///
/// Variants listed explicitly get the given classification. The optional
/// `delegate` form names a variant wrapping `CommonError`; that variant
/// forwards every method to the embedded error.
///
/// # Usage
///
/// ```rust
/// use zrata_common::error::{CommonError, ErrorSeverity};
/// use zrata_common::impl_error_classification;
///
/// #[derive(Debug)]
/// pub enum MyError {
///     Specific(String),
///     Common(CommonError),
/// }
///
/// impl_error_classification!(MyError, delegate Common,
///     Self::Specific(_) => {
///         retryable: false,
///         severity: ErrorSeverity::Error,
///         critical: false,
///     }
/// );
/// ```
#[macro_export]
macro_rules! impl_error_classification {
    (
        $error_type:ty, delegate $common_variant:ident
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(, retry_after: $retry_after:expr)?
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::is_retryable(e),
                    $($variant => $retryable,)*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::severity(e),
                    $($variant => $severity,)*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::is_critical(e),
                    $($variant => $critical,)*
                }
            }

            fn retry_after(&self) -> Option<std::time::Duration> {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::retry_after(e),
                    $($($variant => $retry_after,)?)*
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
    (
        $error_type:ty
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(, retry_after: $retry_after:expr)?
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    $($variant => $retryable,)*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    $($variant => $severity,)*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    $($variant => $critical,)*
                }
            }

            fn retry_after(&self) -> Option<std::time::Duration> {
                match self {
                    $($($variant => $retry_after,)?)*
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}
