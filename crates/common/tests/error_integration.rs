//! Integration tests for error classification
//!
//! Exercises `CommonError` and the `impl_error_classification!` macro from
//! outside the crate, the way downstream error enums use them.

#![cfg(feature = "foundation")]

use std::time::Duration;

use zrata_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use zrata_common::impl_error_classification;

#[derive(Debug)]
enum LookupError {
    Missing(String),
    Conflict,
    Common(CommonError),
}

impl_error_classification!(LookupError, delegate Common,
    Self::Missing(_) => {
        retryable: false,
        severity: ErrorSeverity::Info,
        critical: false,
    },
    Self::Conflict => {
        retryable: false,
        severity: ErrorSeverity::Critical,
        critical: true,
    }
);

#[derive(Debug)]
enum WaitError {
    Elapsed(Duration),
}

impl_error_classification!(WaitError,
    Self::Elapsed(d) => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
        retry_after: Some(*d),
    }
);

/// Verifies downstream enums classify through the macro.
#[test]
fn test_macro_generated_classification() {
    assert_eq!(LookupError::Missing("fp".into()).severity(), ErrorSeverity::Info);
    assert!(LookupError::Conflict.is_critical());
    assert!(!LookupError::Conflict.is_retryable());

    let wrapped = LookupError::Common(CommonError::validation_with_value(
        "hashing.algorithm",
        "unsupported algorithm",
        "md5",
    ));
    assert!(!wrapped.is_retryable());
    assert_eq!(wrapped.severity(), ErrorSeverity::Error);
    assert!(!wrapped.is_critical());
}

/// Verifies `retry_after` is only reported by variants that declare it.
#[test]
fn test_retry_after_propagation() {
    let err = WaitError::Elapsed(Duration::from_millis(50));
    assert_eq!(err.retry_after(), Some(Duration::from_millis(50)));
    assert_eq!(LookupError::Conflict.retry_after(), None);
}

/// Verifies hash algorithm names are parsed case-insensitively and unknown
/// names surface as validation errors naming the value.
#[test]
fn test_unknown_algorithm_is_validation_error() {
    use zrata_common::HashAlgorithm;

    assert_eq!("BLAKE3".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Blake3);

    let err = "md5".parse::<HashAlgorithm>().unwrap_err();
    assert!(matches!(err, CommonError::Validation { value: Some(ref v), .. } if v == "md5"));
    assert!(!err.is_critical());
}
