//! Conversions from external infrastructure errors into `CacheError`.
//!
//! Adapters never report a medium failure as `NotFound`; everything here
//! lands in `StorageUnavailable` or `Serialization`.

use rusqlite::Error as SqlError;
use tokio::task::JoinError;
use zrata_common::error::ErrorClassification;
use zrata_common::storage::StorageError;
use zrata_domain::CacheError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CacheError);

impl From<InfraError> for CacheError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CacheError> for InfraError {
    fn from(value: CacheError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoCacheError {
    fn into_cache_error(self) -> CacheError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CacheError */
/* -------------------------------------------------------------------------- */

impl IntoCacheError for SqlError {
    fn into_cache_error(self) -> CacheError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => CacheError::storage_transient("database is busy"),
                    ErrorCode::DatabaseLocked => CacheError::storage_transient("database is locked"),
                    ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => {
                        CacheError::storage(format!("database file is corrupt: {message}"))
                    }
                    ErrorCode::DiskFull => CacheError::storage("disk is full"),
                    ErrorCode::ReadOnly => CacheError::storage("database is read-only"),
                    _ => CacheError::storage(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                CacheError::storage(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                CacheError::storage(format!("invalid column type for '{name}': {ty}"))
            }
            RE::Utf8Error(_) => CacheError::storage("invalid UTF-8 returned from sqlite"),
            RE::InvalidPath(path) => CacheError::storage(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => CacheError::storage(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(value.into_cache_error())
    }
}

/* -------------------------------------------------------------------------- */
/* StorageError → CacheError */
/* -------------------------------------------------------------------------- */

impl IntoCacheError for StorageError {
    fn into_cache_error(self) -> CacheError {
        match self {
            StorageError::Rusqlite(err) => err.into_cache_error(),
            other => CacheError::StorageUnavailable {
                retryable: other.is_retryable(),
                message: other.to_string(),
            },
        }
    }
}

impl From<StorageError> for InfraError {
    fn from(value: StorageError) -> Self {
        Self(value.into_cache_error())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → CacheError */
/* -------------------------------------------------------------------------- */

impl IntoCacheError for std::io::Error {
    fn into_cache_error(self) -> CacheError {
        use std::io::ErrorKind;

        let retryable = matches!(
            self.kind(),
            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
        );
        CacheError::StorageUnavailable { message: format!("I/O error: {self}"), retryable }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        Self(value.into_cache_error())
    }
}

/* -------------------------------------------------------------------------- */
/* Helpers */
/* -------------------------------------------------------------------------- */

/// Map any supported infrastructure error into `CacheError`
pub fn to_cache_error<E: Into<InfraError>>(err: E) -> CacheError {
    err.into().0
}

/// A blocking task that panicked or was cancelled
pub fn map_join_error(err: JoinError) -> CacheError {
    if err.is_cancelled() {
        CacheError::storage_transient("blocking storage task was cancelled")
    } else {
        CacheError::storage(format!("blocking storage task panicked: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
