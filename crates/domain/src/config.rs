//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zrata_common::hash::HashAlgorithm;

use crate::constants::{
    DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_CACHE_PATH, DEFAULT_CONNECTION_TIMEOUT_SECS,
    DEFAULT_FLOAT_PRECISION, DEFAULT_LOG_LEVEL, DEFAULT_POOL_SIZE, MAX_FLOAT_PRECISION,
    MAX_POOL_SIZE,
};
use crate::errors::ConfigError;
use crate::impl_domain_enum_conversions;

/// Cache configuration
///
/// Every section falls back to its defaults when omitted from a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub storage: StorageSettings,
    pub manager: ManagerSettings,
    pub hashing: HashingSettings,
    pub logging: LoggingSettings,
}

impl CacheSettings {
    /// Check every section; the first violation wins
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.manager.validate()?;
        self.hashing.validate()?;
        self.logging.validate()
    }
}

/// Which medium stores entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    Sqlite,
    Filesystem,
}

impl_domain_enum_conversions!(StorageBackend {
    Memory => "memory" | "mem",
    Sqlite => "sqlite" | "sqlite3" | "db",
    Filesystem => "filesystem" | "fs" | "dir",
});

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Database file for `sqlite`, root directory for `filesystem`
    pub path: PathBuf,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
    pub connection_timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: PathBuf::from(DEFAULT_CACHE_PATH),
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
        }
    }
}

impl StorageSettings {
    /// In-memory storage; nothing touches disk
    pub fn memory() -> Self {
        Self { backend: StorageBackend::Memory, ..Self::default() }
    }

    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self { backend: StorageBackend::Sqlite, path: path.into(), ..Self::default() }
    }

    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self { backend: StorageBackend::Filesystem, path: root.into(), ..Self::default() }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend != StorageBackend::Memory && self.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("storage.path", "must not be empty"));
        }
        if self.pool_size == 0 || self.pool_size > MAX_POOL_SIZE {
            return Err(ConfigError::invalid(
                "storage.pool_size",
                format!("must be between 1 and {MAX_POOL_SIZE}, got {}", self.pool_size),
            ));
        }
        if self.connection_timeout_secs == 0 {
            return Err(ConfigError::invalid("storage.connection_timeout_secs", "must be positive"));
        }
        Ok(())
    }
}

/// Manager configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// How long a caller waits on someone else's computation; `None` waits
    /// until it finishes
    pub wait_timeout_ms: Option<u64>,
}

impl ManagerSettings {
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }

    /// A zero timeout would fail every waiter immediately; omit the field to
    /// wait without limit
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait_timeout_ms == Some(0) {
            return Err(ConfigError::invalid("manager.wait_timeout_ms", "must be positive"));
        }
        Ok(())
    }
}

/// Hasher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingSettings {
    pub algorithm: HashAlgorithm,
    /// Fractional digits kept for float parameters
    pub float_precision: u8,
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self { algorithm: HashAlgorithm::default(), float_precision: DEFAULT_FLOAT_PRECISION }
    }
}

impl HashingSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.float_precision == 0 || self.float_precision > MAX_FLOAT_PRECISION {
            return Err(ConfigError::invalid(
                "hashing.float_precision",
                format!("must be between 1 and {MAX_FLOAT_PRECISION}, got {}", self.float_precision),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), json: false }
    }
}

impl LoggingSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = CacheSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.storage.backend, StorageBackend::Sqlite);
        assert_eq!(settings.hashing.algorithm, HashAlgorithm::Sha256);
        assert_eq!(settings.hashing.float_precision, 10);
        assert_eq!(settings.manager.wait_timeout(), None);
    }

    #[test]
    fn zero_wait_timeout_is_rejected() {
        let mut settings = CacheSettings::default();
        settings.manager.wait_timeout_ms = Some(0);
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field: "manager.wait_timeout_ms", .. })
        ));

        settings.manager.wait_timeout_ms = Some(1);
        settings.validate().unwrap();
    }

    #[test]
    fn backend_parses_aliases() {
        assert_eq!("FS".parse::<StorageBackend>().unwrap(), StorageBackend::Filesystem);
        assert_eq!(" sqlite3 ".parse::<StorageBackend>().unwrap(), StorageBackend::Sqlite);
        assert_eq!(StorageBackend::Memory.to_string(), "memory");
        assert!("redis".parse::<StorageBackend>().is_err());
    }

    /// Validates partial TOML documents fill the rest from defaults.
    ///
    /// Assertions:
    /// - omitted sections and fields take default values
    /// - present fields override them
    #[test]
    fn partial_toml_uses_defaults() {
        let settings: CacheSettings = toml::from_str(
            r#"
            [storage]
            backend = "filesystem"
            path = "/var/cache/zrata"

            [hashing]
            algorithm = "blake3"

            [manager]
            wait_timeout_ms = 2500
            "#,
        )
        .unwrap();

        assert_eq!(settings.storage.backend, StorageBackend::Filesystem);
        assert_eq!(settings.storage.path, PathBuf::from("/var/cache/zrata"));
        assert_eq!(settings.storage.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(settings.hashing.algorithm, HashAlgorithm::Blake3);
        assert_eq!(settings.hashing.float_precision, DEFAULT_FLOAT_PRECISION);
        assert_eq!(settings.manager.wait_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(settings.logging, LoggingSettings::default());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut settings = CacheSettings::default();
        settings.storage.pool_size = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field: "storage.pool_size", .. })
        ));

        let mut settings = CacheSettings::default();
        settings.hashing.float_precision = 18;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field: "hashing.float_precision", .. })
        ));

        let mut settings = CacheSettings::default();
        settings.storage.path = PathBuf::new();
        assert!(settings.validate().is_err());
        settings.storage.backend = StorageBackend::Memory;
        settings.validate().unwrap();
    }
}
