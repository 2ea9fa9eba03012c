//! Configuration loader
//!
//! Loads cache configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `ZRATA_CACHE_BACKEND` is unset, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Uses defaults when no file exists
//! 5. Validates the result before returning it
//!
//! ## Environment Variables
//! - `ZRATA_CACHE_BACKEND`: `memory`, `sqlite` or `filesystem` (required for
//!   env loading)
//! - `ZRATA_CACHE_PATH`: database file or entry directory
//! - `ZRATA_CACHE_POOL_SIZE`: SQLite connection pool size
//! - `ZRATA_CACHE_BUSY_TIMEOUT_MS`: SQLite busy timeout
//! - `ZRATA_CACHE_CONNECTION_TIMEOUT_SECS`: pool checkout timeout
//! - `ZRATA_CACHE_WAIT_TIMEOUT_MS`: how long to wait on another caller
//! - `ZRATA_CACHE_HASH_ALGORITHM`: `sha256` or `blake3`
//! - `ZRATA_CACHE_FLOAT_PRECISION`: fractional digits kept for floats
//! - `ZRATA_CACHE_LOG_LEVEL`: default tracing filter
//! - `ZRATA_CACHE_LOG_JSON`: emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader searches `zrata.toml`, `zrata.json`, `config.toml` and
//! `config.json` in the working directory and its two parents, then next to
//! the executable.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use zrata_domain::constants::ENV_PREFIX;
use zrata_domain::{CacheSettings, ConfigError, HashAlgorithm, StorageBackend};

const CONFIG_FILE_NAMES: [&str; 4] = ["zrata.toml", "zrata.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `ConfigError` if an explicitly provided source is malformed or the
/// resulting settings fail validation.
pub fn load() -> Result<CacheSettings, ConfigError> {
    let settings = match load_from_env() {
        Ok(settings) => {
            tracing::info!("Configuration loaded from environment variables");
            settings
        }
        Err(ConfigError::MissingVar(var)) => {
            tracing::debug!(missing = %var, "Environment not configured, trying file");
            match load_from_file(None) {
                Ok(settings) => settings,
                Err(ConfigError::NoConfigFile) => {
                    tracing::info!("No config file found, using defaults");
                    CacheSettings::default()
                }
                Err(e) => return Err(e),
            }
        }
        Err(e) => return Err(e),
    };

    settings.validate()?;
    Ok(settings)
}

/// Load configuration from environment variables
///
/// `ZRATA_CACHE_BACKEND` must be set; every other variable is optional and
/// falls back to its default.
///
/// # Errors
/// `MissingVar` when the backend is unset, `Invalid` for unparseable values.
pub fn load_from_env() -> Result<CacheSettings, ConfigError> {
    let mut settings = CacheSettings::default();

    settings.storage.backend = env_var("BACKEND")?
        .parse::<StorageBackend>()
        .map_err(|e| ConfigError::invalid("storage.backend", e))?;
    if let Some(path) = env_opt("PATH") {
        settings.storage.path = PathBuf::from(path);
    }
    if let Some(size) = env_parse("POOL_SIZE", "storage.pool_size")? {
        settings.storage.pool_size = size;
    }
    if let Some(ms) = env_parse("BUSY_TIMEOUT_MS", "storage.busy_timeout_ms")? {
        settings.storage.busy_timeout_ms = ms;
    }
    if let Some(secs) = env_parse("CONNECTION_TIMEOUT_SECS", "storage.connection_timeout_secs")? {
        settings.storage.connection_timeout_secs = secs;
    }

    settings.manager.wait_timeout_ms = env_parse("WAIT_TIMEOUT_MS", "manager.wait_timeout_ms")?;

    if let Some(algorithm) = env_parse::<HashAlgorithm>("HASH_ALGORITHM", "hashing.algorithm")? {
        settings.hashing.algorithm = algorithm;
    }
    if let Some(precision) = env_parse("FLOAT_PRECISION", "hashing.float_precision")? {
        settings.hashing.float_precision = precision;
    }

    if let Some(level) = env_opt("LOG_LEVEL") {
        settings.logging.level = level;
    }
    settings.logging.json = env_bool("LOG_JSON", false);

    Ok(settings)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations.
///
/// # Errors
/// `FileNotFound` for a missing explicit path, `NoConfigFile` when probing
/// finds nothing, `Read` or `Parse` for unreadable content.
pub fn load_from_file(path: Option<PathBuf>) -> Result<CacheSettings, ConfigError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::FileNotFound(p));
            }
            p
        }
        None => find_config_path().ok_or(ConfigError::NoConfigFile)?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)?;
    parse_config(&contents, &config_path)
}

/// Parse configuration by file extension (`.toml` or `.json`)
fn parse_config(contents: &str, path: &Path) -> Result<CacheSettings, ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "TOML", message: e.to_string() }),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "JSON", message: e.to_string() }),
        other => Err(ConfigError::Parse {
            format: "config",
            message: format!("unsupported extension: {other}"),
        }),
    }
}

/// First existing config file among the standard locations
pub fn find_config_path() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}{suffix}")
}

/// Required variable
fn env_var(suffix: &str) -> Result<String, ConfigError> {
    let key = env_key(suffix);
    std::env::var(&key).map_err(|_| ConfigError::MissingVar(key))
}

/// Optional variable; empty counts as unset
fn env_opt(suffix: &str) -> Option<String> {
    std::env::var(env_key(suffix)).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(suffix: &str, field: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    env_opt(suffix)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::invalid(field, format!("{}: {e}", env_key(suffix))))
        })
        .transpose()
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(suffix: &str, default: bool) -> bool {
    env_opt(suffix)
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
