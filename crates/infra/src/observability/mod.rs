//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the configured level so operators can
//! raise verbosity without editing config files.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use zrata_domain::{ConfigError, LoggingSettings};

/// Build the filter: `RUST_LOG` if set and valid, else `settings.level`
pub fn env_filter(settings: &LoggingSettings) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.level)
        .map_err(|e| ConfigError::invalid("logging.level", e.to_string()))
}

/// Install the global subscriber
///
/// # Errors
/// `ConfigError::Invalid` for an unparseable level and
/// `ConfigError::Logging` if a global subscriber is already installed.
pub fn init_tracing(settings: &LoggingSettings) -> Result<(), ConfigError> {
    let filter = env_filter(settings)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if settings.json {
        registry.with(fmt::layer().json().with_current_span(false)).try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };

    installed.map_err(|e| ConfigError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let settings = LoggingSettings { level: "zrata=loud".to_owned(), json: false };
        assert!(matches!(env_filter(&settings), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn second_install_fails_cleanly() {
        let settings = LoggingSettings::default();
        let first = init_tracing(&settings);
        let second = init_tracing(&settings);
        // Another test may have installed one already; either way the
        // second call must not succeed
        assert!(first.is_ok() || matches!(first, Err(ConfigError::Logging(_))));
        assert!(matches!(second, Err(ConfigError::Logging(_))));
    }
}
