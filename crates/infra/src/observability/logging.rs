//! Structured logging with tracing
//!
//! Installs a global `tracing-subscriber` registry with an `EnvFilter` and
//! either human-readable or JSON output.

use cadence_domain::{CadenceError, LoggingConfig, Result};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Environment variable that overrides the configured filter.
pub const LOG_FILTER_ENV: &str = "CADENCE_LOG";

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub const fn from_config(config: &LoggingConfig) -> Self {
        if config.json {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Installs the global subscriber.
///
/// `CADENCE_LOG` takes precedence over `filter` when set.
///
/// # Errors
/// Returns `CadenceError::Config` if the filter does not parse or a global
/// subscriber is already installed.
pub fn init_tracing(filter: &str, format: LogFormat) -> Result<()> {
    let env_filter = match EnvFilter::try_from_env(LOG_FILTER_ENV) {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter)
            .map_err(|e| CadenceError::Config(format!("Invalid log filter '{filter}': {e}")))?,
    };

    let registry = Registry::default().with(env_filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init(),
    };
    installed.map_err(|e| CadenceError::Config(format!("Failed to install subscriber: {e}")))?;

    info!(filter, ?format, "tracing initialized");
    Ok(())
}

/// Convenience wrapper reading the filter and format from configuration.
///
/// # Errors
/// See [`init_tracing`].
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    init_tracing(&config.filter, LogFormat::from_config(config))
}
