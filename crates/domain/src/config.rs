//! Configuration structures
//!
//! Every field has a default, so a partial JSON/TOML file (or none at all)
//! yields a usable configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_JITTER, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_BACKOFF_SECS,
    DEFAULT_LONG_POLL_INTERVAL_SECS, DEFAULT_MAX_BACKOFF_SECS, DEFAULT_MAX_THROTTLE_SECS,
    DEFAULT_SESSIONS_COMMIT_DELAY_SECS, DEFAULT_SHORT_INITIAL_BACKOFF_SECS,
    DEFAULT_SHORT_POLL_INTERVAL_SECS, DEFAULT_STOP_TIMEOUT_SECS,
};
use crate::errors::{CadenceError, Result};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub backoff: BackoffConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Rejects values the scheduler can not run with.
    ///
    /// # Errors
    /// Returns `CadenceError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.backoff.validate()
    }
}

/// Polling and lifecycle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Poll interval while change notifications are unavailable.
    pub short_poll_interval_secs: u64,
    /// Poll interval while change notifications are working.
    pub long_poll_interval_secs: u64,
    pub sessions_commit_delay_secs: u64,
    pub notifications_enabled: bool,
    /// How long `shutdown` waits for the worker task.
    pub stop_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            short_poll_interval_secs: DEFAULT_SHORT_POLL_INTERVAL_SECS,
            long_poll_interval_secs: DEFAULT_LONG_POLL_INTERVAL_SECS,
            sessions_commit_delay_secs: DEFAULT_SESSIONS_COMMIT_DELAY_SECS,
            notifications_enabled: false,
            stop_timeout_secs: DEFAULT_STOP_TIMEOUT_SECS,
        }
    }
}

impl SchedulerConfig {
    pub const fn short_poll_interval(&self) -> Duration {
        Duration::from_secs(self.short_poll_interval_secs)
    }

    pub const fn long_poll_interval(&self) -> Duration {
        Duration::from_secs(self.long_poll_interval_secs)
    }

    pub const fn sessions_commit_delay(&self) -> Duration {
        Duration::from_secs(self.sessions_commit_delay_secs)
    }

    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.short_poll_interval_secs == 0 {
            return Err(CadenceError::Config("short_poll_interval_secs must be positive".into()));
        }
        if self.long_poll_interval_secs == 0 {
            return Err(CadenceError::Config("long_poll_interval_secs must be positive".into()));
        }
        if self.stop_timeout_secs == 0 {
            return Err(CadenceError::Config("stop_timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Retry delay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// First delay after an ordinary failure.
    pub initial_backoff_secs: u64,
    /// First delay after network, migration or conflict failures.
    pub short_initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub multiplier: f64,
    /// Upward-only random spread, as a fraction of the grown delay.
    pub jitter: f64,
    /// Upper bound applied to server throttle durations.
    pub max_throttle_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_backoff_secs: DEFAULT_INITIAL_BACKOFF_SECS,
            short_initial_backoff_secs: DEFAULT_SHORT_INITIAL_BACKOFF_SECS,
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: DEFAULT_BACKOFF_JITTER,
            max_throttle_secs: DEFAULT_MAX_THROTTLE_SECS,
        }
    }
}

impl BackoffConfig {
    fn validate(&self) -> Result<()> {
        if self.short_initial_backoff_secs == 0 || self.initial_backoff_secs == 0 {
            return Err(CadenceError::Config("initial backoff must be positive".into()));
        }
        if self.max_backoff_secs < self.initial_backoff_secs
            || self.max_backoff_secs < self.short_initial_backoff_secs
        {
            return Err(CadenceError::Config(
                "max_backoff_secs must not be below the initial backoff".into(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier <= 1.0 {
            return Err(CadenceError::Config("multiplier must be greater than 1".into()));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(CadenceError::Config("jitter must be within [0, 1]".into()));
        }
        if self.max_throttle_secs == 0 {
            return Err(CadenceError::Config("max_throttle_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info,cadence_infra=debug`.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_string(), json: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.short_poll_interval(), Duration::from_secs(60));
        assert_eq!(config.scheduler.long_poll_interval(), Duration::from_secs(3600));
        assert_eq!(config.scheduler.sessions_commit_delay(), Duration::from_secs(10));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "scheduler": { "short_poll_interval_secs": 5 } }"#).unwrap();

        assert_eq!(config.scheduler.short_poll_interval_secs, 5);
        assert_eq!(config.scheduler.long_poll_interval_secs, DEFAULT_LONG_POLL_INTERVAL_SECS);
        assert_eq!(config.backoff, BackoffConfig::default());
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let mut config = Config::default();
        config.scheduler.short_poll_interval_secs = 0;

        assert!(matches!(config.validate(), Err(CadenceError::Config(_))));
    }

    #[test]
    fn rejects_inverted_backoff_bounds() {
        let mut config = Config::default();
        config.backoff.max_backoff_secs = 10;

        assert!(matches!(config.validate(), Err(CadenceError::Config(_))));
    }

    #[test]
    fn rejects_non_growing_multiplier() {
        let mut config = Config::default();
        config.backoff.multiplier = 1.0;

        assert!(config.validate().is_err());
    }
}
