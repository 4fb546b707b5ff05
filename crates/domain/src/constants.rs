//! Scheduler constants
//!
//! Defaults used when neither the server nor the configuration file supplies
//! a value.

// Polling
pub const DEFAULT_SHORT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_LONG_POLL_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_SESSIONS_COMMIT_DELAY_SECS: u64 = 10;

// Backoff
pub const DEFAULT_INITIAL_BACKOFF_SECS: u64 = 300;
pub const DEFAULT_SHORT_INITIAL_BACKOFF_SECS: u64 = 1;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 3600;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_BACKOFF_JITTER: f64 = 0.0;

// Throttling
pub const DEFAULT_MAX_THROTTLE_SECS: u64 = 24 * 3600;

// Furthest ahead any nudge or wait deadline is placed (30 years)
pub const MAX_DEADLINE_SECS: u64 = 30 * 365 * 24 * 3600;

// Lifecycle
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 5;

// Environment variable prefix for the config loader
pub const ENV_PREFIX: &str = "CADENCE_";
