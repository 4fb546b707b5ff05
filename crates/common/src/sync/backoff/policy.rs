// Backoff policy with exponential growth, a ceiling and upward-only jitter
use std::time::Duration;

use rand::Rng;
#[cfg(feature = "observability")]
use tracing::debug;

use crate::error::CommonError;
use crate::sync::backoff::constants::{
    DEFAULT_INITIAL_BACKOFF, DEFAULT_JITTER_FACTOR, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_THROTTLE,
    DEFAULT_MULTIPLIER, DEFAULT_SHORT_INITIAL_BACKOFF, DEFAULT_THROTTLE_DELAY,
    MAX_BACKOFF_EXPONENT, MIN_BACKOFF_STEP,
};
use crate::sync::backoff::error::{BackoffError, BackoffResult};

/// What made the first failure of a backoff run happen.
///
/// Failures that usually clear up quickly start from the short initial delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackoffCause {
    NetworkUnavailable,
    MigrationDone,
    CommitConflict,
    Other,
}

impl BackoffCause {
    const fn starts_short(self) -> bool {
        matches!(self, Self::NetworkUnavailable | Self::MigrationDone | Self::CommitConflict)
    }
}

/// Pure delay calculator used by the scheduler.
///
/// Successive calls to [`next_backoff`](Self::next_backoff) return strictly
/// increasing delays until `max_delay`, then stay at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    short_initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_factor: f64,
    max_throttle: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_BACKOFF,
            short_initial_delay: DEFAULT_SHORT_INITIAL_BACKOFF,
            max_delay: DEFAULT_MAX_BACKOFF,
            multiplier: DEFAULT_MULTIPLIER,
            jitter_factor: DEFAULT_JITTER_FACTOR,
            max_throttle: DEFAULT_MAX_THROTTLE,
        }
    }
}

impl BackoffPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy with custom bounds
    pub fn custom(
        initial_delay: Duration,
        short_initial_delay: Duration,
        max_delay: Duration,
    ) -> BackoffResult<Self> {
        if initial_delay.is_zero() || short_initial_delay.is_zero() {
            return Err(CommonError::config_field("initial_delay", "must be positive").into());
        }
        for initial in [initial_delay, short_initial_delay] {
            if initial > max_delay {
                return Err(BackoffError::InvertedBounds { initial, max: max_delay });
            }
        }

        Ok(Self { initial_delay, short_initial_delay, max_delay, ..Self::default() })
    }

    /// Set the growth factor between consecutive delays
    pub fn with_multiplier(mut self, multiplier: f64) -> BackoffResult<Self> {
        if !multiplier.is_finite() || multiplier <= 1.0 {
            return Err(BackoffError::InvalidMultiplier(multiplier));
        }
        self.multiplier = multiplier;
        Ok(self)
    }

    /// Set the jitter factor (0.0 = none, 1.0 = up to double the grown delay)
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = if factor.is_finite() { factor.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    /// Set the upper bound for server throttle lengths
    pub fn with_max_throttle(mut self, max_throttle: Duration) -> Self {
        self.max_throttle = max_throttle;
        self
    }

    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// First delay of a backoff run.
    pub fn initial_delay(&self, cause: BackoffCause) -> Duration {
        let delay =
            if cause.starts_short() { self.short_initial_delay } else { self.initial_delay };
        delay.min(self.max_delay)
    }

    /// Delay following `previous`, the length of the last wait.
    ///
    /// With no previous wait the delay is derived from `consecutive_failures`
    /// as `short_initial * 2^failures`.
    pub fn next_backoff(&self, previous: Duration, consecutive_failures: u32) -> Duration {
        if previous >= self.max_delay {
            return self.max_delay;
        }

        let grown = if previous.is_zero() {
            self.exponential_from_short(consecutive_failures)
        } else {
            previous.mul_f64(self.multiplier).max(previous + MIN_BACKOFF_STEP)
        };

        let next = self.apply_jitter(grown).min(self.max_delay);

        #[cfg(feature = "observability")]
        debug!(
            previous_ms = previous.as_millis() as u64,
            next_ms = next.as_millis() as u64,
            consecutive_failures,
            "computed next backoff"
        );

        next
    }

    /// Wait length for a server throttle.
    ///
    /// The server's hint passes through unchanged, including zero. Only a
    /// missing hint falls back to the default throttle delay. The result never
    /// exceeds the configured maximum.
    pub fn throttle_length(&self, server_hint: Option<Duration>) -> Duration {
        server_hint.unwrap_or(DEFAULT_THROTTLE_DELAY).min(self.max_throttle)
    }

    fn exponential_from_short(&self, attempt: u32) -> Duration {
        let base_millis = self.short_initial_delay.as_millis() as u64;
        let max_millis = self.max_delay.as_millis() as u64;

        let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
        let multiplier = 2_u64.saturating_pow(exponent);

        Duration::from_millis(base_millis.saturating_mul(multiplier).min(max_millis))
    }

    /// Upward-only jitter keeps the sequence monotone.
    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 {
            return delay;
        }

        let mut rng = rand::thread_rng();
        let spread = delay.as_secs_f64() * self.jitter_factor;
        delay + Duration::from_secs_f64(rng.gen_range(0.0..=spread))
    }
}
