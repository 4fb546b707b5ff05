//! Scheduler mode and the scheduler-wide wait interval

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::constants::MAX_DEADLINE_SECS;
use crate::impl_wire_name_conversions;

/// `now + delay`, clamped to [`MAX_DEADLINE_SECS`] ahead of `now`.
pub fn deadline_after(now: Instant, delay: Duration) -> Instant {
    let delay = delay.min(Duration::from_secs(MAX_DEADLINE_SECS));
    now.checked_add(delay).unwrap_or(now)
}

/// Which kind of work the scheduler currently accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerMode {
    /// Only configuration jobs run; nudges are held until normal mode.
    Configuration,
    /// Nudges and polls run.
    Normal,
}

impl_wire_name_conversions!(SchedulerMode {
    Configuration => "configuration",
    Normal => "normal",
});

/// Kind of suspension the scheduler is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitMode {
    /// Retrying after transient failures; canary jobs may still run.
    ExponentialBackoff,
    /// Server asked us to go quiet; nothing runs until the interval ends.
    Throttled,
}

impl_wire_name_conversions!(WaitMode {
    ExponentialBackoff => "exponential_backoff",
    Throttled => "throttled",
});

/// Scheduler-wide suspension with its unblock deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitInterval {
    pub mode: WaitMode,
    pub length: Duration,
    pub unblock_at: Instant,
}

impl WaitInterval {
    pub fn new(mode: WaitMode, length: Duration, now: Instant) -> Self {
        let unblock_at = deadline_after(now, length);
        Self { mode, length: unblock_at.duration_since(now), unblock_at }
    }

    pub fn is_throttled(&self) -> bool {
        self.mode == WaitMode::Throttled
    }

    pub fn is_backoff(&self) -> bool {
        self.mode == WaitMode::ExponentialBackoff
    }

    /// Time left before the interval ends, zero once it has passed.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.unblock_at.saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unblock_deadline_is_now_plus_length() {
        let now = Instant::now();
        let interval = WaitInterval::new(WaitMode::Throttled, Duration::from_secs(30), now);

        assert!(interval.is_throttled());
        assert!(!interval.is_backoff());
        assert_eq!(interval.remaining(now), Duration::from_secs(30));
        assert_eq!(interval.remaining(now + Duration::from_secs(45)), Duration::ZERO);
    }

    #[test]
    fn oversized_length_is_clamped() {
        let now = Instant::now();
        let interval = WaitInterval::new(WaitMode::ExponentialBackoff, Duration::MAX, now);

        assert_eq!(interval.length, Duration::from_secs(MAX_DEADLINE_SECS));
        assert_eq!(interval.remaining(now), interval.length);
    }

    #[test]
    fn deadline_after_never_overflows() {
        let now = Instant::now();

        assert_eq!(deadline_after(now, Duration::from_secs(5)), now + Duration::from_secs(5));
        assert!(deadline_after(now, Duration::MAX) > now);
    }
}
