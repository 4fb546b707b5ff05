//! Time abstraction for testability
//!
//! The scheduler reads time only through [`Clock`], so decision logic can be
//! exercised with a [`MockClock`] that moves only when told to.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use cadence_common::testing::{Clock, MockClock};
//!
//! let mock = MockClock::new();
//! let start = mock.now();
//! mock.advance(Duration::from_secs(5));
//! assert_eq!(mock.now().duration_since(start), Duration::from_secs(5));
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic and wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Wall-clock time corresponding to a monotonic deadline.
    fn system_time_at(&self, deadline: Instant) -> SystemTime {
        let now = self.now();
        let wall = self.system_time();
        if deadline >= now {
            wall + deadline.duration_since(now)
        } else {
            wall - now.duration_since(deadline)
        }
    }

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Real system clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed time.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
    base_system_time: SystemTime,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            base_system_time: SystemTime::now(),
        }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner) += duration;
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner) = duration;
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        self.base_system_time + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for testing::time.
    use super::*;

    /// Validates the system clock scenario.
    #[test]
    fn test_system_clock() {
        let clock = SystemClock;
        let now1 = clock.now();
        let now2 = clock.now();

        assert!(now2 >= now1);
        assert!(clock.millis_since_epoch() > 0);
    }

    /// Validates `MockClock::advance` moving both clocks together.
    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let start = clock.now();
        let wall_start = clock.system_time();

        clock.advance(Duration::from_secs(5));

        assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
        assert_eq!(clock.system_time().duration_since(wall_start).unwrap(), Duration::from_secs(5));
    }

    /// Validates the mock clock clone scenario.
    #[test]
    fn test_mock_clock_clone_shares_elapsed() {
        let clock1 = MockClock::new();
        clock1.advance(Duration::from_secs(10));

        let clock2 = clock1.clone();
        clock1.advance(Duration::from_secs(5));
        assert_eq!(clock2.elapsed(), Duration::from_secs(15));

        clock2.set_elapsed(Duration::from_secs(1));
        assert_eq!(clock1.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn test_system_time_at_maps_deadlines() {
        let clock = MockClock::new();
        let deadline = clock.now() + Duration::from_secs(30);
        let expected = clock.system_time() + Duration::from_secs(30);

        assert_eq!(clock.system_time_at(deadline), expected);

        clock.advance(Duration::from_secs(40));
        assert_eq!(clock.system_time_at(deadline), expected);
    }
}
