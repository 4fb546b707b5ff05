//! Clock backed by the tokio timer

use std::time::{Instant, SystemTime};

use crate::testing::time::Clock;

/// Monotonic time as seen by tokio timers.
///
/// Under `tokio::time::pause` the monotonic reading moves only with
/// `tokio::time::advance`, so deadlines computed from it agree with the
/// sleeps the runtime arms. Wall-clock time follows the same offset from the
/// moment the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
    wall_origin: SystemTime,
}

impl TokioClock {
    pub fn new() -> Self {
        Self { origin: tokio::time::Instant::now(), wall_origin: SystemTime::now() }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn system_time(&self) -> SystemTime {
        self.wall_origin + tokio::time::Instant::now().duration_since(self.origin)
    }
}
