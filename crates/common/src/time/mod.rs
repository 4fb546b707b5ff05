//! Time utilities and abstractions
//!
//! - **Clock abstractions**: real, mock and tokio-aware clocks
//! - **[`timer`]**: cancellable one-shot timers

pub mod clock;
pub mod timer;

pub use clock::TokioClock;
pub use timer::{schedule_once, TimerHandle};

// Re-export Clock abstractions from testing module
pub use crate::testing::time::{Clock, MockClock, SystemClock};
