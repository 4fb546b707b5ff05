//! Testing utilities and helpers
//!
//! - **[`time`]**: clock abstraction with a controllable mock

pub mod time;

pub use time::{Clock, MockClock, SystemClock};
