//! Modular common utilities shared across Cadence crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error classification and backoff policy
//! - `runtime`: tokio-backed timers and clocks
//! - `observability`: tracing of backoff decisions (included by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod sync;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "foundation", feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{CommonError, ErrorClassification, ErrorSeverity};
#[cfg(feature = "foundation")]
pub use sync::backoff::{BackoffCause, BackoffError, BackoffPolicy, BackoffResult};
#[cfg(feature = "foundation")]
pub use testing::time::{Clock, MockClock, SystemClock};
#[cfg(feature = "runtime")]
pub use time::{schedule_once, TimerHandle, TokioClock};
