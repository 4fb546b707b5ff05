// Backoff policy: failure history -> next retry delay, server hint -> throttle length

pub mod constants;
pub mod error;
pub mod policy;

pub use error::{BackoffError, BackoffResult};
pub use policy::{BackoffCause, BackoffPolicy};
