//! Sync scheduling runtime
//!
//! - `sync_scheduler`: the public handle and its status types
//! - `worker`: the task that owns all scheduling state
//! - `timers`: timer slots and the shared stop signal
//!
//! Runtime rules:
//! - One worker task per scheduler, joined on shutdown
//! - At most one sync cycle in flight
//! - Cancellation token per cycle for early exit
//! - Timeout on worker shutdown

pub mod error;
pub mod sync_scheduler;
mod timers;
mod worker;

pub use error::{SchedulerError, SchedulerResult};
pub use sync_scheduler::{RunState, SchedulerStatus, SyncScheduler};
