//! # Cadence Core
//!
//! Scheduling rules with no runtime attached.
//!
//! This crate contains:
//! - Port interfaces for the syncer and the server connection (traits)
//! - The per-cycle session, its status controller and server directives
//! - Jobs, the job decision table and cycle outcome classification
//! - Per-type throttle tracking and listener registration
//!
//! ## Architecture Principles
//! - Depends only on `cadence-common` and `cadence-domain`
//! - No tokio tasks or timers; the infra layer owns execution
//! - Time enters as explicit `Instant` arguments

pub mod sync;

// Re-export specific items to avoid ambiguity
pub use sync::decision::{decide_on_job, DecisionContext, JobDecision};
pub use sync::job::{ConfigurationParams, Job, JobKind, JobPriority, ReadyTask, RetryTask};
pub use sync::listeners::{EventCallback, SyncEventListeners};
pub use sync::outcome::{backoff_cause, classify_cycle, CycleOutcome};
pub use sync::ports::{ServerConnectionManager, Syncer};
pub use sync::session::{
    SessionDirectives, ShareInfo, StatusController, SyncSession, SyncSessionContext,
};
pub use sync::throttle::ThrottledDataTypeTracker;
