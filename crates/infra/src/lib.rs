//! # Cadence Infrastructure
//!
//! Runtime side of the sync scheduler.
//!
//! This crate contains:
//! - The scheduler handle and its tokio worker task
//! - Configuration loading (environment, TOML/JSON files)
//! - Tracing setup and scheduler metrics
//!
//! ## Architecture
//! - Drives the ports defined in `cadence-core`
//! - Depends on `cadence-common`, `cadence-domain` and `cadence-core`
//! - Contains all code that spawns tasks, sleeps or reads the environment

pub mod config;
pub mod observability;
pub mod scheduling;

// Re-export commonly used items
pub use config::{load, load_from_env, load_from_file, load_or_default};
pub use observability::{init_tracing, LogFormat, SchedulerMetrics};
pub use scheduling::{RunState, SchedulerError, SchedulerResult, SchedulerStatus, SyncScheduler};
