//! # Cadence Domain
//!
//! Value types shared by every layer of the synchronization scheduler.
//!
//! This crate contains:
//! - Model types, sources and routing information
//! - Wait intervals and scheduler modes
//! - Per-cycle counters and the immutable cycle snapshot
//! - Protocol errors, syncer results and engine events
//! - Configuration structures and their defaults
//!
//! ## Architecture
//! - No dependencies on other Cadence crates
//! - Only external dependencies allowed
//! - Pure data structures; no I/O and no async

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
