//! Shared test helpers for `cadence-core` integration tests.
//!
//! Mocks for the two ports so tests can drive a session end to end without
//! a runtime scheduler.

pub mod ports;
