//! Synchronization scheduling model

pub mod decision;
pub mod job;
pub mod listeners;
pub mod outcome;
pub mod ports;
pub mod session;
pub mod throttle;
