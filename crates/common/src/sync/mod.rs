//! Retry timing for synchronization work

pub mod backoff;
