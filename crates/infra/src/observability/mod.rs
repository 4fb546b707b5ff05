//! Observability infrastructure for logging and scheduler metrics
//!
//! ## Design Principles
//!
//! 1. **Poison Recovery**: metric mutexes recover the inner data instead of
//!    panicking when a recording thread panicked.
//!
//! 2. **Uniform Returns**: all record methods return `MetricsResult<()>` so
//!    callers handle them the same way through
//!    [`log_metric`](metrics::log_metric).
//!
//! 3. **Ring Buffers**: `VecDeque` for O(1) eviction of old cycle durations.

pub mod logging;
pub mod metrics;

pub use logging::{init_tracing, LogFormat};
pub use metrics::{log_metric, SchedulerMetrics};

/// Metrics error type
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Empty data set - cannot calculate aggregate metric
    #[error("Empty data: cannot calculate {metric}")]
    EmptyData {
        /// Metric name that failed (e.g., "P95", "P50")
        metric: &'static str,
    },
}

/// Result type for metrics operations
pub type MetricsResult<T> = Result<T, MetricsError>;
