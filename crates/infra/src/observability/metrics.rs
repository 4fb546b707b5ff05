//! Scheduler metrics
//!
//! Counters for every scheduling decision plus a ring buffer of cycle
//! durations for P50/P95 reporting.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::warn;

use crate::observability::{MetricsError, MetricsResult};

const MAX_DURATION_SAMPLES: usize = 1000;

/// Thread-safe counters for one scheduler instance
#[derive(Debug)]
pub struct SchedulerMetrics {
    cycles: AtomicUsize,
    failures: AtomicUsize,
    backoffs: AtomicUsize,
    throttles: AtomicUsize,
    coalesced_nudges: AtomicUsize,
    dropped_jobs: AtomicUsize,
    canary_runs: AtomicUsize,
    cycle_durations: Mutex<VecDeque<u64>>,
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self {
            cycles: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            backoffs: AtomicUsize::new(0),
            throttles: AtomicUsize::new(0),
            coalesced_nudges: AtomicUsize::new(0),
            dropped_jobs: AtomicUsize::new(0),
            canary_runs: AtomicUsize::new(0),
            cycle_durations: Mutex::new(VecDeque::with_capacity(MAX_DURATION_SAMPLES)),
        }
    }

    /// Record a finished cycle and its wall time.
    pub fn record_cycle(&self, duration: Duration) -> MetricsResult<()> {
        self.cycles.fetch_add(1, Ordering::Relaxed);

        let mut samples = self.cycle_durations.lock().unwrap_or_else(|poison| {
            warn!(metric = "SchedulerMetrics::cycle_durations", "Mutex poisoned, recovering");
            PoisonError::into_inner(poison)
        });
        samples.push_back(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
        if samples.len() > MAX_DURATION_SAMPLES {
            samples.pop_front();
        }
        Ok(())
    }

    pub fn record_failure(&self) -> MetricsResult<()> {
        self.failures.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn record_backoff(&self) -> MetricsResult<()> {
        self.backoffs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn record_throttle(&self) -> MetricsResult<()> {
        self.throttles.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn record_coalesced_nudge(&self) -> MetricsResult<()> {
        self.coalesced_nudges.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn record_dropped_job(&self) -> MetricsResult<()> {
        self.dropped_jobs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn record_canary_run(&self) -> MetricsResult<()> {
        self.canary_runs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn cycles(&self) -> usize {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn backoffs(&self) -> usize {
        self.backoffs.load(Ordering::Relaxed)
    }

    pub fn throttles(&self) -> usize {
        self.throttles.load(Ordering::Relaxed)
    }

    pub fn coalesced_nudges(&self) -> usize {
        self.coalesced_nudges.load(Ordering::Relaxed)
    }

    pub fn dropped_jobs(&self) -> usize {
        self.dropped_jobs.load(Ordering::Relaxed)
    }

    pub fn canary_runs(&self) -> usize {
        self.canary_runs.load(Ordering::Relaxed)
    }

    /// Median cycle duration in milliseconds.
    ///
    /// Returns `MetricsError::EmptyData` if no cycle has been recorded.
    pub fn p50_cycle_ms(&self) -> MetricsResult<u64> {
        self.percentile(0.50, "P50")
    }

    /// P95 cycle duration in milliseconds.
    pub fn p95_cycle_ms(&self) -> MetricsResult<u64> {
        self.percentile(0.95, "P95")
    }

    fn percentile(&self, percentile: f64, metric: &'static str) -> MetricsResult<u64> {
        let samples = self.cycle_durations.lock().unwrap_or_else(PoisonError::into_inner);
        if samples.is_empty() {
            return Err(MetricsError::EmptyData { metric });
        }

        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let index = ((sorted.len() as f64 * percentile).ceil() as usize).saturating_sub(1);
        Ok(sorted[index.min(sorted.len() - 1)])
    }
}

/// Logs a failed metric write instead of propagating it.
pub fn log_metric(result: MetricsResult<()>, metric: &'static str) {
    if let Err(err) = result {
        warn!(metric = metric, error = ?err, "Failed to record scheduler metric");
    }
}
