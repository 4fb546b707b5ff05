//! One-shot timers with explicit cancellation

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::sleep;
use tracing::trace;

/// Handle to a pending one-shot timer.
///
/// Cancelling aborts the sleeping task; a timer that already fired is not
/// affected. Dropping the handle does not cancel the timer.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    fired: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl TimerHandle {
    /// Cancel the timer
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.abort.abort();
    }

    /// Check if the timer has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Check if the timer ran its callback
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Neither fired nor cancelled.
    pub fn is_pending(&self) -> bool {
        !self.is_cancelled() && !self.has_fired()
    }
}

/// Runs `on_fire` after `delay` unless the returned handle is cancelled first.
///
/// Must be called from within a tokio runtime.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use cadence_common::time::timer::schedule_once;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = schedule_once(Duration::from_secs(5), async {
///         println!("fired");
///     });
///     handle.cancel();
/// }
/// ```
pub fn schedule_once<F>(delay: Duration, on_fire: F) -> TimerHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let cancelled = Arc::new(AtomicBool::new(false));
    let fired = Arc::new(AtomicBool::new(false));

    let task_cancelled = Arc::clone(&cancelled);
    let task_fired = Arc::clone(&fired);
    let task = tokio::spawn(async move {
        sleep(delay).await;
        if task_cancelled.load(Ordering::SeqCst) {
            return;
        }
        task_fired.store(true, Ordering::SeqCst);
        trace!(delay_ms = delay.as_millis() as u64, "timer fired");
        on_fire.await;
    });

    TimerHandle { cancelled, fired, abort: task.abort_handle() }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = schedule_once(Duration::from_secs(10), async move {
            c.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(handle.is_pending());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(handle.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = schedule_once(Duration::from_secs(1), async move {
            c.fetch_add(1, Ordering::SeqCst);
        });

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(handle.is_cancelled());
        assert!(!handle.has_fired());
    }
}
