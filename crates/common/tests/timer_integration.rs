//! Integration tests for timers and the tokio-aware clock.
#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cadence_common::{schedule_once, Clock, TokioClock};

/// Validates that a replaced timer only lets the newest one fire.
#[tokio::test(start_paused = true)]
async fn rearming_cancels_previous_timer() {
    let fired = Arc::new(AtomicUsize::new(0));

    let first = {
        let fired = Arc::clone(&fired);
        schedule_once(Duration::from_secs(5), async move {
            fired.fetch_add(1, Ordering::SeqCst);
        })
    };
    first.cancel();
    let second = {
        let fired = Arc::clone(&fired);
        schedule_once(Duration::from_secs(7), async move {
            fired.fetch_add(10, Ordering::SeqCst);
        })
    };

    tokio::time::sleep(Duration::from_secs(8)).await;

    assert_eq!(fired.load(Ordering::SeqCst), 10);
    assert!(first.is_cancelled());
    assert!(second.has_fired());
}

/// Validates that deadlines read from `TokioClock` line up with timer firing.
#[tokio::test(start_paused = true)]
async fn clock_deadline_matches_timer() {
    let clock = TokioClock::new();
    let deadline = clock.now() + Duration::from_secs(3);
    let observed = Arc::new(AtomicUsize::new(0));

    let slot = Arc::clone(&observed);
    let _handle = schedule_once(Duration::from_secs(3), async move {
        slot.fetch_add(1, Ordering::SeqCst);
    });

    tokio::time::sleep(Duration::from_secs(4)).await;

    assert!(clock.now() >= deadline);
    assert_eq!(observed.load(Ordering::SeqCst), 1);
}
