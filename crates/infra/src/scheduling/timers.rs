//! Timer slots and the stop signal shared with the handle

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cadence_common::{schedule_once, TimerHandle};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::scheduling::worker::Command;

/// The scheduler's suspension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum TimerKind {
    /// Deferred run of the pending nudge.
    Nudge,
    /// Periodic poll.
    Poll,
    /// End of a backoff or throttle wait interval.
    Unblock,
    /// End of the earliest per-type throttle.
    Unthrottle,
}

/// One armed timer per kind.
///
/// Firing posts a [`Command::TimerFired`] tagged with the generation it was
/// armed with; re-arming or cancelling a slot makes older firings stale.
#[derive(Debug, Default)]
pub(crate) struct Timers {
    slots: BTreeMap<TimerKind, (u64, TimerHandle)>,
    generation: u64,
}

impl Timers {
    pub(crate) fn arm(
        &mut self,
        kind: TimerKind,
        delay: Duration,
        commands: &UnboundedSender<Command>,
    ) {
        self.cancel(kind);
        self.generation += 1;
        let generation = self.generation;
        let commands = commands.clone();
        let handle = schedule_once(delay, async move {
            if commands.send(Command::TimerFired { kind, generation }).is_err() {
                trace!(?kind, "timer fired after worker exit");
            }
        });
        self.slots.insert(kind, (generation, handle));
    }

    pub(crate) fn cancel(&mut self, kind: TimerKind) {
        if let Some((_, handle)) = self.slots.remove(&kind) {
            handle.cancel();
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        for (_, (_, handle)) in std::mem::take(&mut self.slots) {
            handle.cancel();
        }
    }

    /// Consumes the slot if `generation` is the one currently armed.
    pub(crate) fn accept(&mut self, kind: TimerKind, generation: u64) -> bool {
        match self.slots.get(&kind) {
            Some((current, _)) if *current == generation => {
                self.slots.remove(&kind);
                true
            },
            _ => false,
        }
    }

    pub(crate) fn is_armed(&self, kind: TimerKind) -> bool {
        self.slots.contains_key(&kind)
    }

    #[cfg(test)]
    pub(crate) fn armed(&self) -> Vec<TimerKind> {
        self.slots.keys().copied().collect()
    }
}

/// Stop state visible to both the handle and the worker.
///
/// `request` runs on the caller's thread, so an in-flight cycle is told to
/// exit early before the stop command reaches the worker.
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    stopping: AtomicBool,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl StopSignal {
    pub(crate) fn request(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.request_early_exit();
    }

    pub(crate) fn clear(&self) {
        self.stopping.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Token for a new cycle; already cancelled if a stop is pending.
    pub(crate) fn begin_cycle(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut in_flight = self.in_flight.lock();
        if self.is_stopping() {
            token.cancel();
        }
        *in_flight = Some(token.clone());
        token
    }

    pub(crate) fn end_cycle(&self) {
        *self.in_flight.lock() = None;
    }

    pub(crate) fn request_early_exit(&self) {
        if let Some(token) = self.in_flight.lock().as_ref() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rearming_makes_old_generation_stale() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = Timers::default();

        timers.arm(TimerKind::Nudge, Duration::from_secs(1), &tx);
        timers.arm(TimerKind::Nudge, Duration::from_secs(2), &tx);
        tokio::time::sleep(Duration::from_secs(3)).await;

        let Some(Command::TimerFired { kind, generation }) = rx.recv().await else {
            panic!("expected a timer firing");
        };
        assert_eq!(kind, TimerKind::Nudge);
        assert!(timers.accept(kind, generation));
        assert!(!timers.is_armed(TimerKind::Nudge));
        assert!(rx.try_recv().is_err(), "cancelled timer must not fire");
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = Timers::default();
        timers.arm(TimerKind::Poll, Duration::from_secs(60), &tx);

        assert!(!timers.accept(TimerKind::Poll, 0));
        assert!(timers.is_armed(TimerKind::Poll));
        timers.cancel_all();
        assert!(timers.armed().is_empty());
    }

    #[test]
    fn stop_cancels_in_flight_cycle() {
        let signal = StopSignal::default();
        let token = signal.begin_cycle();
        assert!(!token.is_cancelled());

        signal.request();
        assert!(token.is_cancelled());
        assert!(signal.is_stopping());

        signal.end_cycle();
        signal.clear();
        assert!(!signal.begin_cycle().is_cancelled());
    }

    #[test]
    fn cycle_started_while_stopping_is_cancelled() {
        let signal = StopSignal::default();
        signal.request();
        assert!(signal.begin_cycle().is_cancelled());
    }
}
