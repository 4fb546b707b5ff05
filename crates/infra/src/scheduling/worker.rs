//! Scheduler worker task
//!
//! The worker owns every piece of scheduling state and is the only code that
//! touches it. Commands from the handle, timer firings and self-posted
//! continuations all arrive on one unbounded channel and are processed in
//! order. A cycle is awaited inline, so anything arriving meanwhile waits in
//! the channel until the completion handler has finished.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cadence_common::{BackoffCause, BackoffPolicy, Clock, TokioClock};
use cadence_core::{
    classify_cycle, decide_on_job, ConfigurationParams, CycleOutcome, DecisionContext, Job,
    JobDecision, JobKind, JobPriority, SyncSession, SyncSessionContext, Syncer,
};
use cadence_domain::{
    deadline_after, payload_map_from_types, EventCause, ModelType, ModelTypePayloadMap,
    ModelTypeSet, NudgeSource, SchedulerMode, ServerConnectionCode, SyncCycleSnapshot,
    SyncEngineEvent, SyncProtocolErrorType, SyncSourceInfo, UpdatesSource, WaitInterval, WaitMode,
};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use crate::observability::{log_metric, SchedulerMetrics};
use crate::scheduling::error::{SchedulerError, SchedulerResult};
use crate::scheduling::sync_scheduler::{RunState, SchedulerStatus};
use crate::scheduling::timers::{StopSignal, TimerKind, Timers};

pub(crate) type StopCallback = Box<dyn FnOnce() + Send + 'static>;

/// Messages processed by the worker, in arrival order.
pub(crate) enum Command {
    Start { mode: SchedulerMode, reply: oneshot::Sender<()> },
    Nudge { delay: Duration, source: NudgeSource, payloads: ModelTypePayloadMap, origin: String },
    Configure { params: ConfigurationParams, reply: oneshot::Sender<SchedulerResult<bool>> },
    Stop { callback: StopCallback },
    CredentialsUpdated,
    ConnectionStatusChanged,
    NotificationsEnabled(bool),
    ShortPollInterval(Duration),
    LongPollInterval(Duration),
    SessionsCommitDelay(Duration),
    SilencedUntil(Instant),
    TypesThrottled { types: ModelTypeSet, until: Instant },
    /// A protocol error reported outside a cycle, with the caller's snapshot.
    ProtocolError(Box<SyncCycleSnapshot>),
    Status { reply: oneshot::Sender<SchedulerStatus> },
    TimerFired { kind: TimerKind, generation: u64 },
    /// Re-evaluate the pending job of the current mode.
    RunPending,
    Shutdown,
}

/// Poll and commit settings that the server may change at runtime.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Intervals {
    pub(crate) short_poll: Duration,
    pub(crate) long_poll: Duration,
    pub(crate) sessions_commit_delay: Duration,
}

pub(crate) struct Worker {
    context: Arc<SyncSessionContext>,
    syncer: Arc<dyn Syncer>,
    policy: BackoffPolicy,
    clock: TokioClock,
    metrics: Arc<SchedulerMetrics>,
    stop: Arc<StopSignal>,
    commands: UnboundedSender<Command>,
    timers: Timers,

    run_state: RunState,
    started_once: bool,
    intervals: Intervals,
    current_poll_interval: Option<Duration>,

    wait_interval: Option<WaitInterval>,
    consecutive_failures: u32,
    last_backoff: Option<Duration>,

    pending_nudge: Option<Job>,
    pending_config: Option<Job>,
    /// Types split off a nudge because the server throttled them.
    throttled_nudge: Option<Job>,

    nudge_times: BTreeMap<ModelType, Instant>,
    last_snapshot: SyncCycleSnapshot,
}

impl Worker {
    pub(crate) fn new(
        context: Arc<SyncSessionContext>,
        syncer: Arc<dyn Syncer>,
        policy: BackoffPolicy,
        intervals: Intervals,
        metrics: Arc<SchedulerMetrics>,
        stop: Arc<StopSignal>,
        commands: UnboundedSender<Command>,
    ) -> Self {
        Self {
            context,
            syncer,
            policy,
            clock: TokioClock::new(),
            metrics,
            stop,
            commands,
            timers: Timers::default(),
            run_state: RunState::Stopped,
            started_once: false,
            intervals,
            current_poll_interval: None,
            wait_interval: None,
            consecutive_failures: 0,
            last_backoff: None,
            pending_nudge: None,
            pending_config: None,
            throttled_nudge: None,
            nudge_times: BTreeMap::new(),
            last_snapshot: SyncCycleSnapshot::default(),
        }
    }

    pub(crate) async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        debug!("scheduler worker started");
        while let Some(command) = commands.recv().await {
            if matches!(command, Command::Shutdown) {
                break;
            }
            self.handle(command).await;
        }
        self.timers.cancel_all();
        debug!("scheduler worker exited");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Start { mode, reply } => {
                self.start(mode);
                if reply.send(()).is_err() {
                    trace!("start caller went away");
                }
            },
            Command::Nudge { delay, source, payloads, origin } => {
                self.schedule_nudge(delay, source, payloads, origin);
            },
            Command::Configure { params, reply } => {
                let result = self.schedule_configuration(params).await;
                if reply.send(result).is_err() {
                    trace!("configuration caller went away");
                }
            },
            Command::Stop { callback } => {
                self.stop();
                callback();
            },
            Command::CredentialsUpdated => {
                let status = self.context.connection().server_status();
                if status == ServerConnectionCode::SyncAuthError {
                    self.try_canary_job().await;
                }
            },
            Command::ConnectionStatusChanged => {
                if self.context.connection().server_status()
                    == ServerConnectionCode::ConnectionUnavailable
                {
                    self.try_canary_job().await;
                }
            },
            Command::NotificationsEnabled(enabled) => {
                self.context.set_notifications_enabled(enabled);
                self.adjust_polling(false);
            },
            Command::ShortPollInterval(interval) => {
                if let Some(interval) = non_zero(interval, "short poll interval") {
                    self.intervals.short_poll = interval;
                }
            },
            Command::LongPollInterval(interval) => {
                if let Some(interval) = non_zero(interval, "long poll interval") {
                    self.intervals.long_poll = interval;
                }
            },
            Command::SessionsCommitDelay(delay) => self.intervals.sessions_commit_delay = delay,
            Command::SilencedUntil(until) => {
                let now = self.clock.now();
                if until <= now {
                    debug!("silence deadline already passed; ignoring");
                } else if self.accepting_work() {
                    self.enter_throttle(Some(until.duration_since(now)), now);
                }
            },
            Command::TypesThrottled { types, until } => self.throttle_types(&types, until),
            Command::ProtocolError(snapshot) => self.on_sync_protocol_error(&snapshot),
            Command::Status { reply } => {
                if reply.send(self.status()).is_err() {
                    trace!("status caller went away");
                }
            },
            Command::TimerFired { kind, generation } => {
                if self.timers.accept(kind, generation) {
                    self.on_timer(kind).await;
                } else {
                    trace!(?kind, generation, "ignoring stale timer");
                }
            },
            Command::RunPending => self.do_pending_job(JobPriority::Normal).await,
            Command::Shutdown => {},
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    fn start(&mut self, mode: SchedulerMode) {
        let previous = self.run_state;
        self.stop.clear();
        self.run_state = RunState::Running(mode);

        if previous == RunState::Disabled {
            self.wait_interval = None;
            self.consecutive_failures = 0;
            self.last_backoff = None;
        }
        if mode == SchedulerMode::Normal && self.pending_config.take().is_some() {
            debug!("dropping configuration job on switch to normal mode");
            log_metric(self.metrics.record_dropped_job(), "scheduler.job.dropped");
        }
        info!(%mode, ?previous, "scheduler started");

        if !self.started_once {
            self.started_once = true;
            self.last_snapshot = self.context.initial_snapshot();
            self.notify(EventCause::StatusChanged);
        }

        self.adjust_polling(false);

        if mode == SchedulerMode::Normal && previous != RunState::Running(SchedulerMode::Normal) {
            self.post(Command::RunPending);
        }
    }

    fn stop(&mut self) {
        self.timers.cancel_all();
        self.pending_nudge = None;
        self.pending_config = None;
        self.throttled_nudge = None;
        self.wait_interval = None;
        self.consecutive_failures = 0;
        self.last_backoff = None;
        self.current_poll_interval = None;
        self.run_state = RunState::Stopped;
        info!("scheduler stopped");
    }

    fn disable(&mut self) {
        self.timers.cancel_all();
        self.pending_nudge = None;
        self.pending_config = None;
        self.throttled_nudge = None;
        self.wait_interval = None;
        self.current_poll_interval = None;
        self.run_state = RunState::Disabled;
        warn!("server requested permanent stop; scheduler disabled");
        self.notify(EventCause::StopSyncingPermanently);
    }

    fn accepting_work(&self) -> bool {
        matches!(self.run_state, RunState::Running(_)) && !self.stop.is_stopping()
    }

    const fn mode(&self) -> Option<SchedulerMode> {
        match self.run_state {
            RunState::Running(mode) => Some(mode),
            RunState::Stopped | RunState::Disabled => None,
        }
    }

    // ------------------------------------------------------------------
    // Job intake
    // ------------------------------------------------------------------

    fn schedule_nudge(
        &mut self,
        delay: Duration,
        source: NudgeSource,
        payloads: ModelTypePayloadMap,
        origin: String,
    ) {
        if !self.accepting_work() {
            debug!(%source, origin, "dropping nudge; scheduler not running");
            log_metric(self.metrics.record_dropped_job(), "scheduler.job.dropped");
            return;
        }

        let now = self.clock.now();
        if source == NudgeSource::Local {
            for ty in payloads.keys() {
                self.nudge_times.insert(*ty, now);
            }
        }

        let start = deadline_after(now, delay);
        let mut job = Job::nudge(SyncSourceInfo::new(source.into(), payloads), start, now, origin);
        self.split_throttled_types(&mut job);

        let decision = self.decide(&job);
        debug!(job = %job.id(), %decision, delay_ms = delay.as_millis() as u64, "nudge scheduled");
        if decision == JobDecision::Drop {
            log_metric(self.metrics.record_dropped_job(), "scheduler.job.dropped");
            return;
        }

        let start = match self.pending_nudge.as_mut() {
            Some(pending) => {
                pending.coalesce(&job, decision == JobDecision::Continue);
                log_metric(self.metrics.record_coalesced_nudge(), "scheduler.nudge.coalesced");
                pending.scheduled_start()
            },
            None => {
                let start = job.scheduled_start();
                self.pending_nudge = Some(job);
                start
            },
        };

        if decision == JobDecision::Save {
            return;
        }
        self.timers.arm(TimerKind::Nudge, start.saturating_duration_since(now), &self.commands);
    }

    async fn schedule_configuration(
        &mut self,
        params: ConfigurationParams,
    ) -> SchedulerResult<bool> {
        match self.run_state {
            RunState::Running(SchedulerMode::Configuration) if !self.stop.is_stopping() => {},
            RunState::Running(SchedulerMode::Normal) if !self.stop.is_stopping() => {
                return Err(SchedulerError::WrongMode { expected: "configuration" });
            },
            _ => return Err(SchedulerError::NotStarted),
        }

        let mut job = Job::configuration(params, self.clock.now(), "configure");
        if job.requested_types().is_empty() {
            debug!("configuration with no types to download completes immediately");
            job.run_ready_task();
            return Ok(true);
        }

        if let Some(superseded) = self.pending_config.take() {
            debug!(job = %superseded.id(), "dropping superseded configuration job");
            log_metric(self.metrics.record_dropped_job(), "scheduler.job.dropped");
        }

        match self.decide(&job) {
            JobDecision::Continue => Ok(self.run_job(job).await),
            JobDecision::Save => {
                self.pending_config = Some(job);
                Ok(false)
            },
            JobDecision::Drop => Ok(false),
        }
    }

    fn decide(&self, job: &Job) -> JobDecision {
        let throttled = {
            let mut tracker = self.context.throttled_types();
            tracker.prune_unthrottled_types(self.clock.now());
            tracker.throttled_types()
        };
        let ctx = DecisionContext {
            mode: self.mode().unwrap_or(SchedulerMode::Normal),
            wait_interval: self.wait_interval.as_ref(),
            has_invalid_auth_token: self.context.connection().has_invalid_auth_token(),
            throttled_types: &throttled,
            current_config_job: self.pending_config.as_ref().map(Job::id),
        };
        decide_on_job(job, &ctx)
    }

    /// Moves server-throttled types out of a partially throttled nudge.
    fn split_throttled_types(&mut self, job: &mut Job) {
        if job.kind() != JobKind::Nudge {
            return;
        }
        let throttled = {
            let mut tracker = self.context.throttled_types();
            tracker.prune_unthrottled_types(self.clock.now());
            tracker.throttled_types()
        };
        let requested = job.requested_types();
        let overlap: ModelTypeSet = requested.intersection(&throttled).copied().collect();
        if overlap.is_empty() || overlap == requested {
            return;
        }

        if let Some(saved) = job.split_off_types(&overlap) {
            debug!(types = ?overlap, "holding throttled types back");
            match self.throttled_nudge.as_mut() {
                Some(held) => held.coalesce(&saved, true),
                None => self.throttled_nudge = Some(saved),
            }
        }
    }

    /// Keeps a job that could not run for a later attempt.
    fn save_job(&mut self, mut job: Job) {
        job.set_priority(JobPriority::Normal);
        match job.kind() {
            JobKind::Nudge => {
                if let Some(newer) = self.pending_nudge.take() {
                    job.coalesce(&newer, true);
                }
                self.pending_nudge = Some(job);
            },
            JobKind::Configuration => {
                let configuring = self.mode() == Some(SchedulerMode::Configuration);
                if self.pending_config.is_none() && configuring {
                    self.pending_config = Some(job);
                } else {
                    log_metric(self.metrics.record_dropped_job(), "scheduler.job.dropped");
                }
            },
            JobKind::Poll => {
                trace!("poll jobs are not saved; the poll timer re-issues them");
            },
        }
    }

    async fn try_canary_job(&mut self) {
        if self.wait_interval.as_ref().is_some_and(WaitInterval::is_throttled) {
            debug!("ignoring canary trigger while throttled");
            return;
        }
        self.do_pending_job(JobPriority::Canary).await;
    }

    async fn do_pending_job(&mut self, priority: JobPriority) {
        if !self.accepting_work() {
            return;
        }
        let job = match self.mode() {
            Some(SchedulerMode::Configuration) => self.pending_config.take(),
            Some(SchedulerMode::Normal) => self.pending_nudge.take(),
            None => None,
        };
        let Some(mut job) = job else {
            return;
        };

        if job.kind() == JobKind::Nudge {
            self.timers.cancel(TimerKind::Nudge);
        }
        job.set_priority(priority);
        if priority == JobPriority::Canary {
            log_metric(self.metrics.record_canary_run(), "scheduler.job.canary");
        }
        self.run_candidate(job).await;
    }

    /// Decides `job` again and runs, saves or drops it.
    async fn run_candidate(&mut self, mut job: Job) {
        if !self.accepting_work() {
            return;
        }
        self.split_throttled_types(&mut job);
        match self.decide(&job) {
            JobDecision::Continue => {
                self.run_job(job).await;
            },
            JobDecision::Save => {
                trace!(job = %job.id(), kind = %job.kind(), "job saved");
                self.save_job(job);
            },
            JobDecision::Drop => {
                debug!(job = %job.id(), kind = %job.kind(), "job dropped");
                log_metric(self.metrics.record_dropped_job(), "scheduler.job.dropped");
            },
        }
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    async fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Nudge => {
                if let Some(job) = self.pending_nudge.take() {
                    self.run_candidate(job).await;
                }
            },
            TimerKind::Poll => self.on_poll_timer().await,
            TimerKind::Unblock => self.on_unblock_timer().await,
            TimerKind::Unthrottle => self.on_unthrottle_timer(),
        }
    }

    async fn on_poll_timer(&mut self) {
        self.current_poll_interval = None;
        if !self.accepting_work() {
            return;
        }

        if self.should_poll() {
            let now = self.clock.now();
            let types: ModelTypeSet = self.context.routing_info().keys().copied().collect();
            let payloads = payload_map_from_types(&types, "");
            let source = SyncSourceInfo::new(UpdatesSource::Periodic, payloads);
            self.run_candidate(Job::poll(source, now, "poll timer")).await;
        } else {
            trace!("skipping poll");
        }

        self.adjust_polling(false);
    }

    fn should_poll(&self) -> bool {
        self.wait_interval.is_none()
            && self.mode() == Some(SchedulerMode::Normal)
            && !self.context.connection().has_invalid_auth_token()
    }

    async fn on_unblock_timer(&mut self) {
        let Some(interval) = self.wait_interval.take() else {
            return;
        };
        debug!(mode = %interval.mode, "wait interval ended; trying canary");
        self.notify_retry_time(None);
        self.do_pending_job(JobPriority::Canary).await;
    }

    fn on_unthrottle_timer(&mut self) {
        let now = self.clock.now();
        let remaining = {
            let mut tracker = self.context.throttled_types();
            tracker.prune_unthrottled_types(now);
            tracker.next_unthrottle_time()
        };

        if let Some(held) = self.throttled_nudge.take() {
            self.save_job(held);
        }
        if let Some(next) = remaining {
            let delay = next.saturating_duration_since(now);
            self.timers.arm(TimerKind::Unthrottle, delay, &self.commands);
        }
        if self.pending_nudge.is_some() {
            self.post(Command::RunPending);
        }
    }

    /// Re-arms the poll timer when the interval changed, the timer is idle,
    /// or `force_reset` is set.
    fn adjust_polling(&mut self, force_reset: bool) {
        if self.mode().is_none() {
            return;
        }
        let interval = if self.context.notifications_enabled() {
            self.intervals.long_poll
        } else {
            self.intervals.short_poll
        };
        let changed = self.current_poll_interval != Some(interval)
            || !self.timers.is_armed(TimerKind::Poll);
        if changed || force_reset {
            trace!(interval_secs = interval.as_secs(), "arming poll timer");
            self.current_poll_interval = Some(interval);
            self.timers.arm(TimerKind::Poll, interval, &self.commands);
        }
    }

    // ------------------------------------------------------------------
    // Cycle execution
    // ------------------------------------------------------------------

    /// Runs one cycle for `job`; true when the job is fully done.
    async fn run_job(&mut self, job: Job) -> bool {
        if let Some(params) = job.config_params() {
            self.context.set_routing_info(params.routing_info.clone());
        }

        let token = self.stop.begin_cycle();
        let mut session = SyncSession::new(Arc::clone(&self.context), job.source().clone(), token);
        debug!(
            job = %job.id(),
            kind = %job.kind(),
            priority = %job.priority(),
            origin = job.origin(),
            "running sync cycle"
        );

        let started = self.clock.now();
        let (start, end) = (job.start_step(), job.end_step());
        let completed = self.syncer.sync_share(&mut session, start, end).await;
        self.stop.end_cycle();
        log_metric(
            self.metrics.record_cycle(self.clock.now().saturating_duration_since(started)),
            "scheduler.cycle.duration",
        );

        self.finish_sync_session_job(job, &session, completed)
    }

    fn finish_sync_session_job(
        &mut self,
        mut job: Job,
        session: &SyncSession,
        completed: bool,
    ) -> bool {
        let now = self.clock.now();
        self.apply_directives(session);

        let outcome = classify_cycle(completed, session);
        let stopping = !self.accepting_work();
        let retry_scheduled = !stopping
            && match &outcome {
                CycleOutcome::Success { .. } | CycleOutcome::StopPermanently => false,
                CycleOutcome::Throttled { .. } | CycleOutcome::MigrationRequired { .. } => true,
                CycleOutcome::Transient { .. } | CycleOutcome::ExitedPrematurely => {
                    job.kind() != JobKind::Poll
                },
            };

        let silenced = matches!(outcome, CycleOutcome::Throttled { .. });
        self.last_snapshot = session.take_snapshot(silenced, retry_scheduled);
        if session.status().dirty().take() {
            self.notify(EventCause::SyncCycleEnded);
        }
        let protocol_error = &session.status().errors().sync_protocol_error;
        let migrated = matches!(outcome, CycleOutcome::MigrationRequired { .. });
        if protocol_error.is_actionable() || migrated {
            self.notify(EventCause::ActionableError);
        }

        if stopping {
            debug!(job = %job.id(), ?outcome, "stop requested; not rescheduling");
            return false;
        }
        debug!(job = %job.id(), ?outcome, "sync cycle finished");

        match outcome {
            CycleOutcome::StopPermanently => {
                self.disable();
                false
            },
            CycleOutcome::Throttled { until } => {
                self.enter_throttle(until.map(|u| u.saturating_duration_since(now)), now);
                self.save_job(job);
                false
            },
            CycleOutcome::MigrationRequired { types } => {
                info!(?types, "server migrated types; downloading them again");
                self.save_job(job);
                self.queue_migration(&types, now);
                self.handle_continuation_error(BackoffCause::MigrationDone, now);
                false
            },
            CycleOutcome::Transient { cause } => self.on_cycle_failed(job, cause, now),
            CycleOutcome::ExitedPrematurely => self.on_cycle_failed(job, BackoffCause::Other, now),
            CycleOutcome::Success { has_more_to_sync } => {
                self.clear_wait_interval();
                self.adjust_polling(true);
                if !has_more_to_sync {
                    job.run_ready_task();
                    return true;
                }

                debug!(kind = %job.kind(), "more to sync; re-issuing");
                match job.kind() {
                    JobKind::Poll => {
                        self.timers.arm(TimerKind::Poll, Duration::ZERO, &self.commands);
                    },
                    JobKind::Nudge | JobKind::Configuration => {
                        job.set_scheduled_start(now);
                        self.save_job(job);
                        self.post(Command::RunPending);
                    },
                }
                false
            },
        }
    }

    fn on_cycle_failed(&mut self, job: Job, cause: BackoffCause, now: Instant) -> bool {
        log_metric(self.metrics.record_failure(), "scheduler.cycle.failure");
        if job.kind() == JobKind::Poll {
            debug!("poll failed; the next poll tick retries");
            return false;
        }
        job.run_retry_task();
        self.save_job(job);
        self.handle_continuation_error(cause, now);
        false
    }

    fn apply_directives(&mut self, session: &SyncSession) {
        let directives = session.directives();
        let short_poll =
            directives.short_poll_interval.and_then(|i| non_zero(i, "short poll interval"));
        if let Some(interval) = short_poll {
            self.intervals.short_poll = interval;
        }
        let long_poll =
            directives.long_poll_interval.and_then(|i| non_zero(i, "long poll interval"));
        if let Some(interval) = long_poll {
            self.intervals.long_poll = interval;
        }
        if let Some(delay) = directives.sessions_commit_delay {
            self.intervals.sessions_commit_delay = delay;
        }
        if let Some((types, until)) = &directives.throttled_types {
            self.throttle_types(types, *until);
        }
    }

    // ------------------------------------------------------------------
    // Wait intervals
    // ------------------------------------------------------------------

    /// Enters or extends exponential backoff.
    fn handle_continuation_error(&mut self, cause: BackoffCause, now: Instant) {
        let length = match self.last_backoff {
            Some(previous) if self.consecutive_failures > 0 => {
                self.policy.next_backoff(previous, self.consecutive_failures)
            },
            _ => self.policy.initial_delay(cause),
        };
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_backoff = Some(length);

        let interval = WaitInterval::new(WaitMode::ExponentialBackoff, length, now);
        self.wait_interval = Some(interval);
        self.timers.arm(TimerKind::Unblock, length, &self.commands);
        log_metric(self.metrics.record_backoff(), "scheduler.backoff");
        info!(
            ?cause,
            length_ms = length.as_millis() as u64,
            failures = self.consecutive_failures,
            "backing off"
        );
        self.notify_retry_time(Some(interval.unblock_at));
    }

    /// Enters a server throttle, replacing any backoff.
    fn enter_throttle(&mut self, hint: Option<Duration>, now: Instant) {
        let length = self.policy.throttle_length(hint);
        let interval = WaitInterval::new(WaitMode::Throttled, length, now);
        self.wait_interval = Some(interval);
        self.timers.arm(TimerKind::Unblock, length, &self.commands);
        log_metric(self.metrics.record_throttle(), "scheduler.throttle");
        info!(length_secs = length.as_secs(), "throttled by server");
        self.notify_retry_time(Some(interval.unblock_at));
    }

    fn clear_wait_interval(&mut self) {
        self.consecutive_failures = 0;
        self.last_backoff = None;
        if let Some(interval) = self.wait_interval.take() {
            debug!(mode = %interval.mode, "wait interval cleared after success");
            self.timers.cancel(TimerKind::Unblock);
            self.notify_retry_time(None);
        }
    }

    fn throttle_types(&mut self, types: &ModelTypeSet, until: Instant) {
        if types.is_empty() {
            return;
        }
        let now = self.clock.now();
        let next = {
            let mut tracker = self.context.throttled_types();
            tracker.set_unthrottle_time(types, until);
            tracker.prune_unthrottled_types(now);
            tracker.next_unthrottle_time()
        };
        if let Some(next) = next {
            let delay = next.saturating_duration_since(now);
            self.timers.arm(TimerKind::Unthrottle, delay, &self.commands);
        }
    }

    fn queue_migration(&mut self, types: &ModelTypeSet, now: Instant) {
        if types.is_empty() || self.mode() != Some(SchedulerMode::Normal) {
            return;
        }
        let payloads = payload_map_from_types(types, "");
        let source = SyncSourceInfo::new(UpdatesSource::Migration, payloads);
        self.save_job(Job::nudge(source, now, now, "migration"));
    }

    fn on_sync_protocol_error(&mut self, snapshot: &SyncCycleSnapshot) {
        if !self.accepting_work() {
            return;
        }
        let now = self.clock.now();
        let error = &snapshot.errors.sync_protocol_error;
        if error.is_actionable() {
            self.notify_with(EventCause::ActionableError, snapshot.clone());
        }
        if error.is_permanent() {
            self.disable();
            return;
        }
        match error.error_type {
            SyncProtocolErrorType::Throttled => self.enter_throttle(None, now),
            SyncProtocolErrorType::MigrationDone => {
                self.queue_migration(&error.error_data_types, now);
                self.handle_continuation_error(BackoffCause::MigrationDone, now);
            },
            SyncProtocolErrorType::TransientError => {
                self.handle_continuation_error(BackoffCause::Other, now);
            },
            _ => {
                trace!(error_type = %error.error_type, "protocol error needs no scheduling change");
            },
        }
    }

    // ------------------------------------------------------------------
    // Events and diagnostics
    // ------------------------------------------------------------------

    fn notify(&self, cause: EventCause) {
        self.notify_with(cause, self.last_snapshot.clone());
    }

    fn notify_with(&self, cause: EventCause, snapshot: SyncCycleSnapshot) {
        trace!(%cause, "notifying listeners");
        self.context.listeners().notify(&SyncEngineEvent::new(cause, snapshot));
    }

    fn notify_retry_time(&self, at: Option<Instant>) {
        let retry_time = at.map(|deadline| self.wall_time(deadline));
        self.context.listeners().notify(&SyncEngineEvent::retry_time_changed(retry_time));
    }

    fn wall_time(&self, deadline: Instant) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.clock.system_time_at(deadline))
    }

    fn is_silenced(&self, now: Instant) -> bool {
        self.wait_interval
            .as_ref()
            .is_some_and(|interval| interval.is_throttled() && now < interval.unblock_at)
    }

    fn post(&self, command: Command) {
        if self.commands.send(command).is_err() {
            trace!("worker channel closed");
        }
    }

    fn status(&self) -> SchedulerStatus {
        let now = self.clock.now();
        SchedulerStatus {
            run_state: self.run_state,
            wait_mode: self.wait_interval.map(|interval| interval.mode),
            wait_remaining: self.wait_interval.map(|interval| interval.remaining(now)),
            consecutive_failures: self.consecutive_failures,
            pending_nudge_types: self.pending_nudge.as_ref().map(Job::requested_types),
            pending_configuration: self.pending_config.is_some(),
            throttled_types: self.context.throttled_types().throttled_types(),
            held_throttled_types: self
                .throttled_nudge
                .as_ref()
                .map(Job::requested_types)
                .unwrap_or_default(),
            short_poll_interval: self.intervals.short_poll,
            long_poll_interval: self.intervals.long_poll,
            current_poll_interval: self.current_poll_interval,
            sessions_commit_delay: self.intervals.sessions_commit_delay,
            notifications_enabled: self.context.notifications_enabled(),
            is_silenced: self.is_silenced(now),
            nudge_times: self
                .nudge_times
                .iter()
                .map(|(ty, at)| (*ty, self.wall_time(*at)))
                .collect(),
            last_snapshot: self.last_snapshot.clone(),
        }
    }
}

fn non_zero(value: Duration, what: &'static str) -> Option<Duration> {
    if value.is_zero() {
        warn!(what, "ignoring zero interval");
        None
    } else {
        Some(value)
    }
}
