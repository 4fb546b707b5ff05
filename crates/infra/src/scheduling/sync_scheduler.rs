//! Public handle of the sync scheduler.
//!
//! Owns the worker task and turns every public call into a command for it.
//! Calls never block on a running cycle except where a reply is needed
//! (`start`, `schedule_configuration`, `status`, `stop`).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use cadence_core::{ServerConnectionManager, SyncEventListeners, Syncer};
//! use cadence_domain::{Config, ModelType, NudgeSource, SchedulerMode};
//! use cadence_infra::scheduling::SyncScheduler;
//!
//! # async fn example(
//! #     syncer: Arc<dyn Syncer>,
//! #     connection: Arc<dyn ServerConnectionManager>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler =
//!     SyncScheduler::new(&Config::default(), syncer, connection, SyncEventListeners::new())?;
//!
//! scheduler.start(SchedulerMode::Normal).await?;
//! scheduler.schedule_nudge(
//!     Duration::from_millis(200),
//!     NudgeSource::Local,
//!     &[ModelType::Bookmarks].into_iter().collect(),
//!     "bookmark edited",
//! )?;
//! // ... application runs ...
//! scheduler.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cadence_common::{BackoffPolicy, CommonError};
use cadence_core::{
    ConfigurationParams, ServerConnectionManager, SyncEventListeners, SyncSessionContext, Syncer,
};
use cadence_domain::{
    payload_map_from_types, CadenceError, Config, ModelType, ModelTypePayloadMap, ModelTypeSet,
    NudgeSource, SchedulerMode, SyncCycleSnapshot, WaitMode,
};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::observability::SchedulerMetrics;
use crate::scheduling::error::{SchedulerError, SchedulerResult};
use crate::scheduling::timers::StopSignal;
use crate::scheduling::worker::{Command, Intervals, Worker};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Lifecycle state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Not started, or stopped by the caller.
    Stopped,
    Running(SchedulerMode),
    /// The server asked the client to stop syncing; only `start` leaves
    /// this state.
    Disabled,
}

/// Point-in-time view of the scheduler's state.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub run_state: RunState,
    /// Mode of the active wait interval, if any.
    pub wait_mode: Option<WaitMode>,
    pub wait_remaining: Option<Duration>,
    pub consecutive_failures: u32,
    pub pending_nudge_types: Option<ModelTypeSet>,
    pub pending_configuration: bool,
    /// Types the server currently throttles.
    pub throttled_types: ModelTypeSet,
    /// Nudged types held back until their throttle ends.
    pub held_throttled_types: ModelTypeSet,
    pub short_poll_interval: Duration,
    pub long_poll_interval: Duration,
    /// Interval the poll timer is armed with; `None` while polling is idle.
    pub current_poll_interval: Option<Duration>,
    pub sessions_commit_delay: Duration,
    pub notifications_enabled: bool,
    pub is_silenced: bool,
    /// Last local nudge per type.
    pub nudge_times: BTreeMap<ModelType, DateTime<Utc>>,
    pub last_snapshot: SyncCycleSnapshot,
}

impl SchedulerStatus {
    pub fn is_in_backoff(&self) -> bool {
        self.wait_mode == Some(WaitMode::ExponentialBackoff)
    }
}

/// Decides when sync cycles run and executes them one at a time.
pub struct SyncScheduler {
    commands: UnboundedSender<Command>,
    stop: Arc<StopSignal>,
    metrics: Arc<SchedulerMetrics>,
    stop_timeout: Duration,
    task_handle: TaskHandle,
}

impl SyncScheduler {
    /// Create a scheduler and spawn its worker task.
    ///
    /// Must be called from within a tokio runtime. The scheduler stays idle
    /// until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns `InvalidPolicy` if the backoff settings are inconsistent, and a
    /// configuration error if any other setting fails validation, such as a
    /// zero poll interval.
    pub fn new(
        config: &Config,
        syncer: Arc<dyn Syncer>,
        connection: Arc<dyn ServerConnectionManager>,
        listeners: SyncEventListeners,
    ) -> SchedulerResult<Self> {
        let backoff = &config.backoff;
        let policy = BackoffPolicy::custom(
            Duration::from_secs(backoff.initial_backoff_secs),
            Duration::from_secs(backoff.short_initial_backoff_secs),
            Duration::from_secs(backoff.max_backoff_secs),
        )?
        .with_multiplier(backoff.multiplier)?
        .with_jitter_factor(backoff.jitter)
        .with_max_throttle(Duration::from_secs(backoff.max_throttle_secs));
        config.validate().map_err(|err| match err {
            CadenceError::Config(message) => CommonError::config(message),
            other => CommonError::config(other.to_string()),
        })?;

        let context = Arc::new(SyncSessionContext::new(connection, listeners));
        context.set_notifications_enabled(config.scheduler.notifications_enabled);

        let intervals = Intervals {
            short_poll: config.scheduler.short_poll_interval(),
            long_poll: config.scheduler.long_poll_interval(),
            sessions_commit_delay: config.scheduler.sessions_commit_delay(),
        };

        let metrics = Arc::new(SchedulerMetrics::new());
        let stop = Arc::new(StopSignal::default());
        let (commands, receiver) = mpsc::unbounded_channel();

        let worker = Worker::new(
            context,
            syncer,
            policy,
            intervals,
            Arc::clone(&metrics),
            Arc::clone(&stop),
            commands.clone(),
        );
        let handle = tokio::spawn(worker.run(receiver));
        debug!("sync scheduler created");

        Ok(Self {
            commands,
            stop,
            metrics,
            stop_timeout: config.scheduler.stop_timeout(),
            task_handle: Arc::new(Mutex::new(Some(handle))),
        })
    }

    /// Start, or switch to, `mode`.
    ///
    /// Entering normal mode runs any pending nudge; entering configuration
    /// mode defers nudges until the next switch back.
    #[instrument(skip(self))]
    pub async fn start(&self, mode: SchedulerMode) -> SchedulerResult<()> {
        let (reply, done) = oneshot::channel();
        self.send(Command::Start { mode, reply })?;
        done.await?;
        info!(%mode, "sync scheduler running");
        Ok(())
    }

    /// Request a cycle for `types` after `delay`.
    ///
    /// Nudges arriving before the pending one runs are merged into it.
    pub fn schedule_nudge(
        &self,
        delay: Duration,
        source: NudgeSource,
        types: &ModelTypeSet,
        origin: &str,
    ) -> SchedulerResult<()> {
        self.schedule_nudge_with_payloads(delay, source, payload_map_from_types(types, ""), origin)
    }

    /// Like [`schedule_nudge`](Self::schedule_nudge) with a payload per type.
    pub fn schedule_nudge_with_payloads(
        &self,
        delay: Duration,
        source: NudgeSource,
        payloads: ModelTypePayloadMap,
        origin: &str,
    ) -> SchedulerResult<()> {
        trace!(%source, origin, "nudge requested");
        self.send(Command::Nudge { delay, source, payloads, origin: origin.to_string() })
    }

    /// Download `params.types_to_download` in configuration mode.
    ///
    /// Returns `true` when the configuration completed in this call and
    /// `false` when it was deferred; a deferred configuration runs its
    /// retry task and completes later through its ready task.
    ///
    /// # Errors
    ///
    /// `WrongMode` outside configuration mode, `NotStarted` before `start`.
    #[instrument(skip(self, params), fields(types = ?params.types_to_download))]
    pub async fn schedule_configuration(
        &self,
        params: ConfigurationParams,
    ) -> SchedulerResult<bool> {
        let (reply, result) = oneshot::channel();
        self.send(Command::Configure { params, reply })?;
        result.await?
    }

    /// Stop asynchronously; `callback` runs once the worker has stopped.
    ///
    /// A cycle already running is asked to exit early and nothing is
    /// scheduled after it.
    pub fn request_stop(&self, callback: impl FnOnce() + Send + 'static) {
        self.stop.request();
        if let Err(mpsc::error::SendError(command)) =
            self.commands.send(Command::Stop { callback: Box::new(callback) })
        {
            warn!("scheduler worker gone; running stop callback directly");
            if let Command::Stop { callback } = command {
                callback();
            }
        }
    }

    /// Stop and wait until the worker has acknowledged it.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> SchedulerResult<()> {
        let (reply, done) = oneshot::channel();
        self.request_stop(move || {
            if reply.send(()).is_err() {
                trace!("stop waiter went away");
            }
        });
        done.await?;
        info!("sync scheduler stopped");
        Ok(())
    }

    /// Canary hook: credentials changed.
    pub fn on_credentials_updated(&self) -> SchedulerResult<()> {
        self.send(Command::CredentialsUpdated)
    }

    /// Canary hook: network connectivity changed.
    pub fn on_connection_status_change(&self) -> SchedulerResult<()> {
        self.send(Command::ConnectionStatusChanged)
    }

    /// With notifications enabled the long poll interval applies.
    pub fn set_notifications_enabled(&self, enabled: bool) -> SchedulerResult<()> {
        self.send(Command::NotificationsEnabled(enabled))
    }

    pub fn on_received_short_poll_interval_update(
        &self,
        interval: Duration,
    ) -> SchedulerResult<()> {
        self.send(Command::ShortPollInterval(interval))
    }

    pub fn on_received_long_poll_interval_update(&self, interval: Duration) -> SchedulerResult<()> {
        self.send(Command::LongPollInterval(interval))
    }

    pub fn on_received_sessions_commit_delay(&self, delay: Duration) -> SchedulerResult<()> {
        self.send(Command::SessionsCommitDelay(delay))
    }

    /// The server silenced this client until `until`.
    pub fn on_silenced_until(&self, until: Instant) -> SchedulerResult<()> {
        self.send(Command::SilencedUntil(until))
    }

    /// The server throttled `types` until `until`.
    pub fn on_types_throttled(&self, types: ModelTypeSet, until: Instant) -> SchedulerResult<()> {
        self.send(Command::TypesThrottled { types, until })
    }

    /// Report a protocol error seen outside a scheduled cycle.
    pub fn on_sync_protocol_error(&self, snapshot: &SyncCycleSnapshot) -> SchedulerResult<()> {
        let error = &snapshot.errors.sync_protocol_error;
        if error.requires_early_exit() {
            debug!(error_type = %error.error_type, "protocol error ends the running cycle");
            self.stop.request_early_exit();
        }
        self.send(Command::ProtocolError(Box::new(snapshot.clone())))
    }

    /// Current scheduler state.
    pub async fn status(&self) -> SchedulerResult<SchedulerStatus> {
        let (reply, status) = oneshot::channel();
        self.send(Command::Status { reply })?;
        Ok(status.await?)
    }

    pub async fn is_syncing_currently_silenced(&self) -> SchedulerResult<bool> {
        Ok(self.status().await?.is_silenced)
    }

    pub async fn sessions_commit_delay(&self) -> SchedulerResult<Duration> {
        Ok(self.status().await?.sessions_commit_delay)
    }

    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    /// Check if the worker task is alive
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Stop and end the worker task.
    ///
    /// # Errors
    ///
    /// `NotRunning` if the worker already exited, `Timeout` if it does not
    /// exit within the configured stop timeout.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> SchedulerResult<()> {
        let Some(handle) = self.task_handle.lock().await.take() else {
            return Err(SchedulerError::NotRunning);
        };

        info!("Shutting down sync scheduler");
        self.request_stop(|| {});
        self.send(Command::Shutdown)?;

        tokio::time::timeout(self.stop_timeout, handle)
            .await
            .map_err(|_| SchedulerError::Timeout { duration: self.stop_timeout })?
            .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;

        if let Ok(p95_ms) = self.metrics.p95_cycle_ms() {
            debug!(p95_ms, cycles = self.metrics.cycles(), "cycle latency at shutdown");
        }
        info!("Sync scheduler shut down");
        Ok(())
    }

    fn send(&self, command: Command) -> SchedulerResult<()> {
        Ok(self.commands.send(command)?)
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("SyncScheduler dropped while running; stopping worker");
            self.stop.request();
            if self.commands.send(Command::Shutdown).is_err() {
                trace!("worker already gone");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_status_helper() {
        let status = SchedulerStatus {
            run_state: RunState::Running(SchedulerMode::Normal),
            wait_mode: Some(WaitMode::ExponentialBackoff),
            wait_remaining: Some(Duration::from_secs(1)),
            consecutive_failures: 1,
            pending_nudge_types: None,
            pending_configuration: false,
            throttled_types: ModelTypeSet::new(),
            held_throttled_types: ModelTypeSet::new(),
            short_poll_interval: Duration::from_secs(60),
            long_poll_interval: Duration::from_secs(3600),
            current_poll_interval: None,
            sessions_commit_delay: Duration::from_secs(10),
            notifications_enabled: false,
            is_silenced: false,
            nudge_times: BTreeMap::new(),
            last_snapshot: SyncCycleSnapshot::default(),
        };
        assert!(status.is_in_backoff());
    }
}
