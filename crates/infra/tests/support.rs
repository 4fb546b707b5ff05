//! Scripted ports for driving the scheduler under paused tokio time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cadence_core::{ServerConnectionManager, SyncEventListeners, SyncSession, Syncer};
use cadence_domain::{
    ClientAction, Config, EventCause, ModelType, ModelTypeSet, ServerConnectionCode,
    SyncCycleSnapshot, SyncEngineEvent, SyncProtocolError, SyncProtocolErrorType, SyncerError,
    SyncerStep, UpdatesSource,
};
use cadence_infra::SyncScheduler;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// What the next cycle does.
#[derive(Debug, Clone)]
pub enum Step {
    Ok,
    /// Succeeds but leaves changes on the server.
    MoreToSync,
    NetworkDown,
    ServerError,
    /// Server silences the client, optionally for a given time.
    Throttled(Option<Duration>),
    /// Server reports the types as migrated.
    Migration(ModelTypeSet),
    /// Server says the client's data is from another birthday.
    NotMyBirthday,
    /// Takes the given time, then succeeds if not told to exit.
    Slow(Duration),
}

/// One recorded syncer invocation.
#[derive(Debug, Clone)]
pub struct Call {
    /// Time since the syncer was created.
    pub at: Duration,
    pub source: UpdatesSource,
    pub types: ModelTypeSet,
    pub start: SyncerStep,
    pub end: SyncerStep,
    /// Whether the session still wanted to continue when the cycle ended.
    pub continued: bool,
}

/// Syncer that replays a script and records every call.
///
/// Once the script runs out every cycle succeeds.
#[derive(Debug)]
pub struct ScriptedSyncer {
    origin: tokio::time::Instant,
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedSyncer {
    pub fn new(script: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            origin: tokio::time::Instant::now(),
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Syncer for ScriptedSyncer {
    async fn sync_share(
        &self,
        session: &mut SyncSession,
        start: SyncerStep,
        end: SyncerStep,
    ) -> bool {
        let at = self.origin.elapsed();
        let step = self.script.lock().pop_front().unwrap_or(Step::Ok);

        let completed = match step {
            Step::Ok => {
                session.status_mut().set_last_download_updates_result(SyncerError::SyncerOk);
                session.status_mut().increment_num_updates_downloaded_by(1);
                true
            },
            Step::MoreToSync => {
                session.status_mut().set_last_download_updates_result(SyncerError::SyncerOk);
                session.status_mut().set_num_server_changes_remaining(10);
                true
            },
            Step::NetworkDown => {
                session
                    .status_mut()
                    .set_last_download_updates_result(SyncerError::NetworkConnectionUnavailable);
                false
            },
            Step::ServerError => {
                session.status_mut().set_last_download_updates_result(SyncerError::SyncServerError);
                false
            },
            Step::Throttled(hint) => {
                if let Some(hint) = hint {
                    let until = tokio::time::Instant::now().into_std() + hint;
                    session.directives_mut().on_silenced_until(until);
                }
                session.on_sync_protocol_error(SyncProtocolError::new(
                    SyncProtocolErrorType::Throttled,
                    ClientAction::UnknownAction,
                ));
                false
            },
            Step::Migration(types) => {
                session.status_mut().set_last_download_updates_result(SyncerError::SyncerOk);
                session.status_mut().set_types_needing_local_migration(types);
                true
            },
            Step::NotMyBirthday => {
                session.on_sync_protocol_error(SyncProtocolError::new(
                    SyncProtocolErrorType::NotMyBirthday,
                    ClientAction::UnknownAction,
                ));
                false
            },
            Step::Slow(duration) => {
                tokio::time::sleep(duration).await;
                session.status_mut().set_last_download_updates_result(SyncerError::SyncerOk);
                session.should_continue()
            },
        };

        self.calls.lock().push(Call {
            at,
            source: session.source().updates_source,
            types: session.source().model_types(),
            start,
            end,
            continued: session.should_continue(),
        });
        completed && session.should_continue()
    }
}

/// Connection whose status the test flips.
#[derive(Debug)]
pub struct FakeConnection {
    status: Mutex<ServerConnectionCode>,
    invalid_auth: AtomicBool,
}

impl FakeConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(ServerConnectionCode::ServerConnectionOk),
            invalid_auth: AtomicBool::new(false),
        })
    }

    pub fn set_status(&self, status: ServerConnectionCode) {
        *self.status.lock() = status;
    }

    pub fn set_invalid_auth(&self, invalid: bool) {
        self.invalid_auth.store(invalid, Ordering::SeqCst);
    }
}

impl ServerConnectionManager for FakeConnection {
    fn server_status(&self) -> ServerConnectionCode {
        *self.status.lock()
    }

    fn has_invalid_auth_token(&self) -> bool {
        self.invalid_auth.load(Ordering::SeqCst)
    }
}

/// Collects every event delivered to the listeners it is attached to.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SyncEngineEvent>>>,
    retry_times: Arc<Mutex<Vec<Option<DateTime<Utc>>>>>,
}

impl EventLog {
    pub fn attach(&self, listeners: &SyncEventListeners) {
        let events = Arc::clone(&self.events);
        listeners.on_state_changed(move |event| events.lock().push(event.clone()));
        let retry_times = Arc::clone(&self.retry_times);
        listeners.on_retry_time_changed(move |event| retry_times.lock().push(event.retry_time));
    }

    pub fn causes(&self) -> Vec<EventCause> {
        self.events.lock().iter().map(|event| event.cause).collect()
    }

    pub fn count(&self, cause: EventCause) -> usize {
        self.events.lock().iter().filter(|event| event.cause == cause).count()
    }

    /// Snapshots delivered with `cause`, oldest first.
    pub fn snapshots(&self, cause: EventCause) -> Vec<SyncCycleSnapshot> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.cause == cause)
            .map(|event| event.snapshot.clone())
            .collect()
    }

    pub fn retry_times(&self) -> Vec<Option<DateTime<Utc>>> {
        self.retry_times.lock().clone()
    }
}

/// A scheduler wired to scripted ports.
pub struct Harness {
    pub scheduler: SyncScheduler,
    pub syncer: Arc<ScriptedSyncer>,
    pub connection: Arc<FakeConnection>,
    pub events: EventLog,
}

impl Harness {
    pub fn new(script: impl IntoIterator<Item = Step>) -> Self {
        Self::with_config(&Config::default(), script)
    }

    /// Every cycle succeeds.
    pub fn idle() -> Self {
        Self::new(std::iter::empty())
    }

    pub fn with_config(config: &Config, script: impl IntoIterator<Item = Step>) -> Self {
        let syncer = ScriptedSyncer::new(script);
        let connection = FakeConnection::new();
        let listeners = SyncEventListeners::new();
        let events = EventLog::default();
        events.attach(&listeners);

        let scheduler = SyncScheduler::new(
            config,
            Arc::clone(&syncer) as Arc<dyn Syncer>,
            Arc::clone(&connection) as Arc<dyn ServerConnectionManager>,
            listeners,
        )
        .expect("scheduler should build from a valid config");

        Self { scheduler, syncer, connection, events }
    }
}

pub fn types(list: &[ModelType]) -> ModelTypeSet {
    list.iter().copied().collect()
}

/// Lets the worker drain its queue while paused time moves by `duration`.
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Asserts `actual` lies within 50ms after `expected`.
pub fn assert_near(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(50),
        "expected about {expected:?}, got {actual:?}"
    );
}

pub fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}

pub fn millis(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Snapshot carrying a server-reported protocol error.
pub fn snapshot_with_error(error: SyncProtocolError) -> SyncCycleSnapshot {
    let mut snapshot = SyncCycleSnapshot::default();
    snapshot.errors.sync_protocol_error = error;
    snapshot
}
