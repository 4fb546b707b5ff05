//! Units of pending synchronization work

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use cadence_domain::{
    impl_wire_name_conversions, payload_map_from_types, ModelSafeRoutingInfo, ModelTypeSet,
    SyncSourceInfo, SyncerStep, UpdatesSource,
};
use uuid::Uuid;

/// What a job asks the syncer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Nudge,
    Configuration,
    Poll,
}

impl_wire_name_conversions!(JobKind {
    Nudge => "nudge",
    Configuration => "configuration",
    Poll => "poll",
});

/// How insistently a job asks to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobPriority {
    #[default]
    Normal,
    /// A trial run allowed during exponential backoff.
    Canary,
}

impl_wire_name_conversions!(JobPriority {
    Normal => "normal",
    Canary => "canary",
});

/// Callback run once when a configuration completes.
pub type ReadyTask = Box<dyn FnOnce() + Send + 'static>;

/// Callback run each time a configuration attempt fails and is retried.
pub type RetryTask = Arc<dyn Fn() + Send + Sync + 'static>;

/// Parameters of a configuration request.
pub struct ConfigurationParams {
    pub source: UpdatesSource,
    pub types_to_download: ModelTypeSet,
    pub routing_info: ModelSafeRoutingInfo,
    pub ready_task: Option<ReadyTask>,
    pub retry_task: Option<RetryTask>,
}

impl ConfigurationParams {
    pub fn new(source: UpdatesSource, types_to_download: ModelTypeSet) -> Self {
        Self {
            source,
            types_to_download,
            routing_info: ModelSafeRoutingInfo::new(),
            ready_task: None,
            retry_task: None,
        }
    }

    pub fn with_routing_info(mut self, routing_info: ModelSafeRoutingInfo) -> Self {
        self.routing_info = routing_info;
        self
    }

    pub fn with_ready_task(mut self, task: impl FnOnce() + Send + 'static) -> Self {
        self.ready_task = Some(Box::new(task));
        self
    }

    pub fn with_retry_task(mut self, task: impl Fn() + Send + Sync + 'static) -> Self {
        self.retry_task = Some(Arc::new(task));
        self
    }
}

impl fmt::Debug for ConfigurationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationParams")
            .field("source", &self.source)
            .field("types_to_download", &self.types_to_download)
            .field("routing_info", &self.routing_info)
            .field("ready_task", &self.ready_task.is_some())
            .field("retry_task", &self.retry_task.is_some())
            .finish()
    }
}

/// A pending request for one sync cycle.
#[derive(Debug)]
pub struct Job {
    id: Uuid,
    kind: JobKind,
    priority: JobPriority,
    source: SyncSourceInfo,
    scheduled_start: Instant,
    creation_time: Instant,
    origin: String,
    config_params: Option<ConfigurationParams>,
}

impl Job {
    fn build(
        kind: JobKind,
        source: SyncSourceInfo,
        scheduled_start: Instant,
        now: Instant,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            priority: JobPriority::Normal,
            source,
            scheduled_start,
            creation_time: now,
            origin: origin.into(),
            config_params: None,
        }
    }

    pub fn nudge(
        source: SyncSourceInfo,
        scheduled_start: Instant,
        now: Instant,
        origin: impl Into<String>,
    ) -> Self {
        Self::build(JobKind::Nudge, source, scheduled_start, now, origin)
    }

    pub fn poll(source: SyncSourceInfo, now: Instant, origin: impl Into<String>) -> Self {
        Self::build(JobKind::Poll, source, now, now, origin)
    }

    pub fn configuration(
        params: ConfigurationParams,
        now: Instant,
        origin: impl Into<String>,
    ) -> Self {
        let source = SyncSourceInfo::new(
            params.source,
            payload_map_from_types(&params.types_to_download, ""),
        );
        let mut job = Self::build(JobKind::Configuration, source, now, now, origin);
        job.config_params = Some(params);
        job
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn kind(&self) -> JobKind {
        self.kind
    }

    pub const fn priority(&self) -> JobPriority {
        self.priority
    }

    pub fn set_priority(&mut self, priority: JobPriority) {
        self.priority = priority;
    }

    pub const fn source(&self) -> &SyncSourceInfo {
        &self.source
    }

    pub fn requested_types(&self) -> ModelTypeSet {
        self.source.model_types()
    }

    pub const fn scheduled_start(&self) -> Instant {
        self.scheduled_start
    }

    pub fn set_scheduled_start(&mut self, at: Instant) {
        self.scheduled_start = at;
    }

    pub const fn creation_time(&self) -> Instant {
        self.creation_time
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub const fn config_params(&self) -> Option<&ConfigurationParams> {
        self.config_params.as_ref()
    }

    /// First syncer step this job runs.
    pub const fn start_step(&self) -> SyncerStep {
        match self.kind {
            JobKind::Configuration => SyncerStep::DownloadUpdates,
            JobKind::Nudge | JobKind::Poll => SyncerStep::SyncerBegin,
        }
    }

    /// Last syncer step this job runs.
    pub const fn end_step(&self) -> SyncerStep {
        match self.kind {
            JobKind::Configuration => SyncerStep::ApplyUpdates,
            JobKind::Nudge | JobKind::Poll => SyncerStep::SyncerEnd,
        }
    }

    /// Folds a later job of the same kind into this one.
    ///
    /// Types are unioned with the later payload winning per type and the
    /// later source winning overall. When `take_earlier_start` is set the
    /// scheduled start becomes the earlier of the two.
    pub fn coalesce(&mut self, later: &Self, take_earlier_start: bool) {
        self.source.coalesce(&later.source);
        if take_earlier_start && later.scheduled_start < self.scheduled_start {
            self.scheduled_start = later.scheduled_start;
        }
    }

    /// Moves the given types out into a new job of the same kind.
    ///
    /// Returns `None` when none of `types` is requested by this job.
    pub fn split_off_types(&mut self, types: &ModelTypeSet) -> Option<Self> {
        let mut moved = SyncSourceInfo::new(self.source.updates_source, Default::default());
        for ty in types {
            if let Some(payload) = self.source.types.remove(ty) {
                moved.types.insert(*ty, payload);
            }
        }
        if moved.types.is_empty() {
            return None;
        }

        let (start, created) = (self.scheduled_start, self.creation_time);
        let mut job = Self::build(self.kind, moved, start, created, self.origin.clone());
        job.priority = self.priority;
        Some(job)
    }

    /// Runs the configuration's ready callback, at most once.
    pub fn run_ready_task(&mut self) {
        if let Some(task) = self.config_params.as_mut().and_then(|p| p.ready_task.take()) {
            task();
        }
    }

    /// Runs the configuration's retry callback, if any.
    pub fn run_retry_task(&self) {
        if let Some(task) = self.config_params.as_ref().and_then(|p| p.retry_task.as_ref()) {
            task();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use cadence_common::{Clock, MockClock};
    use cadence_domain::{ModelType, ModelTypePayloadMap};

    use super::*;

    fn source(types: &[ModelType]) -> SyncSourceInfo {
        let payloads = types.iter().map(|t| (*t, String::new())).collect();
        SyncSourceInfo::new(UpdatesSource::Local, payloads)
    }

    #[test]
    fn steps_depend_on_kind() {
        let clock = MockClock::new();
        let now = clock.now();
        let nudge = Job::nudge(source(&[ModelType::Bookmarks]), now, now, "test");
        let config = Job::configuration(
            ConfigurationParams::new(
                UpdatesSource::Reconfiguration,
                [ModelType::Apps].into_iter().collect(),
            ),
            now,
            "test",
        );

        assert_eq!(
            (nudge.start_step(), nudge.end_step()),
            (SyncerStep::SyncerBegin, SyncerStep::SyncerEnd)
        );
        assert_eq!(
            (config.start_step(), config.end_step()),
            (SyncerStep::DownloadUpdates, SyncerStep::ApplyUpdates)
        );
        assert_eq!(config.requested_types(), [ModelType::Apps].into_iter().collect());
    }

    #[test]
    fn coalesce_unions_types_and_keeps_earlier_start() {
        let clock = MockClock::new();
        let now = clock.now();
        let later = now + Duration::from_secs(10);
        let mut pending = Job::nudge(source(&[ModelType::Bookmarks]), later, now, "a");
        let mut payloads = ModelTypePayloadMap::new();
        payloads.insert(ModelType::Sessions, "hint".into());
        let later = Job::nudge(
            SyncSourceInfo::new(UpdatesSource::Notification, payloads),
            now + Duration::from_secs(2),
            now,
            "b",
        );

        pending.coalesce(&later, true);

        assert_eq!(pending.requested_types().len(), 2);
        assert_eq!(pending.scheduled_start(), now + Duration::from_secs(2));
        assert_eq!(pending.source().updates_source, UpdatesSource::Notification);
        assert_eq!(pending.source().types[&ModelType::Sessions], "hint");
    }

    #[test]
    fn coalesce_without_start_update_keeps_pending_start() {
        let clock = MockClock::new();
        let now = clock.now();
        let later = now + Duration::from_secs(10);
        let mut pending = Job::nudge(source(&[ModelType::Bookmarks]), later, now, "a");
        let later = Job::nudge(source(&[ModelType::Themes]), now, now, "b");

        pending.coalesce(&later, false);

        assert_eq!(pending.scheduled_start(), now + Duration::from_secs(10));
    }

    #[test]
    fn split_moves_only_requested_types() {
        let clock = MockClock::new();
        let now = clock.now();
        let mut job =
            Job::nudge(source(&[ModelType::Bookmarks, ModelType::Passwords]), now, now, "a");

        let held: ModelTypeSet = [ModelType::Passwords, ModelType::Nigori].into_iter().collect();
        let split = job.split_off_types(&held).unwrap();

        assert_eq!(job.requested_types(), [ModelType::Bookmarks].into_iter().collect());
        assert_eq!(split.requested_types(), [ModelType::Passwords].into_iter().collect());
        assert_eq!(split.kind(), JobKind::Nudge);
        assert!(job.split_off_types(&[ModelType::Nigori].into_iter().collect()).is_none());
    }

    #[test]
    fn ready_task_runs_once_and_retry_task_repeats() {
        let ready = Arc::new(AtomicUsize::new(0));
        let retry = Arc::new(AtomicUsize::new(0));
        let (r, t) = (Arc::clone(&ready), Arc::clone(&retry));
        let params = ConfigurationParams::new(UpdatesSource::NewClient, ModelTypeSet::new())
            .with_ready_task(move || {
                r.fetch_add(1, Ordering::SeqCst);
            })
            .with_retry_task(move || {
                t.fetch_add(1, Ordering::SeqCst);
            });
        let mut job = Job::configuration(params, MockClock::new().now(), "test");

        job.run_retry_task();
        job.run_retry_task();
        job.run_ready_task();
        job.run_ready_task();

        assert_eq!(ready.load(Ordering::SeqCst), 1);
        assert_eq!(retry.load(Ordering::SeqCst), 2);
    }
}
