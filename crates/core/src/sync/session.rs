//! Per-cycle session state
//!
//! A [`SyncSession`] is created for every cycle. The syncer writes counters
//! into its [`StatusController`] and records server directives in its
//! [`SessionDirectives`]; the scheduler reads both once the cycle returns and
//! turns them into a [`SyncCycleSnapshot`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cadence_domain::{
    ConflictProgress, DirtyFlag, DirtyOnWrite, ErrorCounters, ModelSafeRoutingInfo,
    ModelTypePayloadMap, ModelTypeSet, SyncCycleSnapshot, SyncProtocolError, SyncSourceInfo,
    SyncerError, SyncerStatus, UpdateProgress,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::sync::listeners::SyncEventListeners;
use crate::sync::ports::ServerConnectionManager;
use crate::sync::throttle::ThrottledDataTypeTracker;

/// State of the local store reported with every snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareInfo {
    pub is_share_usable: bool,
    pub initial_sync_ended: ModelTypeSet,
    pub download_progress_markers: ModelTypePayloadMap,
    pub unsynced_count: i64,
    pub num_entries: usize,
}

/// Long-lived state shared by every session.
pub struct SyncSessionContext {
    connection: Arc<dyn ServerConnectionManager>,
    listeners: SyncEventListeners,
    routing_info: RwLock<ModelSafeRoutingInfo>,
    notifications_enabled: AtomicBool,
    throttled_types: Mutex<ThrottledDataTypeTracker>,
    share_info: RwLock<ShareInfo>,
}

impl SyncSessionContext {
    pub fn new(
        connection: Arc<dyn ServerConnectionManager>,
        listeners: SyncEventListeners,
    ) -> Self {
        Self {
            connection,
            listeners,
            routing_info: RwLock::new(ModelSafeRoutingInfo::new()),
            notifications_enabled: AtomicBool::new(false),
            throttled_types: Mutex::new(ThrottledDataTypeTracker::new()),
            share_info: RwLock::new(ShareInfo::default()),
        }
    }

    pub fn connection(&self) -> &dyn ServerConnectionManager {
        self.connection.as_ref()
    }

    pub const fn listeners(&self) -> &SyncEventListeners {
        &self.listeners
    }

    pub fn routing_info(&self) -> ModelSafeRoutingInfo {
        self.routing_info.read().clone()
    }

    pub fn set_routing_info(&self, routing_info: ModelSafeRoutingInfo) {
        *self.routing_info.write() = routing_info;
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled.load(Ordering::Acquire)
    }

    pub fn set_notifications_enabled(&self, enabled: bool) {
        self.notifications_enabled.store(enabled, Ordering::Release);
    }

    pub fn throttled_types(&self) -> parking_lot::MutexGuard<'_, ThrottledDataTypeTracker> {
        self.throttled_types.lock()
    }

    pub fn share_info(&self) -> ShareInfo {
        self.share_info.read().clone()
    }

    pub fn set_share_info(&self, info: ShareInfo) {
        *self.share_info.write() = info;
    }

    /// Snapshot describing the store before any cycle has run.
    pub fn initial_snapshot(&self) -> SyncCycleSnapshot {
        let share = self.share_info();
        SyncCycleSnapshot {
            is_share_usable: share.is_share_usable,
            initial_sync_ended: share.initial_sync_ended,
            download_progress_markers: share.download_progress_markers,
            unsynced_count: share.unsynced_count,
            num_entries: share.num_entries,
            notifications_enabled: self.notifications_enabled(),
            ..SyncCycleSnapshot::default()
        }
    }
}

impl std::fmt::Debug for SyncSessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSessionContext")
            .field("notifications_enabled", &self.notifications_enabled())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

/// Counters written by the syncer during one cycle.
#[derive(Debug)]
pub struct StatusController {
    dirty: DirtyFlag,
    syncer_status: DirtyOnWrite<SyncerStatus>,
    errors: DirtyOnWrite<ErrorCounters>,
    num_server_changes_remaining: DirtyOnWrite<i64>,
    conflict_progress: ConflictProgress,
    update_progress: UpdateProgress,
    updates_request_types: ModelTypeSet,
    items_committed: bool,
    more_to_sync: bool,
    share_info: ShareInfo,
}

impl StatusController {
    pub fn new(share_info: ShareInfo) -> Self {
        let dirty = DirtyFlag::new();
        Self {
            syncer_status: DirtyOnWrite::new(dirty.clone(), SyncerStatus::default()),
            errors: DirtyOnWrite::new(dirty.clone(), ErrorCounters::default()),
            num_server_changes_remaining: DirtyOnWrite::new(dirty.clone(), 0),
            conflict_progress: ConflictProgress::new(dirty.clone()),
            update_progress: UpdateProgress::new(dirty.clone()),
            updates_request_types: ModelTypeSet::new(),
            items_committed: false,
            more_to_sync: false,
            share_info,
            dirty,
        }
    }

    pub const fn dirty(&self) -> &DirtyFlag {
        &self.dirty
    }

    pub const fn syncer_status(&self) -> &SyncerStatus {
        self.syncer_status.value()
    }

    pub const fn errors(&self) -> &ErrorCounters {
        self.errors.value()
    }

    pub const fn conflict_progress(&self) -> &ConflictProgress {
        &self.conflict_progress
    }

    pub fn conflict_progress_mut(&mut self) -> &mut ConflictProgress {
        &mut self.conflict_progress
    }

    pub const fn update_progress(&self) -> &UpdateProgress {
        &self.update_progress
    }

    pub fn update_progress_mut(&mut self) -> &mut UpdateProgress {
        &mut self.update_progress
    }

    pub const fn updates_request_types(&self) -> &ModelTypeSet {
        &self.updates_request_types
    }

    pub fn set_updates_request_types(&mut self, types: ModelTypeSet) {
        self.updates_request_types = types;
    }

    pub fn num_server_changes_remaining(&self) -> i64 {
        *self.num_server_changes_remaining.value()
    }

    pub fn set_num_server_changes_remaining(&mut self, remaining: i64) {
        self.num_server_changes_remaining.set(remaining);
    }

    pub fn increment_num_successful_commits(&mut self) {
        self.syncer_status.mutate(|s| s.num_successful_commits += 1);
    }

    pub fn increment_num_successful_bookmark_commits(&mut self) {
        self.syncer_status.mutate(|s| s.num_successful_bookmark_commits += 1);
    }

    pub fn increment_num_updates_downloaded_by(&mut self, value: u32) {
        self.syncer_status.mutate(|s| s.num_updates_downloaded_total += value);
    }

    pub fn increment_num_tombstone_updates_downloaded_by(&mut self, value: u32) {
        self.syncer_status.mutate(|s| s.num_tombstone_updates_downloaded_total += value);
    }

    pub fn increment_num_reflected_updates_downloaded_by(&mut self, value: u32) {
        self.syncer_status.mutate(|s| s.num_reflected_updates_downloaded_total += value);
    }

    pub fn increment_num_local_overwrites(&mut self) {
        self.syncer_status.mutate(|s| s.num_local_overwrites += 1);
    }

    pub fn increment_num_server_overwrites(&mut self) {
        self.syncer_status.mutate(|s| s.num_server_overwrites += 1);
    }

    pub fn set_invalid_store(&mut self, invalid: bool) {
        self.syncer_status.mutate(|s| s.invalid_store = invalid);
    }

    pub fn set_types_needing_local_migration(&mut self, types: ModelTypeSet) {
        self.syncer_status.mutate(|s| s.types_needing_local_migration = types);
    }

    pub fn set_last_download_updates_result(&mut self, result: SyncerError) {
        self.errors.mutate(|e| e.last_download_updates_result = result);
    }

    pub fn set_commit_result(&mut self, result: SyncerError) {
        self.errors.mutate(|e| e.last_post_commit_result = result);
    }

    pub fn set_process_commit_response_result(&mut self, result: SyncerError) {
        self.errors.mutate(|e| e.last_process_commit_response_result = result);
    }

    pub fn set_sync_protocol_error(&mut self, error: SyncProtocolError) {
        self.errors.mutate(|e| e.sync_protocol_error = error);
    }

    pub fn set_items_committed(&mut self) {
        self.items_committed = true;
    }

    pub const fn did_commit_items(&self) -> bool {
        self.items_committed
    }

    /// Marks that another cycle is needed right away, e.g. after resolving
    /// conflicts locally.
    pub fn set_more_to_sync(&mut self, more: bool) {
        self.more_to_sync = more;
    }

    /// Whether the server or the syncer asked for an immediate follow-up.
    pub fn has_more_to_sync(&self) -> bool {
        self.more_to_sync
            || (self.num_server_changes_remaining() > 0
                && !self.errors().last_download_updates_result.is_error())
    }

    pub const fn share_info(&self) -> &ShareInfo {
        &self.share_info
    }

    pub fn set_share_info(&mut self, info: ShareInfo) {
        if self.share_info != info {
            self.share_info = info;
            self.dirty.mark();
        }
    }
}

/// Instructions the server gave during a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDirectives {
    pub silenced_until: Option<Instant>,
    pub short_poll_interval: Option<Duration>,
    pub long_poll_interval: Option<Duration>,
    pub sessions_commit_delay: Option<Duration>,
    pub throttled_types: Option<(ModelTypeSet, Instant)>,
    pub stop_syncing_permanently: bool,
}

impl SessionDirectives {
    pub fn on_silenced_until(&mut self, until: Instant) {
        self.silenced_until = Some(until);
    }

    pub fn on_received_short_poll_interval_update(&mut self, interval: Duration) {
        self.short_poll_interval = Some(interval);
    }

    pub fn on_received_long_poll_interval_update(&mut self, interval: Duration) {
        self.long_poll_interval = Some(interval);
    }

    pub fn on_received_sessions_commit_delay(&mut self, delay: Duration) {
        self.sessions_commit_delay = Some(delay);
    }

    pub fn on_types_throttled(&mut self, types: ModelTypeSet, until: Instant) {
        self.throttled_types = Some((types, until));
    }

    pub fn on_should_stop_syncing_permanently(&mut self) {
        self.stop_syncing_permanently = true;
    }
}

/// State for one sync cycle.
#[derive(Debug)]
pub struct SyncSession {
    context: Arc<SyncSessionContext>,
    source: SyncSourceInfo,
    routing_info: ModelSafeRoutingInfo,
    status: StatusController,
    directives: SessionDirectives,
    early_exit: CancellationToken,
    start_time: DateTime<Utc>,
}

impl SyncSession {
    pub fn new(
        context: Arc<SyncSessionContext>,
        source: SyncSourceInfo,
        early_exit: CancellationToken,
    ) -> Self {
        let routing_info = context.routing_info();
        let status = StatusController::new(context.share_info());
        Self {
            context,
            source,
            routing_info,
            status,
            directives: SessionDirectives::default(),
            early_exit,
            start_time: Utc::now(),
        }
    }

    pub fn context(&self) -> &SyncSessionContext {
        &self.context
    }

    pub const fn source(&self) -> &SyncSourceInfo {
        &self.source
    }

    pub const fn routing_info(&self) -> &ModelSafeRoutingInfo {
        &self.routing_info
    }

    pub const fn status(&self) -> &StatusController {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusController {
        &mut self.status
    }

    pub const fn directives(&self) -> &SessionDirectives {
        &self.directives
    }

    pub fn directives_mut(&mut self) -> &mut SessionDirectives {
        &mut self.directives
    }

    /// False once an early exit was requested.
    pub fn should_continue(&self) -> bool {
        !self.early_exit.is_cancelled()
    }

    pub fn request_early_exit(&self) {
        self.early_exit.cancel();
    }

    /// Records a protocol error; errors that require it stop the cycle at
    /// the next step boundary.
    pub fn on_sync_protocol_error(&mut self, error: SyncProtocolError) {
        if error.requires_early_exit() {
            debug!(error_type = %error.error_type, "protocol error requests early exit");
            self.request_early_exit();
        }
        self.status.set_sync_protocol_error(error);
    }

    /// Freezes the counters into a snapshot.
    pub fn take_snapshot(&self, is_silenced: bool, retry_scheduled: bool) -> SyncCycleSnapshot {
        let status = &self.status;
        let conflicts = status.conflict_progress();
        let share = status.share_info();
        SyncCycleSnapshot {
            syncer_status: status.syncer_status().clone(),
            errors: status.errors().clone(),
            num_server_changes_remaining: status.num_server_changes_remaining(),
            is_share_usable: share.is_share_usable,
            initial_sync_ended: share.initial_sync_ended.clone(),
            download_progress_markers: share.download_progress_markers.clone(),
            has_more_to_sync: status.has_more_to_sync(),
            is_silenced,
            unsynced_count: share.unsynced_count,
            num_encryption_conflicts: conflicts.encryption_conflicting_items_size(),
            num_hierarchy_conflicts: conflicts.hierarchy_conflicting_items_size(),
            num_simple_conflicts: conflicts.simple_conflicting_items_size(),
            num_server_conflicts: conflicts.server_conflicting_items_size(),
            did_commit_items: status.did_commit_items(),
            source: self.source.clone(),
            notifications_enabled: self.context.notifications_enabled(),
            num_entries: share.num_entries,
            sync_start_time: Some(self.start_time),
            retry_scheduled,
        }
    }
}

#[cfg(test)]
mod tests {
    use cadence_domain::{
        ClientAction, ModelType, ServerConnectionCode, SyncProtocolErrorType, UpdatesSource,
    };

    use super::*;

    struct Connected;

    impl ServerConnectionManager for Connected {
        fn server_status(&self) -> ServerConnectionCode {
            ServerConnectionCode::ServerConnectionOk
        }

        fn has_invalid_auth_token(&self) -> bool {
            false
        }
    }

    fn session() -> SyncSession {
        let context =
            Arc::new(SyncSessionContext::new(Arc::new(Connected), SyncEventListeners::new()));
        SyncSession::new(context, SyncSourceInfo::default(), CancellationToken::new())
    }

    #[test]
    fn untouched_session_is_clean() {
        let session = session();
        assert!(!session.status().dirty().is_dirty());
        assert!(!session.status().has_more_to_sync());
        assert!(session.should_continue());
    }

    #[test]
    fn counter_writes_mark_dirty() {
        let mut session = session();
        session.status_mut().increment_num_successful_commits();
        session.status_mut().set_items_committed();

        assert!(session.status().dirty().is_dirty());
        let snapshot = session.take_snapshot(false, false);
        assert_eq!(snapshot.syncer_status.num_successful_commits, 1);
        assert!(snapshot.did_commit_items);
        assert!(snapshot.sync_start_time.is_some());
    }

    #[test]
    fn unchanged_result_does_not_mark_dirty() {
        let mut session = session();
        session.status_mut().set_last_download_updates_result(SyncerError::Unset);
        assert!(!session.status().dirty().is_dirty());
    }

    #[test]
    fn server_changes_remaining_means_more_to_sync() {
        let mut session = session();
        session.status_mut().set_num_server_changes_remaining(12);
        assert!(session.status().has_more_to_sync());

        session.status_mut().set_last_download_updates_result(SyncerError::NetworkIoError);
        assert!(!session.status().has_more_to_sync());
    }

    #[test]
    fn birthday_error_requests_early_exit() {
        let mut session = session();
        session.on_sync_protocol_error(SyncProtocolError::new(
            SyncProtocolErrorType::NotMyBirthday,
            ClientAction::UnknownAction,
        ));

        assert!(!session.should_continue());
        assert_eq!(
            session.status().errors().sync_protocol_error.error_type,
            SyncProtocolErrorType::NotMyBirthday
        );
    }

    #[test]
    fn snapshot_carries_source_and_conflicts() {
        let context =
            Arc::new(SyncSessionContext::new(Arc::new(Connected), SyncEventListeners::new()));
        context.set_notifications_enabled(true);
        let source = SyncSourceInfo::new(
            UpdatesSource::Notification,
            [(ModelType::Bookmarks, String::new())].into_iter().collect(),
        );
        let mut session =
            SyncSession::new(Arc::clone(&context), source.clone(), CancellationToken::new());
        session.status_mut().conflict_progress_mut().add_simple_conflicting_item("id-1");
        session.status_mut().conflict_progress_mut().add_server_conflicting_item();

        let snapshot = session.take_snapshot(true, true);

        assert_eq!(snapshot.source, source);
        assert_eq!(snapshot.num_simple_conflicts, 1);
        assert_eq!(snapshot.num_server_conflicts, 1);
        assert!(snapshot.notifications_enabled);
        assert!(snapshot.is_silenced);
        assert!(snapshot.retry_scheduled);
    }

    #[test]
    fn initial_snapshot_reflects_share_info() {
        let context = SyncSessionContext::new(Arc::new(Connected), SyncEventListeners::new());
        context.set_share_info(ShareInfo {
            is_share_usable: true,
            initial_sync_ended: [ModelType::Nigori].into_iter().collect(),
            ..ShareInfo::default()
        });

        let snapshot = context.initial_snapshot();
        assert!(snapshot.is_share_usable);
        assert!(snapshot.initial_sync_ended.contains(&ModelType::Nigori));
        assert!(snapshot.sync_start_time.is_none());
    }
}
