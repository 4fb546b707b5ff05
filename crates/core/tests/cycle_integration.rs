//! Drives a session through a mock syncer and checks how the result is
//! classified and reported.

#![allow(dead_code)]

mod support;

use std::sync::Arc;

use cadence_common::BackoffCause;
use cadence_core::{
    classify_cycle, CycleOutcome, Job, ShareInfo, SyncEventListeners, SyncSession,
    SyncSessionContext, Syncer,
};
use cadence_domain::{
    EventCause, ModelType, ServerConnectionCode, SyncEngineEvent, SyncSourceInfo, SyncerError,
    SyncerStep, UpdatesSource,
};
use parking_lot::Mutex;
use support::ports::{BatchSyncer, MockConnection};
use tokio_util::sync::CancellationToken;

fn context(connection: Arc<MockConnection>) -> Arc<SyncSessionContext> {
    let context = Arc::new(SyncSessionContext::new(connection, SyncEventListeners::new()));
    context.set_share_info(ShareInfo { is_share_usable: true, ..ShareInfo::default() });
    context
}

fn nudge_source() -> SyncSourceInfo {
    SyncSourceInfo::new(
        UpdatesSource::Local,
        [(ModelType::Bookmarks, String::new())].into_iter().collect(),
    )
}

fn connected_session() -> SyncSession {
    SyncSession::new(context(MockConnection::connected()), nudge_source(), CancellationToken::new())
}

async fn run_full_cycle(syncer: &BatchSyncer, session: &mut SyncSession) -> bool {
    syncer.sync_share(session, SyncerStep::SyncerBegin, SyncerStep::SyncerEnd).await
}

#[tokio::test]
async fn successful_cycle_produces_dirty_snapshot() {
    let syncer = BatchSyncer::default();
    let mut session = connected_session();
    let now = std::time::Instant::now();
    let job = Job::nudge(nudge_source(), now, now, "test");

    let completed = syncer.sync_share(&mut session, job.start_step(), job.end_step()).await;

    assert!(completed);
    assert_eq!(
        classify_cycle(completed, &session),
        CycleOutcome::Success { has_more_to_sync: false }
    );
    assert!(session.status().dirty().take());
    let snapshot = session.take_snapshot(false, false);
    assert_eq!(snapshot.syncer_status.num_updates_downloaded_total, 5);
    assert!(snapshot.is_share_usable);
    assert_eq!(syncer.steps.lock().as_slice(), &[(SyncerStep::SyncerBegin, SyncerStep::SyncerEnd)]);
}

#[tokio::test]
async fn offline_download_backs_off_with_short_cause() {
    let connection = MockConnection::connected();
    connection.set_status(ServerConnectionCode::ConnectionUnavailable);
    let syncer = BatchSyncer::default();
    *syncer.download_result.lock() = Some(SyncerError::NetworkConnectionUnavailable);

    let mut session =
        SyncSession::new(context(connection), nudge_source(), CancellationToken::new());
    let completed = run_full_cycle(&syncer, &mut session).await;

    assert_eq!(
        classify_cycle(completed, &session),
        CycleOutcome::Transient { cause: BackoffCause::NetworkUnavailable }
    );
}

#[tokio::test]
async fn cancelled_token_ends_cycle_early() {
    let syncer = BatchSyncer::default();
    let token = CancellationToken::new();
    let mut session =
        SyncSession::new(context(MockConnection::connected()), nudge_source(), token.clone());
    token.cancel();

    let completed = run_full_cycle(&syncer, &mut session).await;

    assert!(!completed);
    assert_eq!(classify_cycle(completed, &session), CycleOutcome::ExitedPrematurely);
}

#[tokio::test]
async fn remaining_changes_request_another_cycle() {
    let syncer = BatchSyncer::default();
    *syncer.remaining.lock() = 40;
    let mut session = connected_session();

    let completed = run_full_cycle(&syncer, &mut session).await;

    assert_eq!(
        classify_cycle(completed, &session),
        CycleOutcome::Success { has_more_to_sync: true }
    );
}

#[test]
fn listeners_receive_cycle_events() {
    let listeners = SyncEventListeners::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    listeners.on_state_changed(move |event: &SyncEngineEvent| sink.lock().push(event.cause));

    let context = context(MockConnection::connected());
    listeners.notify(&SyncEngineEvent::new(EventCause::SyncCycleEnded, context.initial_snapshot()));

    assert_eq!(seen.lock().as_slice(), &[EventCause::SyncCycleEnded]);
}
