//! In-memory port implementations

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cadence_core::{ServerConnectionManager, SyncSession, Syncer};
use cadence_domain::{ServerConnectionCode, SyncerError, SyncerStep};
use parking_lot::Mutex;

/// Connection whose status can be flipped by the test.
#[derive(Debug)]
pub struct MockConnection {
    status: Mutex<ServerConnectionCode>,
    invalid_auth: AtomicBool,
}

impl MockConnection {
    pub fn connected() -> Arc<Self> {
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

impl ServerConnectionManager for MockConnection {
    fn server_status(&self) -> ServerConnectionCode {
        *self.status.lock()
    }

    fn has_invalid_auth_token(&self) -> bool {
        self.invalid_auth.load(Ordering::SeqCst)
    }
}

/// Syncer that downloads a fixed batch, optionally failing the download.
#[derive(Debug, Default)]
pub struct BatchSyncer {
    pub download_result: Mutex<Option<SyncerError>>,
    pub remaining: Mutex<i64>,
    pub steps: Mutex<Vec<(SyncerStep, SyncerStep)>>,
}

#[async_trait]
impl Syncer for BatchSyncer {
    async fn sync_share(
        &self,
        session: &mut SyncSession,
        start: SyncerStep,
        end: SyncerStep,
    ) -> bool {
        self.steps.lock().push((start, end));

        let result = (*self.download_result.lock()).unwrap_or(SyncerError::SyncerOk);
        session.status_mut().set_last_download_updates_result(result);
        if result.is_error() {
            return false;
        }
        session.status_mut().increment_num_updates_downloaded_by(5);
        session.status_mut().set_num_server_changes_remaining(*self.remaining.lock());
        session.should_continue()
    }
}
