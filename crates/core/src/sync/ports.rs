//! Port interfaces for sync operations

use async_trait::async_trait;
use cadence_domain::{ServerConnectionCode, SyncerStep};

use crate::sync::session::SyncSession;

/// Runs one synchronization cycle against the server.
///
/// Implementations write counters into `session.status_mut()`, report server
/// directives through `session.directives_mut()`, and should check
/// `session.should_continue()` between steps.
#[async_trait]
pub trait Syncer: Send + Sync {
    /// Run the steps `start..=end`.
    ///
    /// Returns `false` when the cycle stopped before reaching `end`.
    async fn sync_share(&self, session: &mut SyncSession, start: SyncerStep, end: SyncerStep)
        -> bool;
}

/// View of the connection to the sync server
pub trait ServerConnectionManager: Send + Sync {
    /// Status recorded by the most recent request
    fn server_status(&self) -> ServerConnectionCode;

    /// Whether the current auth token is known to be rejected
    fn has_invalid_auth_token(&self) -> bool;
}
