//! Classification of a finished cycle

use std::time::Instant;

use cadence_common::BackoffCause;
use cadence_domain::{ErrorCounters, ModelTypeSet, SyncProtocolErrorType, SyncerError};

use crate::sync::session::SyncSession;

/// What the scheduler should do after a cycle returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle finished cleanly.
    Success { has_more_to_sync: bool },
    /// The syncer stopped before its end step without recording an error.
    ExitedPrematurely,
    /// Recoverable failure; back off and retry.
    Transient { cause: BackoffCause },
    /// The server asked to be left alone. `None` means no explicit deadline
    /// was given.
    Throttled { until: Option<Instant> },
    /// The server migrated these types; they must be downloaded again.
    MigrationRequired { types: ModelTypeSet },
    /// Syncing can never succeed without outside intervention.
    StopPermanently,
}

impl CycleOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Classifies the cycle recorded in `session`.
///
/// `completed` is the syncer's return value. Checks run from most to least
/// severe so that a permanent error is never masked by a throttle, and a
/// throttle never by an ordinary failure.
pub fn classify_cycle(completed: bool, session: &SyncSession) -> CycleOutcome {
    let directives = session.directives();
    let status = session.status();
    let protocol_error = &status.errors().sync_protocol_error;

    if directives.stop_syncing_permanently || protocol_error.is_permanent() {
        return CycleOutcome::StopPermanently;
    }

    if directives.silenced_until.is_some()
        || protocol_error.error_type == SyncProtocolErrorType::Throttled
    {
        return CycleOutcome::Throttled { until: directives.silenced_until };
    }

    let migrated = &status.syncer_status().types_needing_local_migration;
    if !migrated.is_empty() {
        return CycleOutcome::MigrationRequired { types: migrated.clone() };
    }

    if status.errors().first_error().is_some()
        || matches!(
            protocol_error.error_type,
            SyncProtocolErrorType::TransientError | SyncProtocolErrorType::MigrationDone
        )
    {
        return CycleOutcome::Transient { cause: backoff_cause(status.errors()) };
    }

    if !completed {
        return CycleOutcome::ExitedPrematurely;
    }

    CycleOutcome::Success { has_more_to_sync: status.has_more_to_sync() }
}

/// Picks the backoff cause from the first failing command.
pub fn backoff_cause(errors: &ErrorCounters) -> BackoffCause {
    if errors.sync_protocol_error.error_type == SyncProtocolErrorType::MigrationDone {
        return BackoffCause::MigrationDone;
    }
    match errors.first_error() {
        Some(SyncerError::NetworkConnectionUnavailable) => BackoffCause::NetworkUnavailable,
        Some(SyncerError::ServerReturnMigrationDone) => BackoffCause::MigrationDone,
        Some(SyncerError::ServerReturnConflict) => BackoffCause::CommitConflict,
        _ => BackoffCause::Other,
    }
}
