//! Notifications emitted to engine listeners

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_wire_name_conversions;
use crate::types::snapshot::SyncCycleSnapshot;

/// Why an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCause {
    /// Initial snapshot sent on the first start.
    StatusChanged,
    /// A cycle finished and changed something.
    SyncCycleEnded,
    /// The server returned an error carrying a client action.
    ActionableError,
    /// Syncing can not continue without outside intervention.
    StopSyncingPermanently,
    /// The time of the next automatic retry changed.
    RetryTimeChanged,
}

impl_wire_name_conversions!(EventCause {
    StatusChanged => "status_changed",
    SyncCycleEnded => "sync_cycle_ended",
    ActionableError => "actionable_error",
    StopSyncingPermanently => "stop_syncing_permanently",
    RetryTimeChanged => "retry_time_changed",
});

/// An event delivered to every registered listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEngineEvent {
    pub cause: EventCause,
    pub snapshot: SyncCycleSnapshot,
    /// Wall-clock time of the next retry; `None` when no retry is pending.
    pub retry_time: Option<DateTime<Utc>>,
}

impl SyncEngineEvent {
    pub const fn new(cause: EventCause, snapshot: SyncCycleSnapshot) -> Self {
        Self { cause, snapshot, retry_time: None }
    }

    pub fn retry_time_changed(retry_time: Option<DateTime<Utc>>) -> Self {
        Self {
            cause: EventCause::RetryTimeChanged,
            snapshot: SyncCycleSnapshot::default(),
            retry_time,
        }
    }
}
