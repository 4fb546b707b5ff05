//! Immutable report of one finished sync cycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::model_type::{ModelTypePayloadMap, ModelTypeSet};
use crate::types::session_state::{ErrorCounters, SyncerStatus};
use crate::types::source::SyncSourceInfo;

/// Frozen view of a cycle's counters, handed to listeners.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncCycleSnapshot {
    pub syncer_status: SyncerStatus,
    pub errors: ErrorCounters,
    pub num_server_changes_remaining: i64,
    pub is_share_usable: bool,
    pub initial_sync_ended: ModelTypeSet,
    pub download_progress_markers: ModelTypePayloadMap,
    pub has_more_to_sync: bool,
    pub is_silenced: bool,
    pub unsynced_count: i64,
    pub num_encryption_conflicts: u32,
    pub num_hierarchy_conflicts: u32,
    pub num_simple_conflicts: u32,
    pub num_server_conflicts: u32,
    pub did_commit_items: bool,
    pub source: SyncSourceInfo,
    pub notifications_enabled: bool,
    pub num_entries: usize,
    pub sync_start_time: Option<DateTime<Utc>>,
    pub retry_scheduled: bool,
}

impl SyncCycleSnapshot {
    /// Total conflicts of every kind.
    pub const fn total_conflicts(&self) -> u32 {
        self.num_encryption_conflicts
            .saturating_add(self.num_hierarchy_conflicts)
            .saturating_add(self.num_simple_conflicts)
            .saturating_add(self.num_server_conflicts)
    }

    /// JSON rendering for diagnostics pages and structured logs.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl std::fmt::Display for SyncCycleSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_value())
    }
}
