//! Per-cycle counters
//!
//! Everything here is reset at the start of a cycle, written by the syncer
//! while the cycle runs, and frozen into a [`SyncCycleSnapshot`] when it ends.
//! Writes that change a value raise a shared [`DirtyFlag`]; the scheduler only
//! announces a finished cycle when the flag is up.
//!
//! [`SyncCycleSnapshot`]: crate::types::snapshot::SyncCycleSnapshot

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::model_type::ModelTypeSet;
use crate::types::protocol::{SyncProtocolError, SyncerError};

/// Shared "something changed this cycle" marker.
#[derive(Debug, Clone, Default)]
pub struct DirtyFlag(Arc<AtomicBool>);

impl DirtyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns the current value and lowers the flag.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// A value that raises a [`DirtyFlag`] when it is changed.
#[derive(Debug, Clone)]
pub struct DirtyOnWrite<T> {
    value: T,
    dirty: DirtyFlag,
}

impl<T: Clone + PartialEq> DirtyOnWrite<T> {
    pub const fn new(dirty: DirtyFlag, value: T) -> Self {
        Self { value, dirty }
    }

    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Applies `f` to the value; marks dirty only if the value changed.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        let before = self.value.clone();
        let out = f(&mut self.value);
        if self.value != before {
            self.dirty.mark();
        }
        out
    }

    pub fn set(&mut self, value: T) {
        self.mutate(|v| *v = value);
    }
}

/// Success counters for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncerStatus {
    /// Server reported the local store as unusable.
    pub invalid_store: bool,
    pub num_successful_commits: u32,
    pub num_successful_bookmark_commits: u32,
    pub num_updates_downloaded_total: u32,
    pub num_tombstone_updates_downloaded_total: u32,
    pub num_reflected_updates_downloaded_total: u32,
    /// Types the server says must be purged and downloaded again.
    pub types_needing_local_migration: ModelTypeSet,
    pub num_local_overwrites: u32,
    pub num_server_overwrites: u32,
}

/// Error results recorded during one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorCounters {
    pub sync_protocol_error: SyncProtocolError,
    pub last_download_updates_result: SyncerError,
    pub last_post_commit_result: SyncerError,
    pub last_process_commit_response_result: SyncerError,
}

impl ErrorCounters {
    /// First command result in the cycle that was an error, if any.
    pub fn first_error(&self) -> Option<SyncerError> {
        [
            self.last_download_updates_result,
            self.last_post_commit_result,
            self.last_process_commit_response_result,
        ]
        .into_iter()
        .find(|r| r.is_error())
    }
}

/// Conflicts seen while applying or committing.
///
/// Only counts matter to the scheduler; ids are kept for simple conflicts so
/// that re-adding the same item is not double counted.
#[derive(Debug, Clone)]
pub struct ConflictProgress {
    simple_conflicting_ids: BTreeSet<String>,
    num_encryption_conflicts: u32,
    num_hierarchy_conflicts: u32,
    num_server_conflicts: u32,
    dirty: DirtyFlag,
}

impl ConflictProgress {
    pub fn new(dirty: DirtyFlag) -> Self {
        Self {
            simple_conflicting_ids: BTreeSet::new(),
            num_encryption_conflicts: 0,
            num_hierarchy_conflicts: 0,
            num_server_conflicts: 0,
            dirty,
        }
    }

    pub fn has_simple_conflict_item(&self, id: &str) -> bool {
        self.simple_conflicting_ids.contains(id)
    }

    pub fn add_simple_conflicting_item(&mut self, id: impl Into<String>) {
        if self.simple_conflicting_ids.insert(id.into()) {
            self.dirty.mark();
        }
    }

    pub fn erase_simple_conflicting_item(&mut self, id: &str) {
        if self.simple_conflicting_ids.remove(id) {
            self.dirty.mark();
        }
    }

    pub fn add_encryption_conflicting_item(&mut self) {
        self.num_encryption_conflicts += 1;
        self.dirty.mark();
    }

    pub fn add_hierarchy_conflicting_item(&mut self) {
        self.num_hierarchy_conflicts += 1;
        self.dirty.mark();
    }

    pub fn add_server_conflicting_item(&mut self) {
        self.num_server_conflicts += 1;
        self.dirty.mark();
    }

    pub fn simple_conflicting_items_size(&self) -> u32 {
        u32::try_from(self.simple_conflicting_ids.len()).unwrap_or(u32::MAX)
    }

    pub const fn encryption_conflicting_items_size(&self) -> u32 {
        self.num_encryption_conflicts
    }

    pub const fn hierarchy_conflicting_items_size(&self) -> u32 {
        self.num_hierarchy_conflicts
    }

    pub const fn server_conflicting_items_size(&self) -> u32 {
        self.num_server_conflicts
    }
}

/// Outcome of verifying one downloaded update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyResult {
    Success,
    Fail,
    Skip,
    Undelete,
}

/// Outcome of applying one update locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAttemptResponse {
    Success,
    ConflictSimple,
    ConflictHierarchy,
    ConflictEncryption,
}

/// An apply attempt for the entity with the given id.
pub type AppliedUpdate = (UpdateAttemptResponse, String);

/// Verification and application results for downloaded updates.
#[derive(Debug, Clone)]
pub struct UpdateProgress {
    verified_updates: Vec<(VerifyResult, String)>,
    applied_updates: Vec<AppliedUpdate>,
    dirty: DirtyFlag,
}

impl UpdateProgress {
    pub const fn new(dirty: DirtyFlag) -> Self {
        Self { verified_updates: Vec::new(), applied_updates: Vec::new(), dirty }
    }

    pub fn add_verify_result(&mut self, result: VerifyResult, id: impl Into<String>) {
        self.verified_updates.push((result, id.into()));
        self.dirty.mark();
    }

    pub fn add_applied_update(&mut self, response: UpdateAttemptResponse, id: impl Into<String>) {
        self.applied_updates.push((response, id.into()));
        self.dirty.mark();
    }

    pub fn applied_updates(&self) -> &[AppliedUpdate] {
        &self.applied_updates
    }

    pub fn applied_updates_size(&self) -> usize {
        self.applied_updates.len()
    }

    pub fn verified_updates_size(&self) -> usize {
        self.verified_updates.len()
    }

    pub fn has_verified_updates(&self) -> bool {
        !self.verified_updates.is_empty()
    }

    pub fn clear_verified_updates(&mut self) {
        if !self.verified_updates.is_empty() {
            self.verified_updates.clear();
            self.dirty.mark();
        }
    }

    /// Successful applications this cycle; an item applied twice counts twice.
    pub fn successfully_applied_update_count(&self) -> usize {
        self.applied_updates.iter().filter(|(r, _)| *r == UpdateAttemptResponse::Success).count()
    }

    pub fn has_conflicting_updates(&self) -> bool {
        self.applied_updates.iter().any(|(r, _)| *r != UpdateAttemptResponse::Success)
    }
}
