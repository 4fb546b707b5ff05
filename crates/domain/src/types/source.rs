//! Where a sync request came from, and which syncer steps it covers

use serde::{Deserialize, Serialize};

use crate::impl_wire_name_conversions;
use crate::types::model_type::{coalesce_payloads, types_of, ModelTypePayloadMap, ModelTypeSet};

/// Origin of a nudge as reported by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeSource {
    Unknown,
    /// A server-side change notification.
    Notification,
    /// A local modification that needs committing.
    Local,
    /// A local request to refresh types from the server.
    LocalRefresh,
}

impl_wire_name_conversions!(NudgeSource {
    Unknown => "unknown",
    Notification => "notification",
    Local => "local",
    LocalRefresh => "local_refresh",
});

/// Reason attached to the updates request sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatesSource {
    #[default]
    Unknown,
    FirstUpdate,
    Local,
    Notification,
    Periodic,
    NewClient,
    Reconfiguration,
    DatatypeRefresh,
    Migration,
}

impl_wire_name_conversions!(UpdatesSource {
    Unknown => "unknown",
    FirstUpdate => "first_update",
    Local => "local",
    Notification => "notification",
    Periodic => "periodic",
    NewClient => "new_client",
    Reconfiguration => "reconfiguration",
    DatatypeRefresh => "datatype_refresh",
    Migration => "migration",
});

impl From<NudgeSource> for UpdatesSource {
    fn from(source: NudgeSource) -> Self {
        match source {
            NudgeSource::Unknown => Self::Unknown,
            NudgeSource::Notification => Self::Notification,
            NudgeSource::Local => Self::Local,
            NudgeSource::LocalRefresh => Self::DatatypeRefresh,
        }
    }
}

/// The source of a job together with the types (and payloads) it requests.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncSourceInfo {
    pub updates_source: UpdatesSource,
    pub types: ModelTypePayloadMap,
}

impl SyncSourceInfo {
    pub const fn new(updates_source: UpdatesSource, types: ModelTypePayloadMap) -> Self {
        Self { updates_source, types }
    }

    /// Types requested by this source.
    pub fn model_types(&self) -> ModelTypeSet {
        types_of(&self.types)
    }

    /// Folds a later request into this one. The later source wins; payloads
    /// are merged per type with the later payload winning.
    pub fn coalesce(&mut self, later: &Self) {
        coalesce_payloads(&mut self.types, &later.types);
        self.updates_source = later.updates_source;
    }
}

/// Ordered stages of one syncer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncerStep {
    SyncerBegin,
    DownloadUpdates,
    ProcessUpdates,
    StoreTimestamps,
    ApplyUpdates,
    Commit,
    SyncerEnd,
}

impl_wire_name_conversions!(SyncerStep {
    SyncerBegin => "syncer_begin",
    DownloadUpdates => "download_updates",
    ProcessUpdates => "process_updates",
    StoreTimestamps => "store_timestamps",
    ApplyUpdates => "apply_updates",
    Commit => "commit",
    SyncerEnd => "syncer_end",
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::model_type::ModelType;

    fn info(source: UpdatesSource, entries: &[(ModelType, &str)]) -> SyncSourceInfo {
        SyncSourceInfo::new(source, entries.iter().map(|(t, p)| (*t, (*p).to_string())).collect())
    }

    #[test]
    fn coalesce_takes_later_source_and_unions_types() {
        let mut first = info(UpdatesSource::Local, &[(ModelType::Bookmarks, "")]);
        let later = info(UpdatesSource::Notification, &[(ModelType::Passwords, "p")]);

        first.coalesce(&later);

        assert_eq!(first.updates_source, UpdatesSource::Notification);
        assert_eq!(first.model_types().len(), 2);
    }

    #[test]
    fn nudge_sources_map_to_updates_sources() {
        assert_eq!(UpdatesSource::from(NudgeSource::Local), UpdatesSource::Local);
        assert_eq!(UpdatesSource::from(NudgeSource::LocalRefresh), UpdatesSource::DatatypeRefresh);
    }

    #[test]
    fn syncer_steps_are_ordered() {
        assert!(SyncerStep::SyncerBegin < SyncerStep::DownloadUpdates);
        assert!(SyncerStep::ApplyUpdates < SyncerStep::Commit);
        assert!(SyncerStep::Commit < SyncerStep::SyncerEnd);
    }
}
