//! Per-type throttling requested by the server

use std::collections::BTreeMap;
use std::time::Instant;

use cadence_domain::{ModelType, ModelTypeSet};
use tracing::debug;

/// Tracks until when each throttled model type must not be synced.
#[derive(Debug, Clone, Default)]
pub struct ThrottledDataTypeTracker {
    unthrottle_times: BTreeMap<ModelType, Instant>,
}

impl ThrottledDataTypeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Throttles `types` until `until`. A later deadline replaces an earlier
    /// one; an earlier deadline never shortens an existing throttle.
    pub fn set_unthrottle_time(&mut self, types: &ModelTypeSet, until: Instant) {
        for ty in types {
            let entry = self.unthrottle_times.entry(*ty).or_insert(until);
            if *entry < until {
                *entry = until;
            }
        }
        debug!(types = ?types, "model types throttled");
    }

    /// Drops every throttle whose deadline is at or before `now`.
    pub fn prune_unthrottled_types(&mut self, now: Instant) {
        self.unthrottle_times.retain(|_, until| *until > now);
    }

    pub fn throttled_types(&self) -> ModelTypeSet {
        self.unthrottle_times.keys().copied().collect()
    }

    pub fn is_throttled(&self, ty: ModelType) -> bool {
        self.unthrottle_times.contains_key(&ty)
    }

    /// Earliest deadline among throttled types.
    pub fn next_unthrottle_time(&self) -> Option<Instant> {
        self.unthrottle_times.values().min().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.unthrottle_times.is_empty()
    }
}
