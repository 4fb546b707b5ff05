//! Model types and the collections keyed by them
//!
//! A model type names one independently synchronized category of data. The
//! scheduler never looks inside a type's entities; it only tracks which types
//! a job requests, which are throttled, and the opaque payload a nudge carries
//! for each of them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::impl_wire_name_conversions;

/// A category of synchronized data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Bookmarks,
    Preferences,
    Passwords,
    Autofill,
    AutofillProfile,
    Themes,
    TypedUrls,
    Extensions,
    ExtensionSettings,
    Apps,
    AppSettings,
    AppNotifications,
    Sessions,
    SearchEngines,
    HistoryDeleteDirectives,
    Nigori,
}

impl_wire_name_conversions!(ModelType {
    Bookmarks => "bookmarks",
    Preferences => "preferences",
    Passwords => "passwords",
    Autofill => "autofill",
    AutofillProfile => "autofill_profile",
    Themes => "themes",
    TypedUrls => "typed_urls",
    Extensions => "extensions",
    ExtensionSettings => "extension_settings",
    Apps => "apps",
    AppSettings => "app_settings",
    AppNotifications => "app_notifications",
    Sessions => "sessions",
    SearchEngines => "search_engines",
    HistoryDeleteDirectives => "history_delete_directives",
    Nigori => "nigori",
});

impl ModelType {
    /// Every model type, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::Bookmarks,
        Self::Preferences,
        Self::Passwords,
        Self::Autofill,
        Self::AutofillProfile,
        Self::Themes,
        Self::TypedUrls,
        Self::Extensions,
        Self::ExtensionSettings,
        Self::Apps,
        Self::AppSettings,
        Self::AppNotifications,
        Self::Sessions,
        Self::SearchEngines,
        Self::HistoryDeleteDirectives,
        Self::Nigori,
    ];
}

/// Ordered set of model types.
pub type ModelTypeSet = BTreeSet<ModelType>;

/// Opaque per-type payload (an invalidation hint, usually empty).
pub type ModelTypePayloadMap = BTreeMap<ModelType, String>;

/// Worker group responsible for applying a model type's changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSafeGroup {
    Passive,
    Ui,
    Db,
    File,
    History,
    Password,
}

impl_wire_name_conversions!(ModelSafeGroup {
    Passive => "passive",
    Ui => "ui",
    Db => "db",
    File => "file",
    History => "history",
    Password => "password",
});

/// Which worker group handles each enabled model type.
pub type ModelSafeRoutingInfo = BTreeMap<ModelType, ModelSafeGroup>;

/// Builds a payload map giving every type in `types` the same payload.
pub fn payload_map_from_types(types: &ModelTypeSet, payload: &str) -> ModelTypePayloadMap {
    types.iter().map(|ty| (*ty, payload.to_string())).collect()
}

/// Returns the set of types present in a payload map.
pub fn types_of(payloads: &ModelTypePayloadMap) -> ModelTypeSet {
    payloads.keys().copied().collect()
}

/// Merges `update` into `original`.
///
/// Types only in `original` keep their payload; types in `update` overwrite
/// whatever `original` held for them.
pub fn coalesce_payloads(original: &mut ModelTypePayloadMap, update: &ModelTypePayloadMap) {
    for (ty, payload) in update {
        original.insert(*ty, payload.clone());
    }
}
