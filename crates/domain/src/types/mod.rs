//! Domain types and models

pub mod events;
pub mod model_type;
pub mod protocol;
pub mod session_state;
pub mod snapshot;
pub mod source;
pub mod wait;

pub use events::{EventCause, SyncEngineEvent};
pub use model_type::{
    coalesce_payloads, payload_map_from_types, types_of, ModelSafeGroup, ModelSafeRoutingInfo,
    ModelType, ModelTypePayloadMap, ModelTypeSet,
};
pub use protocol::{
    ClientAction, ServerConnectionCode, SyncProtocolError, SyncProtocolErrorType, SyncerError,
};
pub use session_state::{
    AppliedUpdate, ConflictProgress, DirtyFlag, DirtyOnWrite, ErrorCounters, SyncerStatus,
    UpdateAttemptResponse, UpdateProgress, VerifyResult,
};
pub use snapshot::SyncCycleSnapshot;
pub use source::{NudgeSource, SyncSourceInfo, SyncerStep, UpdatesSource};
pub use wait::{deadline_after, SchedulerMode, WaitInterval, WaitMode};
