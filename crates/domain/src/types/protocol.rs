//! Server protocol errors and per-command syncer results

use serde::{Deserialize, Serialize};

use crate::impl_wire_name_conversions;
use crate::types::model_type::ModelTypeSet;

/// Error category carried in a server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncProtocolErrorType {
    Success,
    NotMyBirthday,
    Throttled,
    ClearPending,
    TransientError,
    NonRetriableError,
    MigrationDone,
    InvalidCredential,
    DisabledByAdmin,
    #[default]
    UnknownError,
}

impl_wire_name_conversions!(SyncProtocolErrorType {
    Success => "success",
    NotMyBirthday => "not_my_birthday",
    Throttled => "throttled",
    ClearPending => "clear_pending",
    TransientError => "transient_error",
    NonRetriableError => "non_retriable_error",
    MigrationDone => "migration_done",
    InvalidCredential => "invalid_credential",
    DisabledByAdmin => "disabled_by_admin",
    UnknownError => "unknown_error",
});

/// What the server wants the client to do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAction {
    UpgradeClient,
    ClearUserDataAndResync,
    EnableSyncOnAccount,
    StopAndRestartSync,
    DisableSyncOnClient,
    #[default]
    UnknownAction,
}

impl_wire_name_conversions!(ClientAction {
    UpgradeClient => "upgrade_client",
    ClearUserDataAndResync => "clear_user_data_and_resync",
    EnableSyncOnAccount => "enable_sync_on_account",
    StopAndRestartSync => "stop_and_restart_sync",
    DisableSyncOnClient => "disable_sync_on_client",
    UnknownAction => "unknown_action",
});

/// Protocol-level error reported by the server for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncProtocolError {
    pub error_type: SyncProtocolErrorType,
    pub error_description: String,
    pub url: String,
    pub action: ClientAction,
    pub error_data_types: ModelTypeSet,
}

impl SyncProtocolError {
    pub fn new(error_type: SyncProtocolErrorType, action: ClientAction) -> Self {
        Self { error_type, action, ..Self::default() }
    }

    /// Whether the in-flight cycle must stop at the next step boundary.
    pub const fn requires_early_exit(&self) -> bool {
        matches!(
            self.error_type,
            SyncProtocolErrorType::NotMyBirthday
                | SyncProtocolErrorType::ClearPending
                | SyncProtocolErrorType::DisabledByAdmin
                | SyncProtocolErrorType::InvalidCredential
        )
    }

    /// Whether the error carries an action the embedder has to act on.
    pub fn is_actionable(&self) -> bool {
        self.action != ClientAction::UnknownAction
    }

    /// Whether syncing can never succeed again without outside intervention.
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self.error_type,
            SyncProtocolErrorType::NotMyBirthday | SyncProtocolErrorType::DisabledByAdmin
        ) || matches!(self.action, ClientAction::DisableSyncOnClient)
    }
}

/// Result of one syncer command (download, commit, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncerError {
    #[default]
    Unset,
    CannotDoWork,
    NetworkConnectionUnavailable,
    NetworkIoError,
    SyncServerError,
    SyncAuthError,
    ServerReturnInvalidCredential,
    ServerReturnUnknownError,
    ServerReturnThrottled,
    ServerReturnTransientError,
    ServerReturnMigrationDone,
    ServerReturnClearPending,
    ServerReturnNotMyBirthday,
    ServerReturnConflict,
    ServerResponseValidationFailed,
    SyncerOk,
}

impl_wire_name_conversions!(SyncerError {
    Unset => "unset",
    CannotDoWork => "cannot_do_work",
    NetworkConnectionUnavailable => "network_connection_unavailable",
    NetworkIoError => "network_io_error",
    SyncServerError => "sync_server_error",
    SyncAuthError => "sync_auth_error",
    ServerReturnInvalidCredential => "server_return_invalid_credential",
    ServerReturnUnknownError => "server_return_unknown_error",
    ServerReturnThrottled => "server_return_throttled",
    ServerReturnTransientError => "server_return_transient_error",
    ServerReturnMigrationDone => "server_return_migration_done",
    ServerReturnClearPending => "server_return_clear_pending",
    ServerReturnNotMyBirthday => "server_return_not_my_birthday",
    ServerReturnConflict => "server_return_conflict",
    ServerResponseValidationFailed => "server_response_validation_failed",
    SyncerOk => "syncer_ok",
});

impl SyncerError {
    /// `Unset` and `SyncerOk` are the only non-error values.
    pub const fn is_error(self) -> bool {
        !matches!(self, Self::Unset | Self::SyncerOk)
    }

    pub const fn is_network_or_server_error(self) -> bool {
        matches!(
            self,
            Self::NetworkConnectionUnavailable | Self::NetworkIoError | Self::SyncServerError
        )
    }
}

/// Last known status of the connection to the sync server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerConnectionCode {
    #[default]
    NoConnection,
    ConnectionUnavailable,
    IoError,
    SyncServerError,
    SyncAuthError,
    ServerConnectionOk,
    RetryServer,
}

impl_wire_name_conversions!(ServerConnectionCode {
    NoConnection => "no_connection",
    ConnectionUnavailable => "connection_unavailable",
    IoError => "io_error",
    SyncServerError => "sync_server_error",
    SyncAuthError => "sync_auth_error",
    ServerConnectionOk => "server_connection_ok",
    RetryServer => "retry_server",
});
