//! Scheduler error types

use std::time::Duration;

use cadence_common::{impl_error_classification, BackoffError, CommonError, ErrorSeverity};
use cadence_domain::CadenceError;
use thiserror::Error;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Backoff settings could not be turned into a policy
    #[error("Invalid backoff policy: {0}")]
    InvalidPolicy(#[from] BackoffError),

    /// The worker task is not alive
    #[error("Scheduler not running")]
    NotRunning,

    /// The operation needs `start` to have been called
    #[error("Scheduler not started")]
    NotStarted,

    /// The operation is only valid in another mode
    #[error("Operation requires {expected} mode")]
    WrongMode { expected: &'static str },

    /// The worker dropped the command channel or a reply
    #[error("Scheduler command channel closed")]
    ChannelClosed,

    /// Operation timed out
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl_error_classification!(SchedulerError, Common,
    Self::InvalidPolicy(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::NotRunning | Self::ChannelClosed => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::NotStarted | Self::WrongMode { .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::Timeout { .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::TaskJoinFailed(_) => {
        retryable: false,
        severity: ErrorSeverity::Critical,
        critical: true,
    }
);

impl From<SchedulerError> for CadenceError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::InvalidPolicy(_) => Self::Config(err.to_string()),
            SchedulerError::NotStarted | SchedulerError::WrongMode { .. } => {
                Self::InvalidState(err.to_string())
            },
            SchedulerError::NotRunning | SchedulerError::ChannelClosed => {
                Self::Stopped(err.to_string())
            },
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SchedulerError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::ChannelClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for SchedulerError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::ChannelClosed
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use cadence_common::ErrorClassification;

    use super::*;

    #[test]
    fn mode_errors_map_to_invalid_state() {
        let err: CadenceError = SchedulerError::WrongMode { expected: "configuration" }.into();
        assert_eq!(err, CadenceError::InvalidState("Operation requires configuration mode".into()));
    }

    #[test]
    fn closed_channel_maps_to_stopped() {
        let err: CadenceError = SchedulerError::ChannelClosed.into();
        assert!(matches!(err, CadenceError::Stopped(_)));
    }

    #[test]
    fn join_failure_is_critical() {
        let err = SchedulerError::TaskJoinFailed("panicked".into());
        assert!(err.is_critical());
        assert!(!err.is_retryable());
        assert!(SchedulerError::Timeout { duration: Duration::from_secs(5) }.is_retryable());
    }
}
