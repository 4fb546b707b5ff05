// Error types for backoff module
use std::time::Duration;

use thiserror::Error;

use crate::error::{CommonError, ErrorSeverity};
use crate::impl_error_classification;

/// Errors raised while building a backoff policy
#[derive(Debug, Error)]
pub enum BackoffError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("initial delay ({initial:?}) cannot be greater than max delay ({max:?})")]
    InvertedBounds { initial: Duration, max: Duration },

    #[error("multiplier must be finite and greater than 1, got {0}")]
    InvalidMultiplier(f64),
}

impl_error_classification!(BackoffError, Common,
    Self::InvertedBounds { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::InvalidMultiplier(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    }
);

impl From<BackoffError> for CommonError {
    fn from(err: BackoffError) -> Self {
        match err {
            BackoffError::Common(e) => e,
            other => CommonError::config(other.to_string()),
        }
    }
}

/// Result type for backoff operations
pub type BackoffResult<T> = Result<T, BackoffError>;
