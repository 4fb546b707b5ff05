//! Shared error base and classification
//!
//! Layer errors wrap [`CommonError`] through a transparent `Common` variant
//! and implement [`ErrorClassification`] with [`impl_error_classification!`],
//! so a caller can tell a retryable scheduler failure from a broken setup
//! without matching on each layer's variants.
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum PolicyError {
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//!
//!     #[error("ceiling below floor")]
//!     Inverted,
//! }
//!
//! impl_error_classification!(PolicyError, Common,
//!     Self::Inverted => {
//!         retryable: false,
//!         severity: ErrorSeverity::Error,
//!         critical: false,
//!     }
//! );
//! ```

use std::fmt;

/// Failures shared by every layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// A setting is missing, out of range, or inconsistent with another.
    Config { message: String, field: Option<String> },
}

impl CommonError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Configuration error pinned to one setting.
    pub fn config_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message, field: Some(field) } => {
                write!(f, "Configuration error in field '{field}': {message}")
            },
            Self::Config { message, field: None } => write!(f, "Configuration error: {message}"),
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    fn is_critical(&self) -> bool {
        false
    }
}

/// Retry and alerting view of an error.
pub trait ErrorClassification {
    /// Whether repeating the same call may succeed.
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    /// Whether an invariant was violated.
    fn is_critical(&self) -> bool;
}

/// How loudly an error should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// Implements [`ErrorClassification`] for a layer error, delegating the
/// wrapped [`CommonError`] variant and listing the remaining variants.
#[macro_export]
macro_rules! impl_error_classification {
    (
        $error_type:ty,
        $common_variant:ident
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::is_retryable(e),
                    $($variant => $retryable,)*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::severity(e),
                    $($variant => $severity,)*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::is_critical(e),
                    $($variant => $critical,)*
                }
            }
        }
    };
}
