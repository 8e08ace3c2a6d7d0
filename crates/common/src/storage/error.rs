//! Session store error types

use std::time::Duration;

use thiserror::Error;

use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

/// Failure reading or writing persisted session state
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session store I/O failed during {operation}: {message}")]
    Io { operation: &'static str, message: String },

    #[error("Session store data is corrupt: {0}")]
    Corrupt(String),

    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Session store result type
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn io(operation: &'static str, err: &std::io::Error) -> Self {
        Self::Io { operation, message: err.to_string() }
    }
}

impl ErrorClassification for StoreError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Io { .. } | Self::Keychain(_) => true,
            Self::Corrupt(_) => false,
            Self::Common(e) => e.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io { .. } | Self::Keychain(_) => ErrorSeverity::Error,
            Self::Corrupt(_) => ErrorSeverity::Critical,
            Self::Common(e) => e.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        match self {
            Self::Corrupt(_) => true,
            Self::Common(e) => e.is_critical(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}
