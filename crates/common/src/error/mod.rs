//! Common error types and classification
//!
//! Every error enum in the workspace implements [`ErrorClassification`] so the
//! CLI and any future UI can decide how to present a failure without matching
//! on concrete variants:
//!
//! - **`is_retryable()`**: may the *caller* retry? The session flow never
//!   retries on its own; a retryable session error means "start the flow
//!   again".
//! - **`severity()`**: [`ErrorSeverity`] for logging and alerting.
//! - **`is_critical()`**: integrity or security problem.
//! - **`retry_after()`**: suggested delay, when one is known.
//!
//! [`CommonError`] covers the cross-cutting failures (configuration and
//! serialization). Module errors compose it with
//! `#[error(transparent)] Common(#[from] CommonError)` rather than
//! duplicating those variants.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Cross-cutting error variants shared by the workspace crates
#[derive(Debug, Clone, Error)]
pub enum CommonError {
    /// Invalid or missing configuration
    #[error("Configuration error{}: {message}", field_suffix(.field.as_deref()))]
    Config { message: String, field: Option<String> },

    /// Encoding or decoding failure
    #[error("Serialization error{}: {message}", format_suffix(.format.as_deref()))]
    Serialization { message: String, format: Option<String> },
}

fn field_suffix(field: Option<&str>) -> String {
    field.map(|f| format!(" in field '{f}'")).unwrap_or_default()
}

fn format_suffix(format: Option<&str>) -> String {
    format.map(|f| format!(" ({f})")).unwrap_or_default()
}

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

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    /// Create a configuration error for a specific field
    pub fn config_field<S: Into<String>, F: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a serialization error with format information
    pub fn serialization_format<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }
}

/// Error classification trait for consistent error handling across modules
pub trait ErrorClassification {
    /// Whether the caller may reasonably try the operation again
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for logging and alerting decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    ///
    /// Critical errors indicate security problems (forged callbacks,
    /// missing entropy) or internal invariant violations.
    fn is_critical(&self) -> bool;

    /// Suggested retry delay, if any
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error.
    use super::*;

    /// Validates `CommonError::config_field` behavior for the error config with
    /// field scenario.
    ///
    /// Assertions:
    /// - Confirms the field name is rendered in the message.
    #[test]
    fn test_error_config_with_field() {
        let err = CommonError::config_field("request_timeout_secs", "must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error in field 'request_timeout_secs': must be positive"
        );
    }

    /// Validates `CommonError` classification for configuration errors.
    ///
    /// Assertions:
    /// - Ensures configuration errors are neither retryable nor critical.
    /// - Confirms `err.severity()` equals `ErrorSeverity::Error`.
    #[test]
    fn test_error_config_classification() {
        let err = CommonError::config_field("client_id", "must not be empty");
        assert!(!err.is_retryable());
        assert!(!err.is_critical());
        assert_eq!(err.severity(), ErrorSeverity::Error);
        assert_eq!(err.retry_after(), None);
    }

    /// Validates `From<serde_json::Error>` behavior for the json conversion
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures the converted error is a `Serialization` variant tagged JSON.
    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CommonError = json_err.into();
        assert!(matches!(
            err,
            CommonError::Serialization { format: Some(ref f), .. } if f == "JSON"
        ));
    }

    /// Validates `ErrorSeverity` ordering for the severity comparison scenario.
    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
    }
}
