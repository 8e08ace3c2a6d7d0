//! API-specific error types
//!
//! Provides error classification for dashboard API calls with retry metadata.

use std::time::Duration;

use shopdesk_common::auth::SessionError;
use shopdesk_common::error::{ErrorClassification, ErrorSeverity};
use thiserror::Error;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// 401/403; a fresh token or another account is needed
    Authentication,
    /// 429
    RateLimit,
    /// 5xx
    Server,
    /// Other 4xx and undecodable bodies
    Client,
    /// Connection failures and timeouts
    Network,
    /// Bad settings or session plumbing failures
    Config,
}

/// Dashboard API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{url} rejected the access token (401)")]
    Unauthorized { url: String },

    #[error("{url} refused access (403)")]
    Forbidden { url: String },

    #[error("Rate limit exceeded at {url}")]
    RateLimit { url: String, retry_after: Option<Duration> },

    #[error("Server error {status} from {url}: {body}")]
    Server { status: u16, url: String, body: String },

    #[error("Client error {status} from {url}: {body}")]
    Client { status: u16, url: String, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    /// Get the error category for this error
    #[must_use]
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Unauthorized { .. } | Self::Forbidden { .. } => ApiErrorCategory::Authentication,
            Self::RateLimit { .. } => ApiErrorCategory::RateLimit,
            Self::Server { .. } => ApiErrorCategory::Server,
            Self::Client { .. } | Self::Decode { .. } => ApiErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::Config(_) | Self::Session(_) => ApiErrorCategory::Config,
        }
    }

    /// Whether repeating the same call may succeed
    ///
    /// Authentication failures are not retryable here: the client does not
    /// refresh on 401, so the caller must refresh or sign in first.
    #[must_use]
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::RateLimit | ApiErrorCategory::Server | ApiErrorCategory::Network
        )
    }

    /// Suggested delay before retrying, in seconds
    #[must_use]
    pub fn retry_delay_secs(&self) -> u64 {
        match self {
            Self::RateLimit { retry_after: Some(after), .. } => after.as_secs(),
            _ => match self.category() {
                ApiErrorCategory::RateLimit => 60,
                ApiErrorCategory::Server => 10,
                ApiErrorCategory::Network => 5,
                ApiErrorCategory::Authentication
                | ApiErrorCategory::Client
                | ApiErrorCategory::Config => 0,
            },
        }
    }

    /// Whether the user has to sign in again before this call can work
    #[must_use]
    pub fn requires_login(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => true,
            Self::Session(e) => e.requires_login(),
            _ => false,
        }
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        self.should_retry()
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Session(e) => e.severity(),
            Self::Unauthorized { .. } | Self::Forbidden { .. } | Self::RateLimit { .. } => {
                ErrorSeverity::Warning
            }
            _ => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    fn retry_after(&self) -> Option<Duration> {
        self.should_retry().then(|| Duration::from_secs(self.retry_delay_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(status: u16) -> ApiError {
        ApiError::Server { status, url: "http://api/orders".into(), body: String::new() }
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ApiError::Unauthorized { url: "u".into() }.category(),
            ApiErrorCategory::Authentication
        );
        assert_eq!(
            ApiError::RateLimit { url: "u".into(), retry_after: None }.category(),
            ApiErrorCategory::RateLimit
        );
        assert_eq!(server(502).category(), ApiErrorCategory::Server);
        assert_eq!(ApiError::Network("reset".into()).category(), ApiErrorCategory::Network);
        assert_eq!(
            ApiError::Decode { url: "u".into(), message: "eof".into() }.category(),
            ApiErrorCategory::Client
        );
        assert_eq!(
            ApiError::from(SessionError::RequestNotCloneable).category(),
            ApiErrorCategory::Config
        );
    }

    #[test]
    fn test_should_retry() {
        assert!(server(503).should_retry());
        assert!(ApiError::Timeout(Duration::from_secs(1)).should_retry());
        assert!(!ApiError::Unauthorized { url: "u".into() }.should_retry());
        assert!(!ApiError::Client { status: 404, url: "u".into(), body: String::new() }
            .should_retry());
        assert!(!ApiError::Config("bad url".into()).should_retry());
    }

    #[test]
    fn test_retry_delays() {
        assert_eq!(
            ApiError::RateLimit { url: "u".into(), retry_after: Some(Duration::from_secs(7)) }
                .retry_delay_secs(),
            7
        );
        assert_eq!(ApiError::RateLimit { url: "u".into(), retry_after: None }.retry_delay_secs(), 60);
        assert_eq!(server(500).retry_delay_secs(), 10);
        assert_eq!(ApiError::Network("dns".into()).retry_delay_secs(), 5);
        assert_eq!(server(500).retry_after(), Some(Duration::from_secs(10)));
        assert_eq!(ApiError::Forbidden { url: "u".into() }.retry_after(), None);
    }

    #[test]
    fn test_requires_login() {
        assert!(ApiError::Unauthorized { url: "u".into() }.requires_login());
        assert!(!ApiError::Forbidden { url: "u".into() }.requires_login());
        assert!(ApiError::from(SessionError::NoRefreshToken).requires_login());
    }
}
