//! Session flow errors

use std::time::Duration;

use thiserror::Error;

use super::claims::TokenDecodeError;
use super::client::TokenClientError;
use super::pkce::PkceError;
use super::types::Role;
use crate::error::{ErrorClassification, ErrorSeverity};
use crate::storage::StoreError;

/// Broad failure classes a UI reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// Forged, incomplete or denied callback; restart the flow
    Protocol,
    /// Token endpoint failure or unreachable server; restart the flow
    Transport,
    /// Token could not be decoded; treated as an invalid token
    Decode,
    /// Interactive authorization is required
    NoRefreshToken,
    /// Persisted state could not be read or written
    Storage,
    /// Authenticated user lacks a role
    Authorization,
    /// Operation was overtaken by logout, cancelled, or misused
    Internal,
}

/// Error type for session manager operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authorization callback is missing the '{0}' parameter")]
    MissingParameter(&'static str),

    #[error("authorization callback state does not match the pending request")]
    StateMismatch,

    #[error("no PKCE code verifier is pending for this callback")]
    MissingVerifier,

    #[error("authorization server denied the request: {error}{}", describe(.description.as_deref()))]
    AuthorizationDenied { error: String, description: Option<String> },

    #[error("token endpoint returned HTTP {status}: {body}")]
    TokenExchange { status: u16, body: String },

    #[error("token endpoint unreachable: {0}")]
    Network(String),

    #[error("token endpoint response could not be parsed: {0}")]
    MalformedResponse(String),

    #[error("issued token could not be decoded: {0}")]
    TokenDecode(#[from] TokenDecodeError),

    #[error("no refresh token is stored; interactive login required")]
    NoRefreshToken,

    #[error("secure random source unavailable: {0}")]
    CryptoUnavailable(String),

    #[error("session storage failed: {0}")]
    Storage(#[from] StoreError),

    #[error("session changed while the request was in flight; result discarded")]
    Superseded,

    #[error("operation was cancelled")]
    Cancelled,

    #[error("the current user does not have the '{required}' role")]
    Forbidden { required: Role },

    #[error("request body cannot be cloned for authentication")]
    RequestNotCloneable,

    #[error("token client misconfigured: {0}")]
    Config(String),
}

fn describe(description: Option<&str>) -> String {
    description.map(|d| format!(" ({d})")).unwrap_or_default()
}

impl From<TokenClientError> for SessionError {
    fn from(err: TokenClientError) -> Self {
        match err {
            TokenClientError::TokenExchange { status, body } => Self::TokenExchange { status, body },
            TokenClientError::Network { message, .. } => Self::Network(message),
            TokenClientError::MalformedResponse(msg) => Self::MalformedResponse(msg),
            TokenClientError::Config(msg) => Self::Config(msg),
        }
    }
}

impl From<PkceError> for SessionError {
    fn from(err: PkceError) -> Self {
        match err {
            PkceError::CryptoUnavailable(msg) => Self::CryptoUnavailable(msg),
        }
    }
}

impl SessionError {
    /// Failure class for presentation
    #[must_use]
    pub fn kind(&self) -> SessionErrorKind {
        match self {
            Self::MissingParameter(_)
            | Self::StateMismatch
            | Self::MissingVerifier
            | Self::AuthorizationDenied { .. } => SessionErrorKind::Protocol,
            Self::TokenExchange { .. } | Self::Network(_) | Self::MalformedResponse(_) => {
                SessionErrorKind::Transport
            }
            Self::TokenDecode(_) => SessionErrorKind::Decode,
            Self::NoRefreshToken => SessionErrorKind::NoRefreshToken,
            Self::Storage(_) => SessionErrorKind::Storage,
            Self::Forbidden { .. } => SessionErrorKind::Authorization,
            Self::CryptoUnavailable(_)
            | Self::Superseded
            | Self::Cancelled
            | Self::RequestNotCloneable
            | Self::Config(_) => SessionErrorKind::Internal,
        }
    }

    /// Whether the user should be sent back through interactive login
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(
            self.kind(),
            SessionErrorKind::Protocol
                | SessionErrorKind::Transport
                | SessionErrorKind::Decode
                | SessionErrorKind::NoRefreshToken
        )
    }
}

impl ErrorClassification for SessionError {
    /// Retryable means "the caller may start the flow again"; the session
    /// manager itself never retries.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_retryable(),
            Self::Cancelled | Self::Superseded => true,
            _ => self.requires_login(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::StateMismatch | Self::CryptoUnavailable(_) => ErrorSeverity::Critical,
            Self::Storage(e) => e.severity(),
            Self::Superseded | Self::Cancelled | Self::NoRefreshToken => ErrorSeverity::Info,
            Self::AuthorizationDenied { .. } | Self::Forbidden { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}
