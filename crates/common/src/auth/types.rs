//! OAuth 2.0 types for the dashboard's authorization server
//!
//! Configuration, token endpoint payloads, the callback parameters and the
//! user profile derived from an access token.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CommonError;

/// Default authorization endpoint path (Spring Authorization Server layout)
pub const DEFAULT_AUTHORIZE_PATH: &str = "/oauth2/authorize";

/// Default token endpoint path
pub const DEFAULT_TOKEN_PATH: &str = "/oauth2/token";

/// Default timeout applied to token endpoint calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// OAuth configuration for a public (secret-less) client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    /// Base URL of the authorization server, e.g. `http://localhost:9000`
    pub authorization_server: String,

    /// Path of the authorization endpoint on `authorization_server`
    pub authorize_path: String,

    /// Path of the token endpoint on `authorization_server`
    pub token_path: String,

    /// OAuth client ID
    pub client_id: String,

    /// Redirect URI registered for the client
    pub redirect_uri: String,

    /// Scopes to request
    pub scopes: Vec<String>,

    /// Timeout for token endpoint calls
    pub request_timeout: Duration,
}

impl OAuthConfig {
    /// Create a configuration with the default endpoint paths and timeout
    #[must_use]
    pub fn new(
        authorization_server: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            authorization_server: authorization_server.into(),
            authorize_path: DEFAULT_AUTHORIZE_PATH.to_string(),
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the endpoint paths
    #[must_use]
    pub fn with_paths(
        mut self,
        authorize_path: impl Into<String>,
        token_path: impl Into<String>,
    ) -> Self {
        self.authorize_path = authorize_path.into();
        self.token_path = token_path.into();
        self
    }

    /// Override the token endpoint timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Full URL of the authorization endpoint
    #[must_use]
    pub fn authorization_url(&self) -> String {
        join_url(&self.authorization_server, &self.authorize_path)
    }

    /// Full URL of the token endpoint
    #[must_use]
    pub fn token_url(&self) -> String {
        join_url(&self.authorization_server, &self.token_path)
    }

    /// Get scopes as space-separated string
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Parsed authorization server base URL
    ///
    /// # Errors
    /// Returns `CommonError::Config` if the base URL does not parse.
    pub fn authorization_server_url(&self) -> Result<Url, CommonError> {
        Url::parse(&self.authorization_server).map_err(|e| {
            CommonError::config_field("authorization_server", format!("invalid URL: {e}"))
        })
    }

    /// Check that the configuration can drive a flow
    ///
    /// # Errors
    /// Returns `CommonError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<(), CommonError> {
        if self.client_id.trim().is_empty() {
            return Err(CommonError::config_field("client_id", "must not be empty"));
        }
        self.authorization_server_url()?;
        Url::parse(&self.redirect_uri).map_err(|e| {
            CommonError::config_field("redirect_uri", format!("invalid URL: {e}"))
        })?;
        if !self.token_path.starts_with('/') || !self.authorize_path.starts_with('/') {
            return Err(CommonError::config_field("token_path", "endpoint paths must start with '/'"));
        }
        if self.request_timeout.is_zero() {
            return Err(CommonError::config_field("request_timeout", "must be positive"));
        }
        Ok(())
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Token endpoint success response (RFC 6749 §5.1)
///
/// Only `access_token` is required. A missing `refresh_token` means "keep the
/// one you have".
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Response carrying only an access token
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            id_token: None,
            token_type: Some("Bearer".to_string()),
            expires_in: None,
            scope: None,
        }
    }

    /// Attach a refresh token
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// OAuth error response body (RFC 6749 §5.2 and §4.1.2.1)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}

/// Where to send the user to authorize, plus the state that was persisted
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Query parameters delivered to the redirect URI
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Successful-looking callback with a code and a state
    #[must_use]
    pub fn new(code: Option<&str>, state: Option<&str>) -> Self {
        Self {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            ..Self::default()
        }
    }

    /// Collect the relevant pairs from a decoded query string
    ///
    /// Empty values are treated as absent.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }
        params
    }

    /// Parse the full URL the browser was redirected to
    ///
    /// # Errors
    /// Returns `url::ParseError` if `redirect_url` is not an absolute URL.
    pub fn from_redirect_url(redirect_url: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(redirect_url)?;
        Ok(Self::from_pairs(url.query_pairs()))
    }
}

/// Dashboard role derived from token claims
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User profile derived from access token claims, never received directly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl UserProfile {
    /// Exact role check, as used by route guards
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}
