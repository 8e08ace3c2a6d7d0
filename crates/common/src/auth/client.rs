//! Token endpoint client
//!
//! Performs the authorization-code and refresh-token grants against the
//! authorization server as a public client: form-encoded bodies, no client
//! secret, no Basic auth. Every call is bounded by the configured timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::traits::TokenEndpoint;
use super::types::{OAuthConfig, OAuthError, TokenResponse};

/// Error type for token endpoint calls
#[derive(Debug, Clone, Error)]
pub enum TokenClientError {
    /// The server answered with a non-2xx status
    #[error("token endpoint returned HTTP {status}: {body}")]
    TokenExchange { status: u16, body: String },

    /// The request never produced a response (connect failure, timeout)
    #[error("token endpoint unreachable: {message}")]
    Network { message: String, timed_out: bool },

    /// A 2xx response whose body is not a token response
    #[error("token endpoint response could not be parsed: {0}")]
    MalformedResponse(String),

    /// Invalid token URL or HTTP client settings
    #[error("token client misconfigured: {0}")]
    Config(String),
}

impl TokenClientError {
    /// The RFC 6749 error object carried by a `TokenExchange` body, if any
    #[must_use]
    pub fn oauth_error(&self) -> Option<OAuthError> {
        match self {
            Self::TokenExchange { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TokenClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network { message: err.to_string(), timed_out: err.is_timeout() }
    }
}

/// reqwest-backed [`TokenEndpoint`]
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: Client,
    token_url: Url,
}

impl TokenClient {
    /// Create a client for `token_url` with a per-request timeout
    ///
    /// # Errors
    /// Returns [`TokenClientError::Config`] if the URL does not parse or the
    /// HTTP client cannot be built.
    pub fn new(token_url: &str, timeout: Duration) -> Result<Self, TokenClientError> {
        let token_url = Url::parse(token_url)
            .map_err(|e| TokenClientError::Config(format!("invalid token URL '{token_url}': {e}")))?;
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("shopdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TokenClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, token_url })
    }

    /// Create a client from the OAuth configuration
    ///
    /// # Errors
    /// See [`TokenClient::new`].
    pub fn from_config(config: &OAuthConfig) -> Result<Self, TokenClientError> {
        Self::new(&config.token_url(), config.request_timeout)
    }

    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    async fn post_grant(
        &self,
        grant_type: &'static str,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, TokenClientError> {
        debug!(grant_type, url = %self.token_url, "posting token request");

        let response = self
            .http
            .post(self.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(params)
            .send()
            .await
            .map_err(|e| {
                warn!(grant_type, timed_out = e.is_timeout(), error = %e, "token request failed");
                TokenClientError::from(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(grant_type, status = status.as_u16(), "token endpoint rejected request");
            return Err(TokenClientError::TokenExchange { status: status.as_u16(), body });
        }

        let tokens: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| TokenClientError::MalformedResponse(e.to_string()))?;

        debug!(
            grant_type,
            has_refresh_token = tokens.refresh_token.is_some(),
            "token endpoint issued tokens"
        );
        Ok(tokens)
    }
}

#[async_trait]
impl TokenEndpoint for TokenClient {
    async fn exchange_authorization_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
        client_id: &str,
    ) -> Result<TokenResponse, TokenClientError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
            ("code_verifier", code_verifier),
        ];
        self.post_grant("authorization_code", &params).await
    }

    async fn refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> Result<TokenResponse, TokenClientError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
        ];
        self.post_grant("refresh_token", &params).await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::client.
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn client_for(server: &MockServer) -> TokenClient {
        TokenClient::new(&format!("{}/oauth2/token", server.uri()), Duration::from_secs(5))
            .expect("client")
    }

    /// Validates `TokenClient::exchange_authorization_code` behavior for the
    /// public client form body scenario.
    ///
    /// Assertions:
    /// - Confirms every required form field is sent.
    /// - Ensures no `Authorization` header and no `client_secret` are sent.
    #[tokio::test]
    async fn test_exchange_sends_public_client_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code"))
            .and(body_string_contains("code_verifier=verifier-1"))
            .and(body_string_contains("client_id=dashboard"))
            .and(body_string_contains(
                "redirect_uri=http%3A%2F%2Flocalhost%3A4200%2Fcallback",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-1",
                "refresh_token": "rt-1",
                "token_type": "Bearer",
                "expires_in": 300
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let tokens = client
            .exchange_authorization_code(
                "auth-code",
                "verifier-1",
                "http://localhost:4200/callback",
                "dashboard",
            )
            .await
            .expect("exchange");

        assert_eq!(tokens.access_token, "at-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));

        let requests = server.received_requests().await.expect("recording enabled");
        let request = &requests[0];
        assert!(request.headers.get("authorization").is_none());
        assert!(!String::from_utf8_lossy(&request.body).contains("client_secret"));
    }

    /// Validates `TokenClient::refresh_token` behavior for the error status
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms a 400 surfaces as `TokenExchange` with status and body.
    /// - Confirms the RFC 6749 error object is recoverable from the body.
    #[tokio::test]
    async fn test_refresh_error_status_surfaces_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-old"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "refresh token revoked"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.refresh_token("rt-old", "dashboard").await.unwrap_err();

        match &err {
            TokenClientError::TokenExchange { status, body } => {
                assert_eq!(*status, 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.oauth_error().map(|e| e.error).as_deref(), Some("invalid_grant"));
    }

    /// Validates `TokenClient` behavior for the malformed success body
    /// scenario.
    #[tokio::test]
    async fn test_success_without_access_token_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "Bearer"})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.refresh_token("rt", "dashboard").await.unwrap_err();
        assert!(matches!(err, TokenClientError::MalformedResponse(_)));
    }

    /// Validates `TokenClient` behavior for the timeout scenario.
    ///
    /// Assertions:
    /// - Confirms a response slower than the timeout yields `Network` with
    ///   `timed_out` set.
    #[tokio::test]
    async fn test_timeout_maps_to_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "late"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client =
            TokenClient::new(&format!("{}/oauth2/token", server.uri()), Duration::from_millis(200))
                .expect("client");
        let err = client.refresh_token("rt", "dashboard").await.unwrap_err();
        assert!(matches!(err, TokenClientError::Network { timed_out: true, .. }), "{err:?}");
    }

    /// Validates `TokenClient` behavior for the unreachable server scenario.
    #[tokio::test]
    async fn test_connection_refused_maps_to_network_error() {
        let client = TokenClient::new("http://127.0.0.1:9/oauth2/token", Duration::from_secs(2))
            .expect("client");
        let err = client.refresh_token("rt", "dashboard").await.unwrap_err();
        assert!(matches!(err, TokenClientError::Network { .. }));
    }

    #[test]
    fn test_invalid_token_url_is_config_error() {
        let err = TokenClient::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TokenClientError::Config(_)));
    }
}
