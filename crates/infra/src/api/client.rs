//! Dashboard API client
//!
//! Thin JSON client for the resource server. Every request passes through the
//! [`RequestAuthenticator`] just before it is sent, so the bearer token is
//! always the one currently in the session store.

use std::time::Duration;

use reqwest::{Client, Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shopdesk_common::auth::RequestAuthenticator;
use shopdesk_common::storage::SessionStore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::errors::ApiError;
use crate::config::ApiSettings;

/// Authenticated client for the dashboard API
pub struct ApiClient<S: SessionStore + ?Sized> {
    http: Client,
    base_url: Url,
    timeout: Duration,
    authenticator: RequestAuthenticator<S>,
}

impl<S: SessionStore + ?Sized> ApiClient<S> {
    /// Create a new API client
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the base URL does not parse or the
    /// HTTP client cannot be built.
    pub fn new(
        settings: &ApiSettings,
        authenticator: RequestAuthenticator<S>,
    ) -> Result<Self, ApiError> {
        // Trailing slash so relative joins stay under the base path.
        let mut base = settings.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| ApiError::Config(format!("invalid API base URL '{base}': {e}")))?;

        let http = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, base_url, timeout: settings.timeout(), authenticator })
    }

    /// Base URL requests are resolved against
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` against the base URL
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the joined URL is invalid.
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Config(format!("invalid API path '{path}': {e}")))
    }

    /// Execute a GET request
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be decoded
    #[instrument(skip(self), fields(path = %path))]
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.http.request(Method::GET, self.url(path)?).build().map_err(map_reqwest)?;
        self.send(request).await
    }

    /// Execute a POST request with a JSON body
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be decoded
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request =
            self.http.request(Method::POST, self.url(path)?).json(body).build().map_err(map_reqwest)?;
        self.send(request).await
    }

    /// Execute a DELETE request, discarding any response body
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    #[instrument(skip(self), fields(path = %path))]
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let request =
            self.http.request(Method::DELETE, self.url(path)?).build().map_err(map_reqwest)?;
        self.send::<serde_json::Value>(request).await.map(|_| ())
    }

    async fn send<T: DeserializeOwned>(&self, request: Request) -> Result<T, ApiError> {
        let request = self.authenticator.authenticate(&request)?;
        let url = request.url().to_string();
        debug!(method = %request.method(), url = %url, "API request");

        let response = self.http.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.timeout)
            } else {
                map_reqwest(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), url = %url, "API request failed");
            return Err(map_status_error(status, url, body, retry_after));
        }

        // No body by definition; callers expecting one get a decode error.
        let result = if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            serde_json::from_value(serde_json::Value::Null)
                .map_err(|e| ApiError::Decode { url: url.clone(), message: e.to_string() })?
        } else {
            let bytes = response.bytes().await.map_err(map_reqwest)?;
            let decoded = if bytes.is_empty() {
                serde_json::from_value(serde_json::Value::Null)
            } else {
                serde_json::from_slice(&bytes)
            };
            decoded.map_err(|e| ApiError::Decode { url: url.clone(), message: e.to_string() })?
        };

        info!(status = status.as_u16(), url = %url, "API request successful");
        Ok(result)
    }
}

fn map_status_error(
    status: StatusCode,
    url: String,
    body: String,
    retry_after: Option<Duration>,
) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized { url },
        StatusCode::FORBIDDEN => ApiError::Forbidden { url },
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimit { url, retry_after },
        s if s.is_server_error() => ApiError::Server { status: s.as_u16(), url, body },
        s => ApiError::Client { status: s.as_u16(), url, body },
    }
}

fn map_reqwest(err: reqwest::Error) -> ApiError {
    if err.is_builder() {
        ApiError::Config(err.to_string())
    } else if err.is_decode() {
        ApiError::Decode {
            url: err.url().map(ToString::to_string).unwrap_or_default(),
            message: err.to_string(),
        }
    } else {
        ApiError::Network(err.to_string())
    }
}
