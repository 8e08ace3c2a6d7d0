//! Outbound request authenticator
//!
//! Attaches `Authorization: Bearer <token>` to dashboard API requests. Calls
//! to the authorization server itself, and anything aimed at its token path,
//! pass through untouched so credentials never leak into the grant exchange.
//!
//! The authenticator never refreshes, retries, or checks expiry; a 401 from
//! the API is the caller's concern.

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Request;
use tracing::{debug, warn};
use url::Url;

use super::error::SessionError;
use super::types::OAuthConfig;
use crate::storage::{keys, SessionStore};

/// Adds the stored bearer token to outgoing requests
pub struct RequestAuthenticator<S: ?Sized> {
    store: Arc<S>,
    authorization_server: Url,
    token_path: String,
}

impl<S: ?Sized> Clone for RequestAuthenticator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            authorization_server: self.authorization_server.clone(),
            token_path: self.token_path.clone(),
        }
    }
}

impl<S: SessionStore + ?Sized> RequestAuthenticator<S> {
    /// # Errors
    /// Returns [`SessionError::Config`] if the authorization server URL does
    /// not parse.
    pub fn new(store: Arc<S>, config: &OAuthConfig) -> Result<Self, SessionError> {
        let authorization_server =
            config.authorization_server_url().map_err(|e| SessionError::Config(e.to_string()))?;
        Ok(Self { store, authorization_server, token_path: config.token_path.clone() })
    }

    /// Whether `url` must be sent without credentials
    #[must_use]
    pub fn is_excluded(&self, url: &Url) -> bool {
        let same_origin = url.host_str().is_some()
            && url.host_str() == self.authorization_server.host_str()
            && url.port_or_known_default() == self.authorization_server.port_or_known_default();
        same_origin || (!self.token_path.is_empty() && url.path().contains(&self.token_path))
    }

    /// Return a copy of `request`, with the bearer token when one applies
    ///
    /// The input is never mutated. Excluded requests and requests made while
    /// no token is stored come back unchanged.
    ///
    /// # Errors
    /// - [`SessionError::RequestNotCloneable`] if the body is a stream
    /// - [`SessionError::Storage`] if the token cannot be read
    pub fn authenticate(&self, request: &Request) -> Result<Request, SessionError> {
        let mut outgoing = request.try_clone().ok_or(SessionError::RequestNotCloneable)?;

        if self.is_excluded(outgoing.url()) {
            debug!(url = %outgoing.url(), "request bypasses authentication");
            return Ok(outgoing);
        }

        let Some(token) = self.store.get(keys::ACCESS_TOKEN)? else {
            return Ok(outgoing);
        };

        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                outgoing.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(e) => warn!(error = %e, "stored access token is not a valid header value"),
        }
        Ok(outgoing)
    }
}
