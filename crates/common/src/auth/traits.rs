//! Traits for the token endpoint
//!
//! The session manager talks to the authorization server only through
//! [`TokenEndpoint`], so tests can script its answers.

use async_trait::async_trait;

use super::client::TokenClientError;
use super::types::TokenResponse;

/// Token endpoint operations for a public client
///
/// Both calls are a single form-encoded POST with no client secret and no
/// `Authorization` header.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// `grant_type=authorization_code`
    ///
    /// # Errors
    /// Returns [`TokenClientError::TokenExchange`] on a non-2xx response and
    /// [`TokenClientError::Network`] on transport failure or timeout.
    async fn exchange_authorization_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
        client_id: &str,
    ) -> Result<TokenResponse, TokenClientError>;

    /// `grant_type=refresh_token`
    ///
    /// # Errors
    /// Same failure modes as [`TokenEndpoint::exchange_authorization_code`].
    async fn refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> Result<TokenResponse, TokenClientError>;
}

#[async_trait]
impl<T: TokenEndpoint + ?Sized> TokenEndpoint for std::sync::Arc<T> {
    async fn exchange_authorization_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
        client_id: &str,
    ) -> Result<TokenResponse, TokenClientError> {
        (**self).exchange_authorization_code(code, code_verifier, redirect_uri, client_id).await
    }

    async fn refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> Result<TokenResponse, TokenClientError> {
        (**self).refresh_token(refresh_token, client_id).await
    }
}
