//! Scripted token endpoint
//!
//! [`MockTokenEndpoint`] stands in for the authorization server in session
//! tests: responses are queued per grant, calls are recorded, and a gate can
//! hold responses back so tests can interleave logout or a second request
//! with an exchange that is still in flight.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::auth::pkce::verify_code_challenge;
use crate::auth::{TokenClientError, TokenEndpoint, TokenResponse};

type Scripted = Mutex<VecDeque<Result<TokenResponse, TokenClientError>>>;

/// A recorded authorization-code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeCall {
    pub code: String,
    pub code_verifier: String,
    pub redirect_uri: String,
    pub client_id: String,
}

/// A recorded refresh grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCall {
    pub refresh_token: String,
    pub client_id: String,
}

/// In-memory [`TokenEndpoint`] with scripted responses
///
/// An empty queue answers with HTTP 500 so a missing script fails loudly.
#[derive(Debug, Default)]
pub struct MockTokenEndpoint {
    exchange_responses: Scripted,
    refresh_responses: Scripted,
    exchanges: Mutex<Vec<ExchangeCall>>,
    refreshes: Mutex<Vec<RefreshCall>>,
    expected_challenge: Mutex<Option<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
    started: Arc<Notify>,
}

impl MockTokenEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next authorization-code response
    pub fn push_exchange(&self, response: Result<TokenResponse, TokenClientError>) {
        self.exchange_responses.lock().push_back(response);
    }

    /// Queue the next refresh response
    pub fn push_refresh(&self, response: Result<TokenResponse, TokenClientError>) {
        self.refresh_responses.lock().push_back(response);
    }

    /// Reject exchanges whose verifier does not hash to `challenge`, the way
    /// the authorization server checks PKCE
    pub fn require_code_challenge(&self, challenge: impl Into<String>) {
        *self.expected_challenge.lock() = Some(challenge.into());
    }

    /// Hold every response until the returned gate is notified
    ///
    /// Call `notify_one()` once per held request.
    pub fn hold_responses(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Notified each time a request reaches the endpoint
    #[must_use]
    pub fn started(&self) -> Arc<Notify> {
        Arc::clone(&self.started)
    }

    #[must_use]
    pub fn exchanges(&self) -> Vec<ExchangeCall> {
        self.exchanges.lock().clone()
    }

    #[must_use]
    pub fn refreshes(&self) -> Vec<RefreshCall> {
        self.refreshes.lock().clone()
    }

    async fn respond(&self, queue: &Scripted) -> Result<TokenResponse, TokenClientError> {
        self.started.notify_one();
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        queue.lock().pop_front().unwrap_or_else(|| {
            Err(TokenClientError::TokenExchange {
                status: 500,
                body: "no scripted response".to_string(),
            })
        })
    }
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn exchange_authorization_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
        client_id: &str,
    ) -> Result<TokenResponse, TokenClientError> {
        self.exchanges.lock().push(ExchangeCall {
            code: code.to_string(),
            code_verifier: code_verifier.to_string(),
            redirect_uri: redirect_uri.to_string(),
            client_id: client_id.to_string(),
        });

        let expected = self.expected_challenge.lock().clone();
        if let Some(challenge) = expected {
            if !verify_code_challenge(code_verifier, &challenge) {
                return Err(TokenClientError::TokenExchange {
                    status: 400,
                    body: r#"{"error":"invalid_grant","error_description":"PKCE verification failed"}"#
                        .to_string(),
                });
            }
        }

        self.respond(&self.exchange_responses).await
    }

    async fn refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> Result<TokenResponse, TokenClientError> {
        self.refreshes.lock().push(RefreshCall {
            refresh_token: refresh_token.to_string(),
            client_id: client_id.to_string(),
        });
        self.respond(&self.refresh_responses).await
    }
}
