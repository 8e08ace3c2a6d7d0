//! Session manager
//!
//! Owns the dashboard's authentication state and is the only component that
//! mutates it. Every transition is mirrored into the [`SessionStore`] and
//! published on a `watch` channel so views can react without polling.
//!
//! ```text
//!                 start_authorization_flow
//!   Anonymous ─────────────────────────────► AuthorizationPending
//!       ▲                                         │
//!       │  callback failure / logout              │ handle_authorization_callback
//!       │  expired token at restore               ▼
//!       └──────────────────────────────────── Authenticated ◄──┐
//!       ▲                                         │            │ success
//!       │ refresh failure                         ▼            │
//!       └───────────────────────────────────── Refreshing ─────┘
//! ```
//!
//! # Stale completions
//!
//! A generation counter lives behind the transition lock. Every applied
//! transition (session established, refreshed, reset, logged out) bumps it.
//! Network calls capture the generation before awaiting and, on completion,
//! apply their result only if it is unchanged; otherwise they return
//! [`SessionError::Superseded`] and touch nothing. A refresh that lands after
//! a logout therefore cannot resurrect the session.
//!
//! The lock is a `parking_lot` mutex and is never held across an `.await`.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::authenticator::RequestAuthenticator;
use super::claims::{decode_jwt, derive_user_profile, is_token_expired};
use super::error::SessionError;
use super::pkce::{validate_state, PkceChallenge};
use super::traits::TokenEndpoint;
use super::types::{AuthorizationRequest, CallbackParams, OAuthConfig, Role, TokenResponse, UserProfile};
use crate::error::CommonError;
use crate::storage::{keys, SessionStore, StoreError};

/// Authentication state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Anonymous,
    /// PKCE material stored, user sent to the authorization server
    AuthorizationPending,
    Authenticated,
    /// Authenticated, with a refresh in flight
    Refreshing,
}

impl SessionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::AuthorizationPending => "authorization_pending",
            Self::Authenticated => "authenticated",
            Self::Refreshing => "refreshing",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What subscribers observe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub user: Option<UserProfile>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn anonymous() -> Self {
        Self { state: SessionState::Anonymous, user: None }
    }

    /// Authenticated or refreshing with a known user
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        matches!(self.state, SessionState::Authenticated | SessionState::Refreshing)
            && self.user.is_some()
    }
}

/// Orchestrates the Authorization Code + PKCE flow and the session lifecycle
pub struct SessionManager<C, S: ?Sized> {
    config: OAuthConfig,
    endpoint: C,
    store: Arc<S>,
    generation: Mutex<u64>,
    state_tx: watch::Sender<SessionSnapshot>,
}

impl<C, S> SessionManager<C, S>
where
    C: TokenEndpoint,
    S: SessionStore + ?Sized,
{
    /// Create a manager in the `Anonymous` state
    ///
    /// Call [`SessionManager::restore`] afterwards to pick up a persisted
    /// session.
    pub fn new(config: OAuthConfig, endpoint: C, store: Arc<S>) -> Self {
        let (state_tx, _) = watch::channel(SessionSnapshot::anonymous());
        Self { config, endpoint, store, generation: Mutex::new(0), state_tx }
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn endpoint(&self) -> &C {
        &self.endpoint
    }

    /// Observe state changes
    ///
    /// The receiver starts with the current snapshot marked as seen.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_tx.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().state
    }

    #[must_use]
    pub fn current_user(&self) -> Option<UserProfile> {
        self.state_tx.borrow().user.clone()
    }

    /// Whether a non-expired access token is stored
    ///
    /// The store is the source of truth; storage errors count as "no".
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        match self.store.get(keys::ACCESS_TOKEN) {
            Ok(Some(token)) => !is_token_expired(&token),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "failed to read access token");
                false
            }
        }
    }

    /// The stored access token, expired or not
    ///
    /// # Errors
    /// Returns [`SessionError::Storage`] if the store cannot be read.
    pub fn access_token(&self) -> Result<Option<String>, SessionError> {
        Ok(self.store.get(keys::ACCESS_TOKEN)?)
    }

    /// Outbound request authenticator reading from this session's store
    ///
    /// # Errors
    /// Returns [`SessionError::Config`] if the authorization server URL does
    /// not parse.
    pub fn authenticator(&self) -> Result<RequestAuthenticator<S>, SessionError> {
        RequestAuthenticator::new(Arc::clone(&self.store), &self.config)
    }

    /// Exact role check against the current user
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.is_authenticated() && self.current_user().is_some_and(|u| u.has_role(role))
    }

    /// Route guard: the signed-in user, if they hold `role`
    ///
    /// # Errors
    /// Returns [`SessionError::Forbidden`] when nobody is signed in, the token
    /// has expired, or the user lacks the role.
    pub fn require_role(&self, role: Role) -> Result<UserProfile, SessionError> {
        match self.current_user() {
            Some(user) if self.is_authenticated() && user.has_role(role) => Ok(user),
            _ => {
                debug!(required = %role, "role check denied");
                Err(SessionError::Forbidden { required: role })
            }
        }
    }

    /// Rehydrate from the store at process start
    ///
    /// - Valid stored token: `Authenticated`, profile re-derived from it.
    /// - Expired or undecodable token: storage cleared, `Anonymous`.
    /// - No token but pending PKCE material: `AuthorizationPending`.
    ///
    /// # Errors
    /// Returns [`SessionError::Storage`] if the store cannot be read.
    pub fn restore(&self) -> Result<SessionState, SessionError> {
        let mut generation = self.generation.lock();

        let Some(token) = self.store.get(keys::ACCESS_TOKEN)? else {
            for key in [keys::REFRESH_TOKEN, keys::CURRENT_USER] {
                self.remove_quietly(key);
            }
            let pending = self.store.get(keys::OAUTH_STATE)?.is_some()
                && self.store.get(keys::PKCE_CODE_VERIFIER)?.is_some();
            let state =
                if pending { SessionState::AuthorizationPending } else { SessionState::Anonymous };
            self.publish(state, None);
            debug!(state = %state, "restored session without access token");
            return Ok(state);
        };

        let now = Utc::now().timestamp();
        let user = decode_jwt(&token)
            .ok()
            .filter(|claims| !claims.is_expired_at(now))
            .and_then(|claims| claims.to_user_profile().ok());

        let Some(user) = user else {
            info!("stored access token is expired or unreadable; clearing session");
            self.reset_locked(&mut generation);
            return Ok(SessionState::Anonymous);
        };

        if self.stored_user().as_ref() != Some(&user) {
            self.store.set(keys::CURRENT_USER, &encode_user(&user)?)?;
        }
        *generation += 1;
        info!(user_id = %user.id, role = %user.role, "restored authenticated session");
        self.publish(SessionState::Authenticated, Some(user));
        Ok(SessionState::Authenticated)
    }

    /// Begin an authorization attempt
    ///
    /// Generates and persists a fresh state and code verifier, overwriting
    /// any earlier attempt, and returns the authorization URL. The caller
    /// performs the navigation.
    ///
    /// # Errors
    /// Returns [`SessionError::CryptoUnavailable`] if no secure randomness is
    /// available and [`SessionError::Storage`] if the material cannot be
    /// persisted.
    pub fn start_authorization_flow(&self) -> Result<AuthorizationRequest, SessionError> {
        let pkce = PkceChallenge::generate()?;
        let url = self.authorization_url(&pkce);

        let _generation = self.generation.lock();
        let persisted = self
            .store
            .set(keys::OAUTH_STATE, &pkce.state)
            .and_then(|()| self.store.set(keys::PKCE_CODE_VERIFIER, &pkce.code_verifier));
        if let Err(e) = persisted {
            warn!(error = %e, "failed to persist PKCE material");
            self.remove_pkce();
            return Err(e.into());
        }

        let current = self.snapshot();
        if !current.is_signed_in() {
            self.publish(SessionState::AuthorizationPending, None);
        }

        info!(
            authorize_url = %self.config.authorization_url(),
            client_id = %self.config.client_id,
            "authorization flow started"
        );
        Ok(AuthorizationRequest { url, state: pkce.state })
    }

    fn authorization_url(&self, pkce: &PkceChallenge) -> String {
        let scope = self.config.scope_string();
        let params = [
            ("response_type", "code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("state", pkce.state.as_str()),
            ("code_challenge", pkce.code_challenge.as_str()),
            ("code_challenge_method", pkce.challenge_method()),
        ];

        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let base = self.config.authorization_url();
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{base}{separator}{query}")
    }

    /// Complete the flow from the redirect's query parameters
    ///
    /// # Errors
    /// See [`SessionManager::handle_authorization_callback_with_cancel`].
    pub async fn handle_authorization_callback(
        &self,
        params: &CallbackParams,
    ) -> Result<UserProfile, SessionError> {
        self.handle_authorization_callback_with_cancel(params, &CancellationToken::new()).await
    }

    /// Complete the flow, abandoning the exchange if `cancel` fires
    ///
    /// The persisted state and verifier are consumed before anything else,
    /// so they are gone whatever the outcome. Any failure leaves the whole
    /// session cleared and `Anonymous`.
    ///
    /// # Errors
    /// - [`SessionError::AuthorizationDenied`] if the redirect carries `error`
    /// - [`SessionError::MissingParameter`] if `code` or `state` is absent
    /// - [`SessionError::StateMismatch`] if `state` is not the pending one
    /// - [`SessionError::MissingVerifier`] if no verifier was persisted
    /// - [`SessionError::TokenExchange`] / [`SessionError::Network`] /
    ///   [`SessionError::MalformedResponse`] from the token endpoint
    /// - [`SessionError::TokenDecode`] if the issued token is undecodable
    /// - [`SessionError::Cancelled`] if `cancel` fired first
    /// - [`SessionError::Superseded`] if the session changed meanwhile
    pub async fn handle_authorization_callback_with_cancel(
        &self,
        params: &CallbackParams,
        cancel: &CancellationToken,
    ) -> Result<UserProfile, SessionError> {
        let (code, verifier, generation) = {
            let mut generation = self.generation.lock();
            let stored_state = self.store.get(keys::OAUTH_STATE);
            let stored_verifier = self.store.get(keys::PKCE_CODE_VERIFIER);
            self.remove_pkce();

            match check_callback(params, stored_state, stored_verifier) {
                Ok((code, verifier)) => (code, verifier, *generation),
                Err(e) => {
                    warn!(error = %e, "authorization callback rejected");
                    self.reset_locked(&mut generation);
                    return Err(e);
                }
            }
        };

        debug!("exchanging authorization code");
        let exchange = self.endpoint.exchange_authorization_code(
            &code,
            &verifier,
            &self.config.redirect_uri,
            &self.config.client_id,
        );
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SessionError::Cancelled),
            response = exchange => response.map_err(SessionError::from),
        };

        self.apply_token_result(generation, result, "authorization_code")
    }

    /// Mint a new access token with the stored refresh token
    ///
    /// # Errors
    /// See [`SessionManager::refresh_access_token_with_cancel`].
    pub async fn refresh_access_token(&self) -> Result<UserProfile, SessionError> {
        self.refresh_access_token_with_cancel(&CancellationToken::new()).await
    }

    /// Refresh, abandoning the call if `cancel` fires
    ///
    /// A failed refresh is not retried; the session is cleared so no stale
    /// token lingers. A cancelled refresh leaves the session as it was.
    ///
    /// # Errors
    /// - [`SessionError::NoRefreshToken`] if none is stored (session untouched)
    /// - token endpoint and decode errors as for the callback, after which the
    ///   session is `Anonymous`
    /// - [`SessionError::Cancelled`] / [`SessionError::Superseded`]
    pub async fn refresh_access_token_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<UserProfile, SessionError> {
        let (refresh_token, generation, previous) = {
            let generation = self.generation.lock();
            let Some(refresh_token) = self.store.get(keys::REFRESH_TOKEN)? else {
                debug!("refresh requested without a stored refresh token");
                return Err(SessionError::NoRefreshToken);
            };
            let previous = self.snapshot();
            self.publish(SessionState::Refreshing, previous.user.clone());
            (refresh_token, *generation, previous)
        };

        debug!("refreshing access token");
        let refresh = self.endpoint.refresh_token(&refresh_token, &self.config.client_id);
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SessionError::Cancelled),
            response = refresh => response.map_err(SessionError::from),
        };

        if matches!(result, Err(SessionError::Cancelled)) {
            let current = self.generation.lock();
            if *current == generation {
                self.state_tx.send_replace(previous);
            }
            debug!("refresh cancelled");
            return Err(SessionError::Cancelled);
        }

        self.apply_token_result(generation, result, "refresh_token")
    }

    /// Clear everything and return to `Anonymous`
    ///
    /// Local and infallible: storage errors are logged, not returned. Any
    /// in-flight exchange or refresh will be discarded on completion.
    pub fn logout(&self) {
        let mut generation = self.generation.lock();
        self.reset_locked(&mut generation);
        info!("session logged out");
    }

    fn apply_token_result(
        &self,
        started_at: u64,
        result: Result<TokenResponse, SessionError>,
        grant: &'static str,
    ) -> Result<UserProfile, SessionError> {
        let outcome = result.and_then(|tokens| {
            let user = derive_user_profile(&tokens.access_token)?;
            Ok((tokens, user))
        });

        let mut generation = self.generation.lock();
        if *generation != started_at {
            info!(grant, "session changed during token request; discarding result");
            return Err(SessionError::Superseded);
        }

        let (tokens, user) = match outcome {
            Ok(pair) => pair,
            Err(e) => {
                warn!(grant, error = %e, "token request failed; clearing session");
                self.reset_locked(&mut generation);
                return Err(e);
            }
        };

        if let Err(e) = self.persist_session(&tokens, &user) {
            warn!(grant, error = %e, "failed to persist session; clearing");
            self.reset_locked(&mut generation);
            return Err(e.into());
        }

        *generation += 1;
        info!(grant, user_id = %user.id, role = %user.role, "session established");
        self.publish(SessionState::Authenticated, Some(user.clone()));
        Ok(user)
    }

    fn persist_session(&self, tokens: &TokenResponse, user: &UserProfile) -> Result<(), StoreError> {
        self.store.set(keys::ACCESS_TOKEN, &tokens.access_token)?;
        if let Some(refresh_token) = &tokens.refresh_token {
            self.store.set(keys::REFRESH_TOKEN, refresh_token)?;
        }
        self.store.set(keys::CURRENT_USER, &encode_user(user)?)
    }

    fn stored_user(&self) -> Option<UserProfile> {
        let raw = self.store.get(keys::CURRENT_USER).ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    fn reset_locked(&self, generation: &mut u64) {
        *generation += 1;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear session store");
        }
        self.publish(SessionState::Anonymous, None);
    }

    fn remove_pkce(&self) {
        for key in keys::PKCE {
            self.remove_quietly(key);
        }
    }

    fn remove_quietly(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!(key, error = %e, "failed to remove session key");
        }
    }

    fn publish(&self, state: SessionState, user: Option<UserProfile>) {
        self.state_tx.send_replace(SessionSnapshot { state, user });
    }
}

fn encode_user(user: &UserProfile) -> Result<String, StoreError> {
    serde_json::to_string(user).map_err(|e| StoreError::from(CommonError::from(e)))
}

/// Validate callback parameters against the consumed PKCE material
///
/// Order: provider error, missing parameters, state, verifier.
fn check_callback(
    params: &CallbackParams,
    stored_state: Result<Option<String>, StoreError>,
    stored_verifier: Result<Option<String>, StoreError>,
) -> Result<(String, String), SessionError> {
    if let Some(error) = &params.error {
        return Err(SessionError::AuthorizationDenied {
            error: error.clone(),
            description: params.error_description.clone(),
        });
    }
    let code = params.code.clone().ok_or(SessionError::MissingParameter("code"))?;
    let state = params.state.as_deref().ok_or(SessionError::MissingParameter("state"))?;

    match stored_state? {
        Some(expected) if validate_state(&expected, state) => {}
        _ => return Err(SessionError::StateMismatch),
    }

    let verifier = stored_verifier?.ok_or(SessionError::MissingVerifier)?;
    Ok((code, verifier))
}
