//! OAuth 2.0 Authorization Code + PKCE session
//!
//! Signs dashboard users in against the authorization server as a public
//! client and keeps the resulting session persisted and observable.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  SessionManager  │  State machine, sole writer of session state
//! └────────┬─────────┘
//!          │
//!          ├──► TokenEndpoint        (TokenClient over reqwest)
//!          ├──► SessionStore         (file, keychain, memory)
//!          ├──► PKCE utilities       (state, verifier, S256 challenge)
//!          └──► claims               (JWT payload → UserProfile)
//!
//! ┌──────────────────────┐
//! │ RequestAuthenticator │  Reads the store, adds `Authorization: Bearer`
//! └──────────────────────┘
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use shopdesk_common::auth::{CallbackParams, OAuthConfig, SessionManager, TokenClient};
//! use shopdesk_common::storage::FileSessionStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OAuthConfig::new(
//!         "http://localhost:9000",
//!         "dashboard",
//!         "http://localhost:4200/callback",
//!         vec!["openid".to_string(), "profile".to_string()],
//!     );
//!     let client = TokenClient::from_config(&config)?;
//!     let store = Arc::new(FileSessionStore::new("session.json"));
//!     let session = SessionManager::new(config, client, store);
//!
//!     session.restore()?;
//!     let request = session.start_authorization_flow()?;
//!     println!("Open: {}", request.url);
//!
//!     // ... the browser comes back to the redirect URI ...
//!     let params = CallbackParams::from_redirect_url(
//!         "http://localhost:4200/callback?code=abc&state=xyz",
//!     )?;
//!     let user = session.handle_authorization_callback(&params).await?;
//!     println!("Signed in as {} ({})", user.username, user.role);
//!     Ok(())
//! }
//! ```
//!
//! # Security Notes
//!
//! - State and verifier come from the OS random source; without one, the
//!   flow refuses to start.
//! - The callback consumes the pending state and verifier before validating,
//!   so they are single use.
//! - State comparison is constant-time.
//! - Tokens are never logged; `Debug` impls redact them.

pub mod authenticator;
pub mod claims;
pub mod client;
pub mod error;
pub mod pkce;
pub mod session;
pub mod traits;
pub mod types;

pub use authenticator::RequestAuthenticator;
pub use claims::{decode_jwt, derive_user_profile, is_token_expired, TokenClaims, TokenDecodeError};
pub use client::{TokenClient, TokenClientError};
pub use error::{SessionError, SessionErrorKind};
pub use pkce::{
    derive_code_challenge, generate_code_verifier, generate_state, validate_state, PkceChallenge,
    PkceError,
};
pub use session::{SessionManager, SessionSnapshot, SessionState};
pub use traits::TokenEndpoint;
pub use types::{
    AuthorizationRequest, CallbackParams, OAuthConfig, OAuthError, Role, TokenResponse,
    UserProfile,
};
