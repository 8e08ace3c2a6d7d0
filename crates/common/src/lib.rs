//! Shared building blocks for the ShopDesk admin dashboard.
//!
//! The heart of this crate is the [`auth`] module: an OAuth 2.0
//! Authorization Code + PKCE client with a persisted, observable session.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error types and classification
//! - `runtime`: the OAuth session flow, token client and file/memory stores
//!   (default)
//! - `platform`: OS keychain session store
//! - `test-utils`: scripted token endpoint and token fixtures for tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod auth;
#[cfg(feature = "runtime")]
pub mod storage;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(all(feature = "runtime", any(feature = "test-utils", test)))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use auth::{
    OAuthConfig, RequestAuthenticator, Role, SessionError, SessionManager, SessionSnapshot,
    SessionState, TokenClient, UserProfile,
};
#[cfg(feature = "foundation")]
pub use error::{CommonError, ErrorClassification, ErrorSeverity};
#[cfg(feature = "platform")]
pub use storage::KeychainSessionStore;
#[cfg(feature = "runtime")]
pub use storage::{FileSessionStore, MemorySessionStore, SessionStore, StoreError};
