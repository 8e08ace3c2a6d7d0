//! Testing utilities and helpers
//!
//! - **[`fixtures`]**: Unsigned access tokens with chosen claims
//! - **[`mocks`]**: Scripted token endpoint with call recording
//!
//! ## Usage
//!
//! ```rust
//! use shopdesk_common::auth::TokenResponse;
//! use shopdesk_common::testing::{MockTokenEndpoint, TokenFixture};
//!
//! let endpoint = MockTokenEndpoint::new();
//! let token = TokenFixture::new("u-1").roles(&["ADMIN"]).build();
//! endpoint.push_exchange(Ok(TokenResponse::new(token).with_refresh_token("rt")));
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::{expired_token, valid_token, TokenFixture};
pub use mocks::{ExchangeCall, MockTokenEndpoint, RefreshCall};
