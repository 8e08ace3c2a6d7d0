//! Dashboard API client
//!
//! Typed JSON calls to the resource server with the session's bearer token
//! attached by [`shopdesk_common::auth::RequestAuthenticator`].
//!
//! # Behaviour
//!
//! - One attempt per call; [`ApiError::should_retry`] tells the caller whether
//!   repeating it makes sense
//! - A 401 surfaces as [`ApiError::Unauthorized`]; nothing refreshes behind
//!   the caller's back
//! - Timeout on every request, from [`crate::config::ApiSettings`]

pub mod client;
pub mod errors;

pub use client::ApiClient;
pub use errors::{ApiError, ApiErrorCategory};
