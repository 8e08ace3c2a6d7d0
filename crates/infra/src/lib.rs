//! # ShopDesk Infrastructure
//!
//! The impure edges around the session core in `shopdesk-common`.
//!
//! This crate contains:
//! - Configuration loading from `SHOPDESK_*` variables or TOML/JSON files
//! - Logging initialisation
//! - The loopback server that receives the OAuth redirect
//! - The authenticated dashboard API client

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod api;
pub mod callback;
pub mod config;
pub mod observability;

// Re-export commonly used items
pub use api::{ApiClient, ApiError, ApiErrorCategory};
pub use callback::{CallbackServer, CallbackServerError};
pub use config::{AppConfig, ConfigError, StorageBackend};
pub use observability::init_tracing;
