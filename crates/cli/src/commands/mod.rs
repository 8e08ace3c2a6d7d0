//! Command handlers
//!
//! Each handler runs after the session has been restored from the store.

pub mod api;
pub mod session;
