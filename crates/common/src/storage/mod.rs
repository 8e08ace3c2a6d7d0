//! Persistent session store
//!
//! A small string key-value port that survives restarts. The session manager
//! mirrors tokens, the user profile and in-flight PKCE material into it under
//! the names in [`keys`].
//!
//! Implementations:
//! - [`MemorySessionStore`]: process-local, for tests and embedding
//! - [`FileSessionStore`]: JSON file with owner-only permissions
//! - [`KeychainSessionStore`]: platform keychain (`platform` feature)

pub mod error;
pub mod file;
#[cfg(feature = "platform")]
pub mod keychain;
pub mod memory;

use std::sync::Arc;

pub use error::{StoreError, StoreResult};
pub use file::FileSessionStore;
#[cfg(feature = "platform")]
pub use keychain::KeychainSessionStore;
pub use memory::MemorySessionStore;

/// Logical names of the persisted values
pub mod keys {
    /// Anti-forgery state of the outstanding authorization attempt
    pub const OAUTH_STATE: &str = "oauth_state";
    /// PKCE code verifier of the outstanding authorization attempt
    pub const PKCE_CODE_VERIFIER: &str = "pkce_code_verifier";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// JSON-encoded `UserProfile`
    pub const CURRENT_USER: &str = "current_user";

    /// Transient PKCE material
    pub const PKCE: [&str; 2] = [OAUTH_STATE, PKCE_CODE_VERIFIER];

    /// Every key the session owns
    pub const ALL: [&str; 5] =
        [OAUTH_STATE, PKCE_CODE_VERIFIER, ACCESS_TOKEN, REFRESH_TOKEN, CURRENT_USER];
}

/// Key-value storage for session state
///
/// Calls are synchronous and short; they are never held across an `.await`.
/// `remove` of a missing key succeeds. `clear` must succeed even when the
/// stored data can no longer be read.
pub trait SessionStore: Send + Sync {
    /// Read a value, `None` when absent
    ///
    /// # Errors
    /// Returns [`StoreError`] if the backend cannot be read.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Insert or overwrite a value
    ///
    /// # Errors
    /// Returns [`StoreError`] if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete a value (idempotent)
    ///
    /// # Errors
    /// Returns [`StoreError`] if the backend cannot be written.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Delete every session key
    ///
    /// Every key is attempted; the first failure is returned.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the backend cannot be written.
    fn clear(&self) -> StoreResult<()> {
        let mut first_error = None;
        for key in keys::ALL {
            if let Err(e) = self.remove(key) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        (**self).remove(key)
    }

    fn clear(&self) -> StoreResult<()> {
        (**self).clear()
    }
}

impl<T: SessionStore + ?Sized> SessionStore for Box<T> {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        (**self).remove(key)
    }

    fn clear(&self) -> StoreResult<()> {
        (**self).clear()
    }
}
