//! Platform keychain session store
//!
//! Each session key becomes one keychain entry under a single service name,
//! via the `keyring` crate: macOS Keychain, Windows Credential Manager, or the
//! Secret Service API on Linux.

use keyring::Entry;
use tracing::debug;

use super::{SessionStore, StoreError, StoreResult};

/// [`SessionStore`] backed by the OS keychain
#[derive(Debug, Clone)]
pub struct KeychainSessionStore {
    service_name: String,
}

impl KeychainSessionStore {
    /// Create a store for a keychain service, e.g. `"ShopDesk.session"`
    ///
    /// # Examples
    /// ```
    /// use shopdesk_common::storage::KeychainSessionStore;
    ///
    /// let store = KeychainSessionStore::new("ShopDesk.session");
    /// assert_eq!(store.service_name(), "ShopDesk.session");
    /// ```
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn entry(&self, key: &str) -> StoreResult<Entry> {
        Entry::new(&self.service_name, key).map_err(|e| {
            StoreError::Keychain(format!("failed to open keychain entry '{key}': {e}"))
        })
    }
}

impl SessionStore for KeychainSessionStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        debug!(service = %self.service_name, key = %key, "reading keychain entry");

        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keychain(format!("failed to read '{key}': {e}"))),
        }
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        debug!(service = %self.service_name, key = %key, "writing keychain entry");

        self.entry(key)?
            .set_password(value)
            .map_err(|e| StoreError::Keychain(format!("failed to write '{key}': {e}")))
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        debug!(service = %self.service_name, key = %key, "deleting keychain entry");

        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Keychain(format!("failed to delete '{key}': {e}"))),
        }
    }
}
