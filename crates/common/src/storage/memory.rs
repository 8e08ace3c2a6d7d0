//! In-memory session store

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{SessionStore, StoreResult};

/// Process-local [`SessionStore`] backed by a `HashMap`
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` currently holds a value
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of stored values
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemorySessionStore::new();
        assert!(store.is_empty());

        store.set("access_token", "abc").expect("set");
        assert_eq!(store.get("access_token").expect("get").as_deref(), Some("abc"));
        assert!(store.contains("access_token"));

        store.set("access_token", "def").expect("overwrite");
        assert_eq!(store.get("access_token").expect("get").as_deref(), Some("def"));
        assert_eq!(store.len(), 1);

        store.remove("access_token").expect("remove");
        store.remove("access_token").expect("remove is idempotent");
        assert_eq!(store.get("access_token").expect("get"), None);

        store.set("refresh_token", "r1").expect("set");
        store.clear().expect("clear");
        assert!(store.is_empty());
    }
}
