//! JSON file session store
//!
//! Keeps the whole session in one small JSON object. Each write replaces the
//! file through a sibling temp file and a rename, so a crash never leaves a
//! half-written session behind. On Unix the file is created `0600`.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{SessionStore, StoreError, StoreResult};

/// [`SessionStore`] persisted as a JSON file
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl FileSessionStore {
    /// Store backed by `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), guard: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<BTreeMap<String, String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StoreError::io("read", &e)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "session file is not valid JSON");
            StoreError::Corrupt(e.to_string())
        })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io("create_dir", &e))?;
        }

        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| StoreError::Corrupt(format!("failed to encode session: {e}")))?;

        let tmp = self.path.with_extension("tmp");
        let mut file = open_private(&tmp).map_err(|e| StoreError::io("open", &e))?;
        file.write_all(&json).map_err(|e| StoreError::io("write", &e))?;
        file.sync_all().map_err(|e| StoreError::io("sync", &e))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io("rename", &e))?;

        debug!(path = %self.path.display(), entries = entries.len(), "session file written");
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>) -> bool) -> StoreResult<()> {
        let _lock = self.guard.lock();
        let mut entries = self.load()?;
        if apply(&mut entries) {
            self.save(&entries)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let _lock = self.guard.lock();
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.update(|entries| entries.remove(key).is_some())
    }

    /// Replace the file with an empty session without reading it, so an
    /// unreadable file can still be reset.
    fn clear(&self) -> StoreResult<()> {
        let _lock = self.guard.lock();
        if !self.path.exists() {
            return Ok(());
        }
        self.save(&BTreeMap::new())
    }
}
