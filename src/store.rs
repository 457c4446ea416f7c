//! Persistent state: the registry snapshot and the sync cursor.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::metadata::SyncCursor;
use crate::registry::DomainRegistry;

/// State that survives restarts.
///
/// Serializes to the flat key set `domainRegistry`, `lastFullUpdateTime`,
/// `lastPartialUpdateTime`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(rename = "domainRegistry", default)]
    pub registry: DomainRegistry,
    #[serde(flatten)]
    pub cursor: SyncCursor,
}

/// Key-value storage the engine reads once at start-up and writes after updates.
pub trait StateStore: Send + Sync {
    /// Load saved state. `Ok(None)` when nothing was saved yet.
    fn load(&self) -> Result<Option<PersistedState>>;

    /// Replace the saved state.
    fn save(&self, state: &PersistedState) -> Result<()>;
}

/// JSON file store with atomic replacement.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Store state under `dir`, creating it on first save.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the state file.
    pub fn state_path(&self) -> PathBuf {
        self.dir.join("state.json")
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join("state.json.tmp")
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let state = serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("corrupt state file {:?}: {}", path, e)))?;
        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let data = serde_json::to_vec(state)?;

        let temp_path = self.temp_path();
        let mut temp_file = fs::File::create(&temp_path)?;
        temp_file.write_all(&data)?;
        temp_file.sync_all()?;
        drop(temp_file);

        fs::rename(&temp_path, self.state_path())?;
        log::debug!("Saved state: {} bytes", data.len());
        Ok(())
    }
}

/// In-memory store, for embedding without a filesystem and for tests.
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<PersistedState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `state`.
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    /// Last saved state.
    pub fn snapshot(&self) -> Option<PersistedState> {
        self.state.lock().clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        *self.state.lock() = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ActionKind;
    use tempfile::tempdir;

    fn sample_state() -> PersistedState {
        let mut registry = DomainRegistry::new();
        registry.apply(1, "evil.example", ActionKind::Block);
        registry.apply(2, "bad.example", ActionKind::Block);
        PersistedState {
            registry,
            cursor: SyncCursor {
                last_full_update: 1_700_000_000_000,
                last_partial_update: 1_700_000_300_000,
            },
        }
    }

    #[test]
    fn test_file_store_save_load() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("nested"));

        assert!(store.load().unwrap().is_none());

        let state = sample_state();
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), Some(state));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_file_store_key_names() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.save(&sample_state()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.state_path()).unwrap()).unwrap();
        assert_eq!(raw["domainRegistry"]["1"], "evil.example");
        assert_eq!(raw["lastFullUpdateTime"], 1_700_000_000_000u64);
        assert_eq!(raw["lastPartialUpdateTime"], 1_700_000_300_000u64);
    }

    #[test]
    fn test_file_store_corrupt() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        fs::write(store.state_path(), "{not json").unwrap();

        assert!(matches!(store.load(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_missing_keys_default_to_zero() {
        let state: PersistedState = serde_json::from_str(r#"{"domainRegistry":{}}"#).unwrap();
        assert_eq!(state.cursor, SyncCursor::never());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStateStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&sample_state()).unwrap();
        assert_eq!(store.snapshot(), Some(sample_state()));
    }
}
