//! Small persisted flags, such as whether the tutorial was completed.
//!
//! Stored as a flat JSON object in `flags.json` under the platform data
//! directory. A key is either `"true"` or absent.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use directories::ProjectDirs;
use thiserror::Error;

/// Flag recording that the first-run tutorial was completed or skipped.
pub const TUTORIAL_COMPLETED: &str = "mailaider-tutorial-completed";

const FLAG_SET: &str = "true";

#[derive(Debug, Error)]
pub enum FlagStoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt flag file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no data directory available")]
    NoDataDir,
}

/// File-backed flag store.
#[derive(Debug)]
pub struct FlagStore {
    path: PathBuf,
    flags: Mutex<BTreeMap<String, String>>,
}

impl FlagStore {
    /// Default location: `<data dir>/flags.json`.
    pub fn default_path() -> Result<PathBuf, FlagStoreError> {
        ProjectDirs::from("ch", "mailaider", "mailaider")
            .map(|dirs| dirs.data_dir().join("flags.json"))
            .ok_or(FlagStoreError::NoDataDir)
    }

    /// Opens the store, treating a missing file as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FlagStoreError> {
        let path = path.into();
        let flags = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(FlagStoreError::Io { path, source }),
        };
        Ok(Self {
            path,
            flags: Mutex::new(flags),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|value| value == FLAG_SET)
    }

    /// Sets `key` and writes the file.
    pub fn set(&self, key: &str) -> Result<(), FlagStoreError> {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        flags.insert(key.to_string(), FLAG_SET.to_string());
        self.persist(&flags)
    }

    /// Removes `key` and writes the file.
    pub fn clear(&self, key: &str) -> Result<(), FlagStoreError> {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        if flags.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&flags)
    }

    fn persist(&self, flags: &BTreeMap<String, String>) -> Result<(), FlagStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| FlagStoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let raw = serde_json::to_string_pretty(flags)?;
        std::fs::write(&self.path, raw).map_err(|source| FlagStoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), "Flags saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlagStore::open(dir.path().join("flags.json")).unwrap();
        assert!(!store.is_set(TUTORIAL_COMPLETED));
    }

    #[test]
    fn set_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("flags.json");

        FlagStore::open(&path).unwrap().set(TUTORIAL_COMPLETED).unwrap();

        let reopened = FlagStore::open(&path).unwrap();
        assert!(reopened.is_set(TUTORIAL_COMPLETED));
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"mailaider-tutorial-completed\": \"true\""));
    }

    #[test]
    fn clear_removes_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        let store = FlagStore::open(&path).unwrap();
        store.set(TUTORIAL_COMPLETED).unwrap();

        store.clear(TUTORIAL_COMPLETED).unwrap();
        assert!(!FlagStore::open(&path).unwrap().is_set(TUTORIAL_COMPLETED));
    }

    #[test]
    fn non_true_values_are_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        std::fs::write(&path, r#"{"mailaider-tutorial-completed": "false"}"#).unwrap();

        assert!(!FlagStore::open(&path).unwrap().is_set(TUTORIAL_COMPLETED));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FlagStore::open(&path),
            Err(FlagStoreError::Parse(_))
        ));
    }
}
