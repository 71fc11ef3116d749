use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::SnapshotStoreError;
use crate::paths::{is_valid_key, snapshot_file_name};

/// Durable key-value storage for serialized conversation snapshots.
pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SnapshotStoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), SnapshotStoreError>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), SnapshotStoreError>;
}

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock_entries().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SnapshotStoreError> {
        Ok(self.lock_entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SnapshotStoreError> {
        self.lock_entries().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SnapshotStoreError> {
        self.lock_entries().remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key under `root`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, SnapshotStoreError> {
        if !is_valid_key(key) {
            return Err(SnapshotStoreError::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(snapshot_file_name(key)))
    }
}

impl SnapshotStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, SnapshotStoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SnapshotStoreError::io("reading snapshot", &path, source)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SnapshotStoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).map_err(|source| {
            SnapshotStoreError::io("creating snapshot directory", &self.root, source)
        })?;

        // Write beside the target and rename so readers never observe a torn snapshot.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)
            .map_err(|source| SnapshotStoreError::io("writing snapshot", &staging, source))?;
        fs::rename(&staging, &path)
            .map_err(|source| SnapshotStoreError::io("replacing snapshot", &path, source))
    }

    fn remove(&self, key: &str) -> Result<(), SnapshotStoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SnapshotStoreError::io("removing snapshot", &path, source)),
        }
    }
}
