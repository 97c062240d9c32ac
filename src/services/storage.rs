//! Scroll Storage - Durable Key/Value Backends
//!
//! The scroll store only needs `get`/`set` on string keys. Two backends ship:
//! an in-memory map for tests and embedding, and a directory of JSON files.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use ahash::AHashMap;

use crate::error::{Error, Result};
use crate::helpers::{encode_file_name, get_or_create_data_dir};

/// Durable storage capability
pub trait ScrollStorage: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl<S: ScrollStorage> ScrollStorage for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// Process-local storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<AHashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ScrollStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<encoded key>.json` file per key
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage under `<data dir>/scroll`
    pub fn open_default() -> Result<Self> {
        Self::open(get_or_create_data_dir()?.join("scroll"))
    }

    /// Storage rooted at `dir`, created if missing
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::storage(format!("cannot create {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_file_name(key)))
    }
}

impl ScrollStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(format!("read {key}: {e}"))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        // Write-then-rename so a crash never leaves a torn record
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| Error::storage(format!("write {key}: {e}")))?;
        fs::rename(&tmp, &path).map_err(|e| Error::storage(format!("write {key}: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").expect("get"), None);
        storage.set("k", "v1").expect("set");
        storage.set("k", "v2").expect("set");
        assert_eq!(storage.get("k").expect("get").as_deref(), Some("v2"));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_file_storage_round_trip() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::open(tmp.path().join("scroll")).expect("open");

        assert_eq!(storage.get("lifegrid.scroll.v1/alice/weeks").expect("get"), None);
        storage
            .set("lifegrid.scroll.v1/alice/weeks", "{\"scrollTop\":1}")
            .expect("set");
        storage.set("lifegrid.scroll.v1/bob/weeks", "{}").expect("set");

        assert_eq!(
            storage
                .get("lifegrid.scroll.v1/alice/weeks")
                .expect("get")
                .as_deref(),
            Some("{\"scrollTop\":1}")
        );
        let files = fs::read_dir(storage.dir()).expect("read_dir").count();
        assert_eq!(files, 2);
    }

    #[test]
    fn test_file_storage_reports_unreadable_entry() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::open(tmp.path()).expect("open");
        // A directory where the record file should be
        fs::create_dir(storage.path_for("k")).expect("mkdir");
        assert!(matches!(storage.get("k"), Err(Error::Storage { .. })));
    }
}
