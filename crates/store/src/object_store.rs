// Key-addressed blob storage.
//
// `put` either replaces the whole blob or leaves the previous one in
// place; no implementation exposes a partially written object.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use parking_lot::Mutex;

use crate::error::StoreError;

pub trait ObjectStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// In-process store. Backs tests and the `memory` backend.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.objects.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// One file per key under a root directory. Key segments separated by `/`
/// become subdirectories.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StoreError::Unavailable(format!("invalid storage key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }
}

fn io_unavailable(key: &str, e: io::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {}", key, e))
}

impl ObjectStore for FsStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            _ => io_unavailable(key, e),
        })
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::Unavailable(format!("invalid storage key '{}'", key)))?;
        fs::create_dir_all(parent).map_err(|e| io_unavailable(key, e))?;

        // Write beside the target, then rename over it
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

        let result = (|| -> io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(io_unavailable(key, e));
        }

        log::debug!("stored {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("a/b.xlsx"), Err(StoreError::NotFound("a/b.xlsx".into())));

        store.put("a/b.xlsx", b"one").unwrap();
        store.put("a/b.xlsx", b"two").unwrap();
        assert_eq!(store.get("a/b.xlsx").unwrap(), b"two");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_fs_store_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        store.put("alice/data.xlsx", b"payload").unwrap();
        assert_eq!(store.get("alice/data.xlsx").unwrap(), b"payload");
        assert!(dir.path().join("alice").join("data.xlsx").is_file());

        // No temp files left behind
        let entries: Vec<_> = fs::read_dir(dir.path().join("alice")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_fs_store_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.put("k.xls", b"first").unwrap();
        store.put("k.xls", b"second").unwrap();
        assert_eq!(store.get("k.xls").unwrap(), b"second");
    }

    #[test]
    fn test_fs_store_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        assert!(matches!(store.get("nobody/none.xlsx"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_fs_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().join("root"));
        for key in ["../outside.xlsx", "/etc/passwd", "a/../../b.xlsx", "", "./a.xlsx"] {
            assert!(
                matches!(store.put(key, b"x"), Err(StoreError::Unavailable(_))),
                "key {key:?} should be rejected"
            );
        }
        assert!(!dir.path().join("outside.xlsx").exists());
    }
}
