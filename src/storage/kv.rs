//! Synchronous string key-value stores backing the favorites collection.
//!
//! [`KeyValueStore`] is the narrow capability the favorites repository is
//! built on. [`MemoryStore`] serves tests and throwaway sessions;
//! [`FileStore`] keeps every key in a single JSON object file on disk.
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::types::StoreError;

/// A synchronous key-value store of string blobs.
///
/// Implementations must not suspend: callers rely on a read-modify-write
/// sequence completing within one synchronous call.
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// File-backed store
// ============================================================================

/// Maximum store file size (8 MB), enforced on both read and write.
const MAX_FILE_SIZE: u64 = 8 * 1024 * 1024;

/// Stores all keys in one JSON object file, e.g. `{"newswave:favorites": "[...]"}`.
///
/// Every write replaces the whole file via temp-file-then-rename, so a crash
/// mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store at `path`. The file and its parent directory are created
    /// on first write; a missing file reads as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::metadata(&self.path) {
            Ok(meta) if meta.len() > MAX_FILE_SIZE => {
                return Err(StoreError::TooLarge {
                    size: meta.len(),
                    max: MAX_FILE_SIZE,
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StoreError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            // Deleted between metadata and read
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    /// Read the current map for a write. An unparseable file is discarded so
    /// the write can replace it; an oversized one is not.
    fn read_map_for_write(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match self.read_map() {
            Err(StoreError::Corrupt(reason)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    reason = %reason,
                    "Overwriting corrupt store file"
                );
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    /// Refuses content the next read would reject, leaving the file as it was.
    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(map)?;
        let size = content.len() as u64;
        if size > MAX_FILE_SIZE {
            return Err(StoreError::TooLarge {
                size,
                max: MAX_FILE_SIZE,
            });
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        atomic_write(&self.path, &content)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map_for_write()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map_for_write()?;
        if map.remove(key).is_none() {
            return Ok(());
        }
        self.write_map(&map)
    }
}

/// Write `content` to `dst` using write-to-temp-then-rename.
/// The destination is never left in a partial state.
pub fn atomic_write(dst: &Path, content: &[u8]) -> Result<(), StoreError> {
    // Unpredictable temp name; create_new refuses to follow a pre-planted file
    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)?;

    if let Err(e) = temp_file
        .write_all(content)
        .and_then(|()| temp_file.sync_all())
    {
        let _ = std::fs::remove_file(&temp_path);
        return Err(StoreError::Io(e));
    }
    drop(temp_file);

    // On Windows, rename fails if destination exists
    #[cfg(windows)]
    if dst.exists() {
        if let Err(e) = std::fs::remove_file(dst) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StoreError::Io(e));
        }
    }

    if let Err(e) = std::fs::rename(&temp_path, dst) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(StoreError::Io(e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("newswave_kv_test_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn test_memory_store_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v2".to_string()));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        // Removing again is fine
        store.remove("k").unwrap();
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = test_dir("missing");
        let store = FileStore::open(dir.join("store.json"));
        assert_eq!(store.get("anything").unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = test_dir("reopen");
        let path = dir.join("nested").join("store.json");

        let store = FileStore::open(&path);
        store.set("a", "1").unwrap();
        store.set("b", "[1, 2]").unwrap();
        drop(store);

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("a").unwrap(), Some("1".to_string()));
        assert_eq!(reopened.get("b").unwrap(), Some("[1, 2]".to_string()));

        reopened.remove("a").unwrap();
        assert_eq!(reopened.get("a").unwrap(), None);
        assert_eq!(reopened.get("b").unwrap(), Some("[1, 2]".to_string()));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = test_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path);
        assert!(matches!(store.get("k"), Err(StoreError::Corrupt(_))));

        // A write replaces the corrupt file
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_store_refuses_oversized_write() {
        let dir = test_dir("oversized");
        let path = dir.join("store.json");

        let store = FileStore::open(&path);
        store.set("small", "kept").unwrap();

        let huge = "a".repeat(MAX_FILE_SIZE as usize);
        let err = store.set("huge", &huge).unwrap_err();
        assert!(matches!(err, StoreError::TooLarge { max: MAX_FILE_SIZE, .. }));

        // The previous contents are untouched and still readable
        assert_eq!(store.get("small").unwrap(), Some("kept".to_string()));
        assert_eq!(store.get("huge").unwrap(), None);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_store_oversized_file_is_not_overwritten() {
        let dir = test_dir("oversized_file");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.json");
        let padding = " ".repeat(MAX_FILE_SIZE as usize);
        std::fs::write(&path, format!("{{\"k\": \"v\"}}{padding}")).unwrap();

        let store = FileStore::open(&path);
        assert!(matches!(store.get("k"), Err(StoreError::TooLarge { .. })));
        assert!(matches!(store.set("k2", "v2"), Err(StoreError::TooLarge { .. })));
        assert!(std::fs::metadata(&path).unwrap().len() > MAX_FILE_SIZE);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_store_empty_file_is_empty() {
        let dir = test_dir("empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.json");
        std::fs::write(&path, "  \n").unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.get("k").unwrap(), None);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let dir = test_dir("atomic");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.json");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");

        let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(entries.len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
