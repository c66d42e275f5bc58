// Local key-value storage — the client-side state the engagement layer keeps
// next to the content store: the anonymous session token and the per-day
// view markers.
//
// The trait is synchronous on purpose: every access is a tiny in-process
// map operation and never crosses an .await. `MemoryStorage` backs tests and
// the web server; `FileStorage` persists a JSON object on disk for the CLI so
// the anonymous identity survives between runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

/// Minimal string key-value store with browser `localStorage` semantics.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    /// All keys currently present, in sorted order.
    fn keys(&self) -> Result<Vec<String>>;
}

/// In-memory store. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow::anyhow!("local storage lock poisoned")
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.keys().cloned().collect())
    }
}

/// JSON-file-backed store. The whole map is loaded on open and rewritten
/// after every mutation.
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the storage file, creating parent directories as needed.
    /// A missing file starts out empty; a corrupt one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory for local storage: {}", path.display())
                })?;
            }
        }

        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read local storage at {}", path.display()))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw).with_context(|| {
                    format!("Local storage at {} is not a JSON object", path.display())
                })?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write local storage at {}", self.path.display()))
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    // Mutations are written to disk first and only then become visible, so a
    // failed write leaves memory matching the file.
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.keys().cloned().collect())
    }
}

/// Default location of the CLI's local storage file.
pub fn default_storage_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quantblog")
        .join("local_storage.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").unwrap(), None);
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap(), Some("v".to_string()));
        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn test_memory_storage_keys_sorted() {
        let storage = MemoryStorage::new();
        storage.set("b", "1").unwrap();
        storage.set("a", "1").unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_file_storage_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set("sessionToken", "abc").unwrap();
        storage.set("view_p1_abc_2024-01-01", "1").unwrap();
        storage.remove("view_p1_abc_2024-01-01").unwrap();
        drop(storage);

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(
            reopened.get("sessionToken").unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(reopened.keys().unwrap(), vec!["sessionToken"]);
    }

    #[test]
    fn test_file_storage_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("gone");
        let path = parent.join("storage.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set("sessionToken", "abc").unwrap();

        // Writes fail once the directory disappears
        std::fs::remove_dir_all(&parent).unwrap();

        assert!(storage.set("view_p1_abc_2024-01-01", "1").is_err());
        assert_eq!(storage.get("view_p1_abc_2024-01-01").unwrap(), None);

        assert!(storage.remove("sessionToken").is_err());
        assert_eq!(
            storage.get("sessionToken").unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(storage.keys().unwrap(), vec!["sessionToken"]);
    }

    #[test]
    fn test_file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(FileStorage::open(&path).is_err());
    }
}
