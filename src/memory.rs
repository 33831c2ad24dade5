use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Result, SabiaError};

/// Flat JSON key-value store: one document, rewritten in full after every
/// mutation. Key order in the document is insertion order, which is also the
/// eviction order once the store is full.
pub struct MemoryStore {
    entries: Map<String, Value>,
    file_path: PathBuf,
    capacity: usize,
}

impl MemoryStore {
    /// Opens the store backed by `file_path`. A missing document starts the
    /// store empty; an unreadable one is discarded with a warning and treated
    /// the same way.
    pub fn open(file_path: PathBuf, capacity: usize) -> Self {
        let entries = if file_path.exists() {
            match Self::load(&file_path) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        file = %file_path.display(),
                        error = %e,
                        "discarding unreadable store document"
                    );
                    Map::new()
                }
            }
        } else {
            Map::new()
        };

        MemoryStore {
            entries,
            file_path,
            capacity: capacity.max(1),
        }
    }

    fn load(path: &Path) -> Result<Map<String, Value>> {
        let content = std::fs::read_to_string(path)?;
        let entries = serde_json::from_str(&content)?;
        Ok(entries)
    }

    /// Stores `value` under `key`, evicting the oldest entry first when the
    /// store is at capacity and `key` is new. Persists synchronously.
    pub fn put(&mut self, key: &str, value: Value) -> Result<()> {
        if key.trim().is_empty() {
            return Err(SabiaError::Validation("empty store key".to_string()));
        }

        if self.entries.len() >= self.capacity && !self.entries.contains_key(key) {
            if let Some(oldest) = self.entries.keys().next().cloned() {
                debug!(key = %oldest, "store at capacity, evicting oldest entry");
                self.entries.shift_remove(&oldest);
            }
        }

        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Current keys, insertion order.
    pub fn list_keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.flush()
    }

    /// Writes the current document to `path` without touching the live file.
    pub fn backup(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn flush(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.file_path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    fn test_store(dir: &TempDir, capacity: usize) -> MemoryStore {
        MemoryStore::open(dir.path().join("memoria.json"), capacity)
    }

    #[test]
    fn put_then_get_roundtrip() {
        let dir = tempdir().unwrap();
        let mut store = test_store(&dir, 10);

        store.put("k", json!("v")).unwrap();
        assert_eq!(store.get("k"), Some(&json!("v")));
        assert_eq!(store.get("unset"), None);
    }

    #[test]
    fn empty_key_is_rejected() {
        let dir = tempdir().unwrap();
        let mut store = test_store(&dir, 10);

        let err = store.put("", json!(1)).unwrap_err();
        assert!(matches!(err, SabiaError::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn eviction_drops_exactly_the_oldest() {
        let dir = tempdir().unwrap();
        let mut store = test_store(&dir, 3);

        store.put("a", json!(1)).unwrap();
        store.put("b", json!(2)).unwrap();
        store.put("c", json!(3)).unwrap();
        store.put("d", json!(4)).unwrap();

        assert_eq!(store.len(), store.capacity());
        assert_eq!(store.list_keys(), vec!["b", "c", "d"]);
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("d"), Some(&json!(4)));
    }

    #[test]
    fn overwriting_an_existing_key_does_not_evict() {
        let dir = tempdir().unwrap();
        let mut store = test_store(&dir, 2);

        store.put("a", json!(1)).unwrap();
        store.put("b", json!(2)).unwrap();
        store.put("a", json!(10)).unwrap();

        assert_eq!(store.list_keys(), vec!["a", "b"]);
        assert_eq!(store.get("a"), Some(&json!(10)));
    }

    #[test]
    fn document_survives_reopen_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memoria.json");

        {
            let mut store = MemoryStore::open(path.clone(), 10);
            store.put("primeiro", json!("1")).unwrap();
            store.put("segundo", json!({"n": 2})).unwrap();
            store.put("terceiro", json!([3])).unwrap();
        }

        let store = MemoryStore::open(path, 10);
        assert_eq!(store.list_keys(), vec!["primeiro", "segundo", "terceiro"]);
        assert_eq!(store.get("segundo"), Some(&json!({"n": 2})));
    }

    #[test]
    fn corrupt_document_loads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memoria.json");
        std::fs::write(&path, "{truncated").unwrap();

        let mut store = MemoryStore::open(path, 10);
        assert!(store.is_empty());

        // and the store is usable again afterwards
        store.put("k", json!("v")).unwrap();
        assert_eq!(store.get("k"), Some(&json!("v")));
    }

    #[test]
    fn clear_persists_the_empty_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memoria.json");

        let mut store = MemoryStore::open(path.clone(), 10);
        store.put("k", json!("v")).unwrap();
        store.clear().unwrap();

        let reopened = MemoryStore::open(path, 10);
        assert!(reopened.is_empty());
    }

    #[test]
    fn backup_leaves_the_live_document_alone() {
        let dir = tempdir().unwrap();
        let live = dir.path().join("memoria.json");
        let copy = dir.path().join("backup.json");

        let mut store = MemoryStore::open(live.clone(), 10);
        store.put("k", json!("v")).unwrap();
        store.backup(&copy).unwrap();

        let backup = MemoryStore::open(copy, 10);
        assert_eq!(backup.get("k"), Some(&json!("v")));

        let original = MemoryStore::open(live, 10);
        assert_eq!(original.get("k"), Some(&json!("v")));
    }
}
