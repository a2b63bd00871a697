//! Client-local key/value persistence (saved searches). The core only needs
//! get/set/remove of JSON-serializable values; the backing medium is opaque.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

pub trait KvStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: &Value) -> Result<()>;
    fn remove(&self, key: &str);
}

/// Volatile storage for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    map: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<Value> {
        self.map.lock().expect("storage poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.map
            .lock()
            .expect("storage poisoned")
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.map.lock().expect("storage poisoned").remove(key);
    }
}

/// One pretty-printed JSON document per key, under a directory.
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).context("Failed to create storage directory")?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KvStorage for JsonFileStorage {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                // Malformed persisted state defaults to "nothing stored"
                warn!("discarding malformed JSON at {}: {err}", path.display());
                None
            }
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(self.path_for(key), json).context("Failed to write storage file")
    }

    fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.path_for(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert!(storage.get("savedSearches").is_none());
        storage.set("savedSearches", &json!([{"id": "1"}])).unwrap();
        assert_eq!(storage.get("savedSearches"), Some(json!([{"id": "1"}])));
        storage.remove("savedSearches");
        assert!(storage.get("savedSearches").is_none());
    }
}
