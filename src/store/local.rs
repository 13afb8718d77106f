//! Local key-value cache persisted as a single JSON file.
//!
//! Stored at `{working_dir}/.checkdesk/local-cache.json`. Writes update memory
//! first and are then flushed to disk; a failed flush is logged and the
//! in-memory value stays authoritative for this process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};

/// Key-value cache with optional disk persistence.
#[derive(Debug)]
pub struct LocalStore {
    entries: RwLock<Map<String, Value>>,
    storage_path: Option<PathBuf>,
    /// Serializes flushes so two writers never share the temp file.
    flush: Mutex<()>,
}

impl LocalStore {
    /// Open the cache under `working_dir`, loading existing entries if present.
    pub async fn open(working_dir: &Path) -> Self {
        let storage_path = working_dir.join(".checkdesk/local-cache.json");

        let entries = if storage_path.exists() {
            match Self::load_from_path(&storage_path) {
                Ok(entries) => {
                    tracing::info!(
                        "Loaded {} local cache entries from {}",
                        entries.len(),
                        storage_path.display()
                    );
                    entries
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load local cache from {}: {}, starting empty",
                        storage_path.display(),
                        e
                    );
                    Map::new()
                }
            }
        } else {
            tracing::info!("No local cache at {}, starting empty", storage_path.display());
            Map::new()
        };

        Self {
            entries: RwLock::new(entries),
            storage_path: Some(storage_path),
            flush: Mutex::new(()),
        }
    }

    /// Cache that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(Map::new()),
            storage_path: None,
            flush: Mutex::new(()),
        }
    }

    fn load_from_path(path: &Path) -> Result<Map<String, Value>, std::io::Error> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    async fn save_to_disk(&self) -> Result<(), std::io::Error> {
        let Some(path) = &self.storage_path else {
            return Ok(());
        };

        let _flush = self.flush.lock().await;
        let contents = {
            let entries = self.entries.read().await;
            serde_json::to_string_pretty(&*entries)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash never leaves a truncated cache.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, path)?;
        tracing::debug!("Saved local cache to {}", path.display());
        Ok(())
    }

    /// Raw JSON value under `key`.
    pub async fn get_raw(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    /// Typed value under `key`; a value of the wrong shape reads as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_value(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring malformed local cache entry");
                None
            }
        }
    }

    /// Object under `key` decoded entry by entry. Malformed entries are skipped.
    pub async fn get_entries<T: DeserializeOwned>(&self, key: &str) -> BTreeMap<String, T> {
        decode_entries(key, self.get_raw(key).await)
    }

    /// Array under `key` decoded item by item. Malformed items are skipped.
    pub async fn get_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        decode_list(key, self.get_raw(key).await)
    }

    /// Read-modify-write of the object under `key`, atomic with respect to
    /// other writers of this store. Returns whatever `f` returns.
    pub async fn update_entries<T, R>(&self, key: &str, f: impl FnOnce(&mut BTreeMap<String, T>) -> R) -> R
    where
        T: DeserializeOwned + Serialize,
    {
        let result = {
            let mut entries = self.entries.write().await;
            let mut map = decode_entries(key, entries.get(key).cloned());
            let result = f(&mut map);
            store_value(&mut entries, key, &map);
            result
        };
        self.flush_logged().await;
        result
    }

    /// Read-modify-write of the array under `key`; see [`Self::update_entries`].
    pub async fn update_list<T, R>(&self, key: &str, f: impl FnOnce(&mut Vec<T>) -> R) -> R
    where
        T: DeserializeOwned + Serialize,
    {
        let result = {
            let mut entries = self.entries.write().await;
            let mut list = decode_list(key, entries.get(key).cloned());
            let result = f(&mut list);
            store_value(&mut entries, key, &list);
            result
        };
        self.flush_logged().await;
        result
    }

    /// Store `value` under `key`. The in-memory write always takes effect.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(key, error = %e, "Failed to encode local cache entry");
                return;
            }
        };

        self.entries.write().await.insert(key.to_string(), value);
        self.flush_logged().await;
    }

    pub async fn remove(&self, key: &str) {
        let existed = self.entries.write().await.remove(key).is_some();
        if existed {
            self.flush_logged().await;
        }
    }

    async fn flush_logged(&self) {
        if let Err(e) = self.save_to_disk().await {
            tracing::error!("Failed to save local cache to disk: {}", e);
        }
    }
}

fn decode_entries<T: DeserializeOwned>(key: &str, raw: Option<Value>) -> BTreeMap<String, T> {
    let Some(Value::Object(map)) = raw else {
        return BTreeMap::new();
    };

    map.into_iter()
        .filter_map(|(k, v)| match serde_json::from_value(v) {
            Ok(value) => Some((k, value)),
            Err(e) => {
                tracing::warn!(key, entry = %k, error = %e, "Skipping malformed local record");
                None
            }
        })
        .collect()
}

fn decode_list<T: DeserializeOwned>(key: &str, raw: Option<Value>) -> Vec<T> {
    let Some(Value::Array(items)) = raw else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|v| match serde_json::from_value(v) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Skipping malformed local record");
                None
            }
        })
        .collect()
}

fn store_value<T: Serialize>(entries: &mut Map<String, Value>, key: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(value) => {
            entries.insert(key.to_string(), value);
        }
        Err(e) => tracing::error!(key, error = %e, "Failed to encode local cache entry"),
    }
}
