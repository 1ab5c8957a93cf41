// src/store/mod.rs
//! Key-value stores standing in for the host's `sync` and `local` storage.
//!
//! Reads always go to the backing store so a read-modify-write never works
//! from a copy taken before another writer (a popup marking a study
//! completed, say) got in. Writes to a [`JsonFileStore`] land atomically.

mod reconcile;

pub use reconcile::{StudyStore, merge_current, merge_history};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StoreError;

pub type Items = serde_json::Map<String, Value>;

pub trait KvStore: Send + Sync {
    /// Values for `keys`; missing keys are simply absent from the result.
    fn get(&self, keys: &[&str]) -> Result<Items, StoreError>;

    /// Upsert every entry of `items` in one write.
    fn set(&self, items: Items) -> Result<(), StoreError>;
}

/// Typed read of one key. `null` reads as absent.
pub fn read_key<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>, StoreError> {
    match store.get(&[key])?.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v)
            .map(Some)
            .map_err(|source| StoreError::Malformed { key: s!(key), source }),
    }
}

pub fn write_key<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> Result<(), StoreError> {
    let mut items = Items::new();
    items.insert(s!(key), serde_json::to_value(value)?);
    store.set(items)
}

/* ---------- JSON file ---------- */

/// One JSON object per file. Writes go through a sibling temp file and a rename.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Items, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Items::new()),
            Err(source) => return Err(StoreError::Io { path: self.path.clone(), source }),
        };
        if text.trim().is_empty() {
            return Ok(Items::new());
        }
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::Corrupt { path: self.path.clone() }),
        }
    }

    fn save(&self, items: &Items) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io { path: self.path.clone(), source };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(items)?;
        fs::write(&tmp, body).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, keys: &[&str]) -> Result<Items, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut all = self.load()?;
        Ok(keys.iter().filter_map(|k| all.remove(*k).map(|v| (s!(*k), v))).collect())
    }

    fn set(&self, items: Items) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut all = self.load()?;
        all.extend(items);
        self.save(&all)
    }
}

/* ---------- memory ---------- */

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Items>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Items) -> Self {
        Self { data: Mutex::new(items) }
    }

    /// Copy of everything stored.
    pub fn snapshot(&self) -> Items {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<Items, StoreError> {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        Ok(keys.iter().filter_map(|k| data.get(*k).map(|v| (s!(*k), v.clone()))).collect())
    }

    fn set(&self, items: Items) -> Result<(), StoreError> {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).extend(items);
        Ok(())
    }
}
