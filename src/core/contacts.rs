//! Persistent storage for the personal SOS contact.
//!
//! The number lives in a small key-value store so the engine can be driven
//! by an in-memory store in tests and a JSON file in the app.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Key under which the SOS phone number is stored.
pub const SOS_CONTACT_KEY: &str = "sentinel_sos_contact";

/// Minimal string key-value persistence.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        (**self).set(key, value)
    }
}

/// Volatile store, used by tests and as a fallback when no data dir exists.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Stores all keys as one JSON object file in the app data directory.
pub struct JsonFileStore {
    /// Path of the backing file
    path: PathBuf,
    /// Values read at startup, kept in sync on every write
    cache: HashMap<String, String>,
}

impl JsonFileStore {
    /// Open the store, reading any existing file.
    ///
    /// # Arguments
    /// * `data_dir` - The app data directory (from Tauri's app_data_dir)
    pub fn open(data_dir: &Path) -> io::Result<Self> {
        let path = data_dir.join("storage.json");
        let cache = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Discarding unreadable {:?}: {}", path, e);
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        Ok(Self { path, cache })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.cache.insert(key.to_string(), value.to_string());

        // Ensure directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.cache)?;
        fs::write(&self.path, content)
    }
}

/// The process-wide SOS phone number. No format validation is done;
/// blank values count as unset.
pub struct ContactStore<S: KeyValueStore> {
    store: S,
    current: String,
}

impl<S: KeyValueStore> ContactStore<S> {
    pub fn new(store: S) -> Self {
        let current = store
            .get(SOS_CONTACT_KEY)
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        Self { store, current }
    }

    /// The saved number, or an empty string.
    pub fn get(&self) -> &str {
        &self.current
    }

    /// Persist a new number. Last write wins.
    pub fn set(&mut self, value: &str) -> io::Result<()> {
        let trimmed = value.trim();
        self.store.set(SOS_CONTACT_KEY, trimmed)?;
        self.current = trimmed.to_string();
        log::info!(
            "SOS contact {}",
            if trimmed.is_empty() { "cleared" } else { "updated" }
        );
        Ok(())
    }
}
