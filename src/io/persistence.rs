// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Per-image persistence of annotator state.
//!
//! State is kept in a string key-value store under a key derived from the
//! image source. Persistence is best effort: read failures and corrupt
//! entries load as "no saved state", write failures are logged and dropped.

use crate::models::project::PersistedState;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Durable string storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// One JSON file per key in a directory. File names are BLAKE3 hashes of
/// the key, since sources can be arbitrary URLs or data URIs.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under the platform data directory.
    pub fn default_location() -> Option<Self> {
        dirs::data_dir().map(|dir| Self::new(dir.join("clinic-annotator").join("state")))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let hash = blake3::hash(key.as_bytes());
        self.root.join(format!("{}.json", hash.to_hex()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(value))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create {}", self.root.display()))?;
        let path = self.path_for(key);
        fs::write(&path, value).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// Process-lifetime store, used when persistence is disabled.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Storage key for an image source.
pub fn storage_key(source: &str) -> String {
    format!("image-annotator:{source}")
}

/// Loads, saves and clears [`PersistedState`] per image source.
pub struct Persistence {
    store: Box<dyn KeyValueStore + Send>,
}

impl Persistence {
    pub fn new(store: impl KeyValueStore + Send + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub fn load(&self, source: &str) -> Option<PersistedState> {
        let raw = match self.store.get(&storage_key(source)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Failed to restore annotator state: {:#}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                log::warn!("Ignoring corrupt annotator state for {}: {}", source, e);
                None
            }
        }
    }

    pub fn save(&mut self, source: &str, state: &PersistedState) {
        let result = serde_json::to_string(state)
            .context("Failed to serialize annotator state")
            .and_then(|json| self.store.set(&storage_key(source), &json));
        if let Err(e) = result {
            log::warn!("Failed to save annotator state: {:#}", e);
        }
    }

    pub fn clear(&mut self, source: &str) {
        if let Err(e) = self.store.remove(&storage_key(source)) {
            log::warn!("Failed to clear annotator state: {:#}", e);
        }
    }
}
