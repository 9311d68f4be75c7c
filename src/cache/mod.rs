//! Local Cache Adapter
//! Key/value persistence of unsaved source text, keyed by source id with
//! a freshness rule: the server wins once it reports a newer update time

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::record::Timestamp;

#[cfg(test)]
mod tests;

/// Cache key used before a source has any id.
pub const UNSAVED_KEY: &str = "__unsaved__";

/// A stored entry: the text plus the server update time known at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub text: String,
    pub updated_at: Option<Timestamp>,
}

impl CacheEntry {
    /// An entry is valid only while the server has not reported a newer
    /// update time than the one recorded at write time.
    fn is_fresh(&self, known_updated_at: Option<Timestamp>) -> bool {
        match (self.updated_at, known_updated_at) {
            (_, None) => true,
            (Some(written), Some(known)) => written >= known,
            (None, Some(_)) => false,
        }
    }
}

/// Durable key/value storage for unsaved source text.
pub trait CacheStore {
    /// Return the cached text for `key`, or `None` if absent or stale
    /// relative to `known_updated_at`.
    fn get(&self, key: &str, known_updated_at: Option<Timestamp>) -> Option<String>;

    fn set(&mut self, key: &str, text: &str, updated_at: Option<Timestamp>);

    fn remove(&mut self, key: &str);
}

/// Shared handle to a cache store; the lifecycle machine and the auxiliary
/// cache-writer both hold one. Single-threaded by design.
pub type SharedCache = Rc<RefCell<dyn CacheStore>>;

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Volatile store, used in tests and embedded display contexts.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedCache {
        Rc::new(RefCell::new(Self::new()))
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str, known_updated_at: Option<Timestamp>) -> Option<String> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(known_updated_at))
            .map(|entry| entry.text.clone())
    }

    fn set(&mut self, key: &str, text: &str, updated_at: Option<Timestamp>) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                text: text.to_string(),
                updated_at,
            },
        );
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

// ============================================================================
// JSON-FILE STORE
// ============================================================================

/// File-backed store mirroring the browser's durable key/value storage.
/// The whole map is rewritten on every mutation; entry counts are tiny.
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

impl JsonFileCache {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("discarding unreadable cache file {}: {e}", path.display());
                HashMap::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e),
        };
        Ok(Self { path, entries })
    }

    fn persist(&self) {
        let raw = match serde_json::to_string_pretty(&self.entries) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("failed to serialize cache: {e}");
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, raw) {
            log::warn!("failed to write cache file {}: {e}", self.path.display());
        }
    }
}

impl CacheStore for JsonFileCache {
    fn get(&self, key: &str, known_updated_at: Option<Timestamp>) -> Option<String> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(known_updated_at))
            .map(|entry| entry.text.clone())
    }

    fn set(&mut self, key: &str, text: &str, updated_at: Option<Timestamp>) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                text: text.to_string(),
                updated_at,
            },
        );
        self.persist();
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.persist();
        }
    }
}
