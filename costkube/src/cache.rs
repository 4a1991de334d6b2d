use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::{SystemTime, UNIX_EPOCH},
};

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::ConfigDocument;

static CONFIG_CACHE: Lazy<ConfigCache> = Lazy::new(ConfigCache::new);

/// The process-wide cache used by [`crate::load_cached`].
pub fn global() -> &'static ConfigCache {
    &CONFIG_CACHE
}

pub fn cache_put(key: impl Into<String>, doc: ConfigDocument) {
    global().put(key, doc)
}

pub fn cache_get(key: &str) -> Option<Arc<ConfigDocument>> {
    global().get(key)
}

pub fn cache_cleanup() -> usize {
    global().cleanup()
}

/// Derives a cache key from a kubeconfig location and its modification time.
pub fn cache_key(path: &Path, modified: SystemTime) -> String {
    let nanos = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(path.as_os_str().as_encoded_bytes());
    hasher.update(b":");
    hasher.update(nanos.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Parsed kubeconfigs keyed by an opaque string. Each document carries its
/// own expiry; expired entries stay in the map until [`ConfigCache::cleanup`].
#[derive(Debug, Default)]
pub struct ConfigCache {
    entries: RwLock<HashMap<String, Arc<ConfigDocument>>>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    // The map is never left half-updated, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ConfigDocument>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<ConfigDocument>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn put(&self, key: impl Into<String>, doc: ConfigDocument) {
        self.put_shared(key, Arc::new(doc))
    }

    pub fn put_shared(&self, key: impl Into<String>, doc: Arc<ConfigDocument>) {
        self.write().insert(key.into(), doc);
    }

    pub fn get(&self, key: &str) -> Option<Arc<ConfigDocument>> {
        self.get_at(key, SystemTime::now())
    }

    /// Returns the document under `key` if it has not expired by `now`,
    /// stamping its last access time.
    pub fn get_at(&self, key: &str, now: SystemTime) -> Option<Arc<ConfigDocument>> {
        let entries = self.read();
        let doc = entries.get(key)?;
        if doc.is_expired_at(now) {
            trace!(key, "cached kubeconfig expired");
            return None;
        }
        doc.last_accessed.set(now);
        Some(Arc::clone(doc))
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(SystemTime::now())
    }

    pub fn cleanup_at(&self, now: SystemTime) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, doc| !doc.is_expired_at(now));
        let removed = before - entries.len();
        if removed > 0 {
            trace!(removed, "evicted expired kubeconfigs");
        }
        removed
    }

    /// Whether `key` is stored, expired or not. Does not touch `last_accessed`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
