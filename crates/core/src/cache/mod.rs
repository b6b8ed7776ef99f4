//! In-memory TTL cache for resolved metadata records.
//!
//! Keyed on the normalized URL. Entries expire lazily: an expired entry is
//! evicted by the next `get` for its key, never by a background sweeper.
//! The cache is an explicitly constructed object handed to the resolver,
//! not a hidden module-level singleton, so tests can run isolated
//! instances.
//!
//! Concurrent reads and writes on the same key are tolerated;
//! last-writer-wins on a racing `set` is acceptable because freshness, not
//! linearizability, is the invariant here. No bounded-size eviction is
//! implemented for this workload.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;

use crate::types::MetadataRecord;

/// One cached record plus its expiry instant.
#[derive(Debug, Clone)]
struct CacheEntry {
    record: MetadataRecord,
    expires_at: Instant,
}

/// Thread-safe TTL store mapping normalized URL to metadata record.
#[derive(Debug, Default)]
pub struct MetaCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MetaCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a record, evicting it first if its TTL has elapsed.
    ///
    /// Returns `None` on absence or expiry.
    pub fn get(&self, key: &str) -> Option<MetadataRecord> {
        let expired = {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if Instant::now() < entry.expires_at => {
                    return Some(entry.record.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut entries = self.entries.write().unwrap();
            // Re-check under the write lock; a racing set may have
            // replaced the entry with a fresh one.
            if let Some(entry) = entries.get(key)
                && Instant::now() >= entry.expires_at
            {
                entries.remove(key);
                tracing::debug!("evicted expired cache entry for {}", key);
            }
        }

        None
    }

    /// Insert or overwrite a record with the given TTL.
    pub fn set(&self, key: impl Into<String>, record: MetadataRecord, ttl: Duration) {
        let entry = CacheEntry { record, expires_at: Instant::now() + ttl };
        self.entries.write().unwrap().insert(key.into(), entry);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    /// Number of entries currently stored (including not-yet-evicted
    /// expired ones).
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
