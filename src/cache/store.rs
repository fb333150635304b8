//! Cache Store Module
//!
//! Generic time-and-capacity-bounded cache: per-entry TTL, LRU eviction on
//! overflow. Expiry is enforced lazily on every read plus by the periodic
//! sweep in `tasks::spawn_cleanup_task`; there are no per-entry timers.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, EntryMetadata, LruOrder};
use crate::config::CacheConfig;

// == Cache Store ==
/// Key-value cache with TTL expiration and LRU eviction.
///
/// `get` and `has` are the source of truth for "is this entry usable": they
/// never return an expired entry, no matter how far behind the sweep is.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Access-recency bookkeeping
    lru: LruOrder,
    /// Performance counters
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// TTL used when `set` is called without an explicit TTL
    default_ttl: Duration,
}

impl<V: Clone> CacheStore<V> {
    // == Constructors ==
    /// Creates a new store with the given capacity and default TTL.
    ///
    /// A capacity of zero would make inserts both mandatory (`set` always
    /// succeeds) and impossible; it is clamped to one entry.
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruOrder::new(),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
            default_ttl,
        }
    }

    /// Creates a new store from a [`CacheConfig`] profile.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.default_ttl)
    }

    // == Set ==
    /// Inserts or overwrites an entry. Always succeeds.
    ///
    /// Overwriting resets the TTL. Inserting a novel key while at capacity
    /// first evicts the least recently used entry.
    pub fn set(&mut self, key: String, value: V, ttl: Option<Duration>) {
        let is_overwrite = self.entries.contains_key(&key);

        if !is_overwrite && self.entries.len() >= self.max_entries {
            if let Some(evicted) = self.lru.pop_lru() {
                self.entries.remove(&evicted);
                self.stats.record_eviction();
                debug!(key = %evicted, "cache evicted LRU entry");
            }
        }

        let effective_ttl = ttl.unwrap_or(self.default_ttl);
        self.entries
            .insert(key.clone(), CacheEntry::new(value, effective_ttl));
        self.lru.touch(&key);

        debug!(key = %key, ttl_ms = effective_ttl.as_millis() as u64, "cache set");
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns `None` if the key is missing or expired; an expired entry is
    /// removed as a side effect. A hit bumps the entry's access stats and its
    /// LRU position.
    pub fn get(&mut self, key: &str) -> Option<V> {
        match self.entries.get(key) {
            None => {
                self.stats.record_miss();
                debug!(key = %key, "cache miss");
                return None;
            }
            Some(entry) if entry.is_expired() => {
                self.remove_expired(key);
                self.stats.record_miss();
                debug!(key = %key, "cache expired");
                return None;
            }
            Some(_) => {}
        }

        let value = self.entries.get_mut(key).map(|entry| {
            entry.touch();
            entry.value.clone()
        });
        self.lru.touch(key);
        self.stats.record_hit();
        value
    }

    // == Has ==
    /// Checks whether a usable (non-expired) entry exists.
    ///
    /// Same expiry semantics as `get`, but never mutates access stats or the
    /// LRU order.
    pub fn has(&mut self, key: &str) -> bool {
        match self.entries.get(key) {
            None => false,
            Some(entry) if entry.is_expired() => {
                self.remove_expired(key);
                false
            }
            Some(_) => true,
        }
    }

    // == Delete ==
    /// Removes an entry. Returns whether something was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.lru.forget(key);
            debug!(key = %key, "cache deleted");
            true
        } else {
            false
        }
    }

    // == Clear ==
    /// Removes all entries.
    pub fn clear(&mut self) {
        let size = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        debug!(entries_cleared = size, "cache cleared");
    }

    // == Cleanup Expired ==
    /// Sweeps out every entry whose TTL has elapsed.
    ///
    /// Safety net run on a fixed interval by the background task; `get` and
    /// `has` already refuse expired entries regardless of sweep cadence.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();
        for key in expired_keys {
            self.remove_expired(&key);
        }
        count
    }

    // == Stats ==
    /// Point-in-time statistics for this instance.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.size = self.entries.len();
        stats.max_entries = self.max_entries;
        stats.total_access_count = self.entries.values().map(|e| e.access_count).sum();
        stats.expired_pending = self.entries.values().filter(|e| e.is_expired()).count();
        stats
    }

    // == Debug Accessors ==
    /// All physically stored keys, including logically expired ones.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Lifecycle metadata for one entry, if physically present.
    pub fn metadata(&self, key: &str) -> Option<EntryMetadata> {
        self.entries.get(key).map(EntryMetadata::from)
    }

    /// Current number of physically stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Internal ==
    fn remove_expired(&mut self, key: &str) {
        self.entries.remove(key);
        self.lru.forget(key);
        self.stats.record_expiry();
    }
}
