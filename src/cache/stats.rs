//! Cache Statistics Module
//!
//! Tracks cache performance metrics: hits, misses, evictions and expiries.
//! Derived telemetry only, never authoritative state.

use serde::Serialize;

// == Cache Stats ==
/// Performance counters and a point-in-time view of a cache instance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of reads served from the cache
    pub hits: u64,
    /// Number of reads that found nothing usable (missing or expired)
    pub misses: u64,
    /// Number of entries evicted by the LRU policy
    pub evictions: u64,
    /// Number of entries removed because their TTL elapsed
    pub expired_removed: u64,
    /// Current number of physically stored entries
    pub size: usize,
    /// Configured capacity
    pub max_entries: usize,
    /// Sum of access counts across all live entries
    pub total_access_count: u64,
    /// Entries whose TTL has elapsed but which the sweep has not yet removed
    pub expired_pending: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// hits / (hits + misses), or 0.0 before any reads.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiry(&mut self) {
        self.expired_removed += 1;
    }
}
