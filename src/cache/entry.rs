//! Cache Entry Module
//!
//! Defines the structure of individual cache entries with TTL and
//! access-tracking metadata.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// A single cached value together with its lifecycle metadata.
///
/// An entry is logically absent once `now > expires_at`, regardless of when
/// the background sweep physically removes it.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Timestamp of the most recent read (Unix milliseconds)
    pub last_accessed: u64,
    /// Number of reads served from this entry
    pub access_count: u64,
}

impl<V> CacheEntry<V> {
    /// Creates a new entry expiring `ttl` from now.
    pub fn new(value: V, ttl: Duration) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            created_at: now,
            expires_at: now + ttl.as_millis() as u64,
            last_accessed: now,
            access_count: 0,
        }
    }

    /// Checks whether the entry's TTL has elapsed.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() > self.expires_at
    }

    /// Records a read: bumps the access count and refreshes `last_accessed`.
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed = current_timestamp_ms();
    }

    /// Remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }
}

// == Entry Metadata ==
/// Read-only view of an entry's lifecycle, for debugging and stats.
#[derive(Debug, Clone)]
pub struct EntryMetadata {
    pub created_at: u64,
    pub expires_at: u64,
    pub last_accessed: u64,
    pub access_count: u64,
    pub is_expired: bool,
    pub age_ms: u64,
    pub ttl_remaining_ms: u64,
}

impl<V> From<&CacheEntry<V>> for EntryMetadata {
    fn from(entry: &CacheEntry<V>) -> Self {
        let now = current_timestamp_ms();
        Self {
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            last_accessed: entry.last_accessed,
            access_count: entry.access_count,
            is_expired: entry.is_expired(),
            age_ms: now.saturating_sub(entry.created_at),
            ttl_remaining_ms: entry.ttl_remaining_ms(),
        }
    }
}

// == Utility Functions ==
/// Returns the current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
