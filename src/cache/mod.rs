//! Cache Module
//!
//! Generic in-memory caching with TTL expiration and LRU eviction. Build one
//! instance per logical namespace (API responses, session data, ...) from a
//! [`crate::config::CacheConfig`] profile.

mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, EntryMetadata};
pub use lru::LruOrder;
pub use stats::CacheStats;
pub use store::CacheStore;
