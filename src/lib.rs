//! SyncLink - client-side data synchronization toolkit
//!
//! Keeps a client application's view of a remote backend fresh and cheap:
//! a TTL + LRU response cache, a deduplicating request coordinator with a
//! uniform error taxonomy, and pooled self-healing realtime channels.
//!
//! The three layers compose but stand alone:
//! - [`cache`]: generic in-memory store with TTL expiration and LRU eviction
//! - [`client`]: HTTP request coordination, caching and error classification
//! - [`channel`]: realtime connection pooling, reconnection and quality

pub mod cache;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod tasks;

pub use cache::{CacheStats, CacheStore};
pub use channel::{
    ChannelEvents, ChannelManager, ChannelMetrics, ChannelSubscription, ConnectionQuality,
    ConnectionState,
};
pub use client::{ApiClient, NoopHooks, RequestMetrics, RequestOptions, SessionHooks};
pub use config::{CacheConfig, ChannelConfig, Config, RequestConfig};
pub use error::{ApiError, ChannelError};
