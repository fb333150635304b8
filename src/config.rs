//! Configuration Module
//!
//! Handles loading and managing sync-layer configuration from environment
//! variables. Each subsystem gets its own config struct so independent
//! instances (e.g. an API-response cache vs. a session cache) can be built
//! with different profiles instead of sharing module-level singletons.

use std::env;
use std::time::Duration;

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

// == Cache Config ==
/// Parameters for one cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before LRU eviction kicks in
    pub max_entries: usize,
    /// TTL applied to entries stored without an explicit TTL
    pub default_ttl: Duration,
    /// Interval of the background sweep that removes expired entries
    pub cleanup_interval: Duration,
}

impl CacheConfig {
    /// Loads values from environment variables.
    ///
    /// # Environment Variables
    /// - `SYNCLINK_CACHE_MAX_ENTRIES` - Maximum cache entries (default: 100)
    /// - `SYNCLINK_CACHE_TTL_MS` - Default TTL in ms (default: 300000)
    /// - `SYNCLINK_CLEANUP_INTERVAL_MS` - Sweep interval in ms (default: 60000)
    pub fn from_env() -> Self {
        Self {
            max_entries: env_u64("SYNCLINK_CACHE_MAX_ENTRIES", 100) as usize,
            default_ttl: env_ms("SYNCLINK_CACHE_TTL_MS", 300_000),
            cleanup_interval: env_ms("SYNCLINK_CLEANUP_INTERVAL_MS", 60_000),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            default_ttl: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

// == Request Config ==
/// Parameters for the request coordinator.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Default per-call timeout, overridable per request
    pub timeout: Duration,
    /// Window during which identical error notifications are suppressed
    pub notice_window: Duration,
    /// Profile of the internal GET-response cache
    pub cache: CacheConfig,
}

impl RequestConfig {
    /// Loads values from environment variables.
    ///
    /// # Environment Variables
    /// - `SYNCLINK_REQUEST_TIMEOUT_MS` - Call timeout in ms (default: 30000)
    /// - `SYNCLINK_NOTICE_WINDOW_MS` - Error dedup window in ms (default: 5000)
    pub fn from_env() -> Self {
        Self {
            timeout: env_ms("SYNCLINK_REQUEST_TIMEOUT_MS", 30_000),
            notice_window: env_ms("SYNCLINK_NOTICE_WINDOW_MS", 5_000),
            cache: CacheConfig::from_env(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            notice_window: Duration::from_secs(5),
            cache: CacheConfig::default(),
        }
    }
}

// == Channel Config ==
/// Parameters for realtime channel connections.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Base delay of the exponential reconnect backoff
    pub reconnect_delay: Duration,
    /// Consecutive reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Interval between latency-measuring ping frames
    pub ping_interval: Duration,
    /// Interval between keepalive heartbeat frames
    pub heartbeat_interval: Duration,
}

impl ChannelConfig {
    /// Loads values from environment variables.
    ///
    /// # Environment Variables
    /// - `SYNCLINK_RECONNECT_DELAY_MS` - Backoff base delay in ms (default: 5000)
    /// - `SYNCLINK_MAX_RECONNECT_ATTEMPTS` - Attempt cap (default: 5)
    /// - `SYNCLINK_PING_INTERVAL_MS` - Ping cadence in ms (default: 60000)
    /// - `SYNCLINK_HEARTBEAT_INTERVAL_MS` - Heartbeat cadence in ms (default: 30000)
    pub fn from_env() -> Self {
        Self {
            reconnect_delay: env_ms("SYNCLINK_RECONNECT_DELAY_MS", 5_000),
            max_reconnect_attempts: env_u64("SYNCLINK_MAX_RECONNECT_ATTEMPTS", 5) as u32,
            ping_interval: env_ms("SYNCLINK_PING_INTERVAL_MS", 60_000),
            heartbeat_interval: env_ms("SYNCLINK_HEARTBEAT_INTERVAL_MS", 30_000),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            ping_interval: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

// == Combined Config ==
/// Full configuration for the sync layer.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub request: RequestConfig,
    pub channel: ChannelConfig,
}

impl Config {
    /// Creates a new Config by loading all sections from the environment.
    pub fn from_env() -> Self {
        Self {
            request: RequestConfig::from_env(),
            channel: ChannelConfig::from_env(),
        }
    }
}
