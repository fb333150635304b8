//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries.
//!
//! The per-read expiry check in [`CacheStore`] already guarantees that no
//! expired entry is ever returned; this sweep only reclaims memory for
//! entries nobody reads again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a background task that sweeps a cache at a fixed interval.
///
/// The returned handle can be used to abort the task during shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(CacheStore::from_config(&config)));
/// let sweeper = spawn_cleanup_task(cache.clone(), config.cleanup_interval);
/// // Later, during shutdown:
/// sweeper.abort();
/// ```
pub fn spawn_cleanup_task<V>(
    cache: Arc<RwLock<CacheStore<V>>>,
    interval: Duration,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting TTL sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut guard = cache.write().await;
                guard.cleanup_expired()
            };

            if removed > 0 {
                info!(removed, "TTL sweep removed expired entries");
            } else {
                debug!("TTL sweep found no expired entries");
            }
        }
    })
}
