//! Channel Manager Module
//!
//! Pools realtime connections by address: the first subscriber to an
//! address opens the physical connection, later subscribers attach to the
//! same one, and the last to disconnect tears it down. Session tokens are
//! appended to the connection URL as a query parameter at open time.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::channel::connection::{ChannelEvents, ConnectionState, SharedConnection};
use crate::channel::connector::{Connector, WsConnector};
use crate::channel::metrics::ChannelMetrics;
use crate::channel::quality::ConnectionQuality;
use crate::client::SessionHooks;
use crate::config::ChannelConfig;
use crate::error::ChannelError;

type Pool = Arc<Mutex<HashMap<String, Arc<SharedConnection>>>>;

// == Channel Manager ==
/// Owns the connection pool. Cheap to share; all methods take `&self`.
pub struct ChannelManager {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    hooks: Arc<dyn SessionHooks>,
    pool: Pool,
}

impl ChannelManager {
    /// Manager backed by real websocket connections.
    pub fn new(config: ChannelConfig, hooks: Arc<dyn SessionHooks>) -> Self {
        Self::with_connector(config, Arc::new(WsConnector), hooks)
    }

    /// Manager with a caller-supplied connector, used by tests to script
    /// sessions without a network.
    pub fn with_connector(
        config: ChannelConfig,
        connector: Arc<dyn Connector>,
        hooks: Arc<dyn SessionHooks>,
    ) -> Self {
        Self {
            config,
            connector,
            hooks,
            pool: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribes `events` to `address`, reusing a live pooled connection
    /// when one exists. A pooled connection that already reached `Closed`
    /// (reconnection gave up) is replaced by a fresh one.
    pub async fn connect(
        &self,
        address: &str,
        events: Arc<dyn ChannelEvents>,
    ) -> Result<ChannelSubscription, ChannelError> {
        let mut pool = self.pool.lock().await;

        let shared = match pool.get(address).cloned() {
            Some(existing) if existing.is_live() => {
                debug!(address, "reusing pooled channel");
                existing
            }
            stale => {
                if stale.is_some() {
                    info!(address, "replacing exhausted channel");
                }
                let url = self.connection_url(address)?;
                let shared = SharedConnection::spawn(
                    self.config.clone(),
                    self.connector.clone(),
                    address.to_string(),
                    url,
                );
                pool.insert(address.to_string(), shared.clone());
                shared
            }
        };
        drop(pool);

        let id = shared.attach(events).await;
        Ok(ChannelSubscription {
            id,
            shared,
            pool: self.pool.clone(),
        })
    }

    /// Deliberately closes every pooled connection.
    pub async fn shutdown(&self) {
        let mut pool = self.pool.lock().await;
        for (address, shared) in pool.drain() {
            info!(address = %address, "shutting down pooled channel");
            shared.shutdown();
        }
    }

    /// Number of pooled connections, exhausted ones included.
    pub async fn pool_size(&self) -> usize {
        self.pool.lock().await.len()
    }

    fn connection_url(&self, address: &str) -> Result<String, ChannelError> {
        let mut url = Url::parse(address)
            .map_err(|e| ChannelError::InvalidAddress(format!("{address}: {e}")))?;
        if let Some(token) = self.hooks.token() {
            url.query_pairs_mut().append_pair("token", &token);
        }
        Ok(url.into())
    }
}

// == Channel Subscription ==
/// One subscriber's handle onto a pooled connection. Dropping it without
/// calling `disconnect` leaves the subscription attached.
pub struct ChannelSubscription {
    id: u64,
    shared: Arc<SharedConnection>,
    pool: Pool,
}

impl ChannelSubscription {
    /// Serializes `payload` and queues it for the peer. Returns false when
    /// the connection is not Open; the message is dropped, not buffered.
    pub fn send(&self, payload: &Value) -> bool {
        self.shared.send(payload.to_string())
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub async fn quality(&self) -> ConnectionQuality {
        self.shared.quality().await
    }

    pub async fn metrics(&self) -> ChannelMetrics {
        self.shared.metrics().await
    }

    /// Detaches this subscriber. The last detach closes the physical
    /// connection normally and removes it from the pool.
    pub async fn disconnect(self) {
        let remaining = self.shared.detach(self.id).await;
        if remaining > 0 {
            debug!(
                address = %self.shared.address(),
                remaining,
                "subscriber detached, channel stays up"
            );
            return;
        }

        info!(address = %self.shared.address(), "last subscriber detached, closing channel");
        self.shared.shutdown();

        let mut pool = self.pool.lock().await;
        if let Some(pooled) = pool.get(self.shared.address()) {
            if Arc::ptr_eq(pooled, &self.shared) {
                pool.remove(self.shared.address());
            } else {
                warn!(
                    address = %self.shared.address(),
                    "pool already holds a newer channel for this address"
                );
            }
        }
    }
}
