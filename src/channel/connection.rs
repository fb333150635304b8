//! Managed Connection Module
//!
//! One long-lived connection to an address, owned by a driver task:
//! establishes the link, replies to pings, emits pings and heartbeats,
//! forwards payloads to subscribers and reconnects with exponential backoff
//! on unexpected closes. Subscribers attach and detach while the connection
//! stays alive; the last detach shuts it down deliberately.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::time::{interval_at, Instant};
use tracing::{info, warn};

use crate::channel::connector::{Connector, Duplex, Incoming, Outgoing};
use crate::channel::frame::{
    heartbeat_frame, is_intentional_close, now_ms, parse_frame, ping_frame, pong_frame,
    InboundFrame, CLOSE_ABNORMAL, CLOSE_NORMAL,
};
use crate::channel::metrics::ChannelMetrics;
use crate::channel::quality::{classify, ConnectionQuality};
use crate::config::ChannelConfig;

// == Connection State ==
/// Lifecycle of a managed connection. `Closed` is terminal: it means either
/// a deliberate teardown or reconnect-attempt exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

// == Channel Events ==
/// Subscriber callbacks. Control frames (ping/pong/heartbeat) are consumed
/// internally and never reach `on_message`.
pub trait ChannelEvents: Send + Sync {
    /// An application payload arrived.
    fn on_message(&self, _payload: Value) {}
    /// A connection-level failure occurred; reconnection is handled
    /// internally, this is informational.
    fn on_error(&self, _reason: &str) {}
    /// The connection reached Open (initially or after a reconnect).
    fn on_open(&self) {}
    /// The connection closed with the given close code.
    fn on_close(&self, _code: u16) {}
}

// == Commands ==
/// Handle-to-driver messages.
pub(crate) enum Command {
    /// Forward a text frame to the peer
    Send(String),
    /// Deliberate teardown: close normally, skip the reconnection policy
    Shutdown,
}

type SubscriberMap = Arc<RwLock<HashMap<u64, Arc<dyn ChannelEvents>>>>;

// == Backoff ==
/// Delay before reconnection attempt `attempt` (1-based):
/// `base * 2^(attempt-1)`.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

// == Shared Connection ==
/// Handle side of one pooled connection, shared by every subscriber to the
/// same address.
pub(crate) struct SharedConnection {
    address: String,
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    metrics: Arc<Mutex<ChannelMetrics>>,
    subscribers: SubscriberMap,
    next_id: AtomicU64,
}

impl SharedConnection {
    /// Spawns the driver task for `url` and returns the shared handle.
    pub(crate) fn spawn(
        config: ChannelConfig,
        connector: Arc<dyn Connector>,
        address: String,
        url: String,
    ) -> Arc<Self> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let metrics = Arc::new(Mutex::new(ChannelMetrics::new()));
        let subscribers: SubscriberMap = Arc::new(RwLock::new(HashMap::new()));

        tokio::spawn(run_connection(
            config,
            connector,
            address.clone(),
            url,
            state_tx,
            cmd_rx,
            metrics.clone(),
            subscribers.clone(),
        ));

        Arc::new(Self {
            address,
            cmd_tx,
            state_rx,
            metrics,
            subscribers,
            next_id: AtomicU64::new(1),
        })
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// A closed connection cannot be attached to; the pool replaces it.
    pub(crate) fn is_live(&self) -> bool {
        self.state() != ConnectionState::Closed
    }

    /// Registers a subscriber and returns its detach id.
    pub(crate) async fn attach(&self, events: Arc<dyn ChannelEvents>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().await.insert(id, events);
        id
    }

    /// Removes a subscriber; returns how many remain attached.
    pub(crate) async fn detach(&self, id: u64) -> usize {
        let mut subscribers = self.subscribers.write().await;
        subscribers.remove(&id);
        subscribers.len()
    }

    /// Queues a frame for the peer. No-ops with a warning when the
    /// connection is not Open; there is no buffering or replay.
    pub(crate) fn send(&self, text: String) -> bool {
        if self.state() != ConnectionState::Open {
            warn!(address = %self.address, "channel is not open; dropping message");
            return false;
        }
        self.cmd_tx.send(Command::Send(text)).is_ok()
    }

    /// Deliberate teardown; never triggers reconnection.
    pub(crate) fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }

    pub(crate) async fn metrics(&self) -> ChannelMetrics {
        self.metrics.lock().await.clone()
    }

    /// Advisory quality, Unknown unless the connection is Open.
    pub(crate) async fn quality(&self) -> ConnectionQuality {
        if self.state() != ConnectionState::Open {
            return ConnectionQuality::Unknown;
        }
        let metrics = self.metrics.lock().await;
        classify(metrics.reconnects, metrics.average_latency_ms)
    }
}

async fn subscriber_snapshot(subscribers: &SubscriberMap) -> Vec<Arc<dyn ChannelEvents>> {
    subscribers.read().await.values().cloned().collect()
}

// == Driver ==
/// Owns the physical connection for its whole lifetime, reconnection
/// included. Attempts for one address are serialized by construction: this
/// task is the only place a connection to `url` is ever opened.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_connection(
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    address: String,
    url: String,
    state_tx: watch::Sender<ConnectionState>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    metrics: Arc<Mutex<ChannelMetrics>>,
    subscribers: SubscriberMap,
) {
    let mut attempts: u32 = 0;

    loop {
        let _ = state_tx.send(ConnectionState::Connecting);

        match connector.open(&url).await {
            Ok(duplex) => {
                attempts = 0;
                let _ = state_tx.send(ConnectionState::Open);
                info!(address = %address, "channel connected");
                for events in subscriber_snapshot(&subscribers).await {
                    events.on_open();
                }

                let code = drive_session(
                    &config,
                    duplex,
                    &mut cmd_rx,
                    &state_tx,
                    &metrics,
                    &subscribers,
                )
                .await;

                for events in subscriber_snapshot(&subscribers).await {
                    events.on_close(code);
                }

                if is_intentional_close(code) {
                    let _ = state_tx.send(ConnectionState::Closed);
                    info!(address = %address, code, "channel closed");
                    return;
                }
                warn!(address = %address, code, "channel closed unexpectedly");
            }
            Err(e) => {
                warn!(address = %address, error = %e, "channel connect failed");
                for events in subscriber_snapshot(&subscribers).await {
                    events.on_error(&e.to_string());
                }
            }
        }

        // Unexpected close or failed open: back off, then try again.
        attempts += 1;
        metrics.lock().await.record_reconnect();

        if attempts > config.max_reconnect_attempts {
            warn!(
                address = %address,
                max_attempts = config.max_reconnect_attempts,
                "max reconnection attempts reached, giving up"
            );
            let _ = state_tx.send(ConnectionState::Closed);
            return;
        }

        let delay = backoff_delay(config.reconnect_delay, attempts);
        info!(
            address = %address,
            attempt = attempts,
            max_attempts = config.max_reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Send(_)) => {
                        warn!(address = %address, "channel is not open; dropping message");
                    }
                    Some(Command::Shutdown) | None => {
                        let _ = state_tx.send(ConnectionState::Closed);
                        return;
                    }
                },
            }
        }
    }
}

/// Runs one open session until it closes; returns the close code.
async fn drive_session(
    config: &ChannelConfig,
    duplex: Duplex,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    state_tx: &watch::Sender<ConnectionState>,
    metrics: &Arc<Mutex<ChannelMetrics>>,
    subscribers: &SubscriberMap,
) -> u16 {
    let Duplex {
        outgoing,
        mut incoming,
    } = duplex;

    // interval_at skips the immediate first tick interval() would fire.
    let mut ping = interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    let mut heartbeat = interval_at(
        Instant::now() + config.heartbeat_interval,
        config.heartbeat_interval,
    );

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Send(text)) => {
                    metrics.lock().await.record_sent();
                    if outgoing.send(Outgoing::Text(text)).await.is_err() {
                        return CLOSE_ABNORMAL;
                    }
                }
                Some(Command::Shutdown) | None => {
                    let _ = state_tx.send(ConnectionState::Closing);
                    let _ = outgoing.send(Outgoing::Close).await;
                    return CLOSE_NORMAL;
                }
            },
            _ = ping.tick() => {
                if outgoing.send(Outgoing::Text(ping_frame(now_ms()))).await.is_err() {
                    return CLOSE_ABNORMAL;
                }
            }
            _ = heartbeat.tick() => {
                if outgoing.send(Outgoing::Text(heartbeat_frame(now_ms()))).await.is_err() {
                    return CLOSE_ABNORMAL;
                }
            }
            inbound = incoming.recv() => match inbound {
                Some(Incoming::Text(text)) => {
                    handle_frame(&text, &outgoing, metrics, subscribers).await;
                }
                Some(Incoming::Closed { code }) => return code,
                None => return CLOSE_ABNORMAL,
            },
        }
    }
}

/// Classifies one inbound frame. Control frames are consumed here; payloads
/// fan out to every subscriber.
async fn handle_frame(
    text: &str,
    outgoing: &mpsc::Sender<Outgoing>,
    metrics: &Arc<Mutex<ChannelMetrics>>,
    subscribers: &SubscriberMap,
) {
    match parse_frame(text) {
        Err(e) => warn!(error = %e, "discarding unparseable frame"),
        Ok(InboundFrame::Ping { timestamp }) => {
            let _ = outgoing.send(Outgoing::Text(pong_frame(timestamp))).await;
        }
        Ok(InboundFrame::Pong { timestamp }) => {
            let latency = now_ms() - timestamp;
            if latency >= 0 {
                metrics.lock().await.record_latency(latency as f64);
            }
        }
        Ok(InboundFrame::Heartbeat) => {}
        Ok(InboundFrame::Payload(payload)) => {
            metrics.lock().await.record_received();
            for events in subscriber_snapshot(subscribers).await {
                events.on_message(payload.clone());
            }
        }
    }
}
