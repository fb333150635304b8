//! Integration Tests for the Channel Manager
//!
//! Drives pooled connections against a scripted connector: pooling,
//! reconnection with backoff, ping/pong probing, close handling and
//! quality/metrics reporting, all without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;

use synclink::channel::{
    now_ms, Connector, Duplex, Incoming, Outgoing, CLOSE_ABNORMAL, CLOSE_NORMAL,
};
use synclink::{
    ChannelConfig, ChannelError, ChannelEvents, ChannelManager, ChannelSubscription,
    ConnectionQuality, ConnectionState, NoopHooks, SessionHooks,
};

// == Scripted Connector ==

#[derive(Clone, Copy)]
enum OpenPlan {
    /// Refuse the connection
    Fail,
    /// Open a session and hand its server end to the test
    Session,
}

/// The server side of one scripted session.
struct ServerEnd {
    from_client: mpsc::Receiver<Outgoing>,
    to_client: mpsc::Sender<Incoming>,
}

impl ServerEnd {
    async fn send_text(&self, text: String) {
        self.to_client
            .send(Incoming::Text(text))
            .await
            .expect("client side gone");
    }

    async fn close(&self, code: u16) {
        let _ = self.to_client.send(Incoming::Closed { code }).await;
    }

    /// Next frame from the client, skipping nothing.
    async fn recv(&mut self) -> Outgoing {
        timeout(Duration::from_secs(2), self.from_client.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client side gone")
    }
}

struct MockConnector {
    plans: std::sync::Mutex<VecDeque<OpenPlan>>,
    opens: AtomicUsize,
    last_url: std::sync::Mutex<Option<String>>,
    sessions: mpsc::UnboundedSender<ServerEnd>,
}

impl MockConnector {
    /// Connector plus the stream of server ends it will produce. Once the
    /// scripted plans run out, every further open succeeds.
    fn new(plans: Vec<OpenPlan>) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (sessions, session_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            plans: std::sync::Mutex::new(plans.into()),
            opens: AtomicUsize::new(0),
            last_url: std::sync::Mutex::new(None),
            sessions,
        });
        (connector, session_rx)
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn last_url(&self) -> Option<String> {
        self.last_url.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> Result<Duplex, ChannelError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(url.to_string());

        let plan = self
            .plans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(OpenPlan::Session);
        match plan {
            OpenPlan::Fail => Err(ChannelError::ConnectFailed("scripted refusal".to_string())),
            OpenPlan::Session => {
                let (out_tx, out_rx) = mpsc::channel(64);
                let (in_tx, in_rx) = mpsc::channel(64);
                let _ = self.sessions.send(ServerEnd {
                    from_client: out_rx,
                    to_client: in_tx,
                });
                Ok(Duplex {
                    outgoing: out_tx,
                    incoming: in_rx,
                })
            }
        }
    }
}

// == Recording Events ==

#[derive(Default)]
struct RecordingEvents {
    messages: std::sync::Mutex<Vec<Value>>,
    closes: std::sync::Mutex<Vec<u16>>,
    errors: std::sync::Mutex<Vec<String>>,
}

impl RecordingEvents {
    fn messages(&self) -> Vec<Value> {
        self.messages.lock().unwrap().clone()
    }

    fn closes(&self) -> Vec<u16> {
        self.closes.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl ChannelEvents for RecordingEvents {
    fn on_message(&self, payload: Value) {
        self.messages.lock().unwrap().push(payload);
    }

    fn on_error(&self, reason: &str) {
        self.errors.lock().unwrap().push(reason.to_string());
    }

    fn on_close(&self, code: u16) {
        self.closes.lock().unwrap().push(code);
    }
}

// == Helpers ==

fn quiet_config() -> ChannelConfig {
    // Intervals far in the future so control frames don't interfere
    ChannelConfig {
        reconnect_delay: Duration::from_millis(10),
        max_reconnect_attempts: 5,
        ping_interval: Duration::from_secs(3600),
        heartbeat_interval: Duration::from_secs(3600),
    }
}

fn manager_with(
    config: ChannelConfig,
    connector: Arc<MockConnector>,
) -> ChannelManager {
    ChannelManager::with_connector(config, connector, Arc::new(NoopHooks))
}

async fn wait_for_state(sub: &ChannelSubscription, want: ConnectionState) {
    for _ in 0..200 {
        if sub.state() == want {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for state {:?}", want);
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for condition");
}

async fn next_session(rx: &mut mpsc::UnboundedReceiver<ServerEnd>) -> ServerEnd {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a session")
        .expect("connector gone")
}

// == Pooling Tests ==

#[tokio::test]
async fn test_subscribers_share_one_connection() {
    let (connector, mut sessions) = MockConnector::new(vec![]);
    let manager = manager_with(quiet_config(), connector.clone());

    let first = Arc::new(RecordingEvents::default());
    let second = Arc::new(RecordingEvents::default());
    let sub_a = manager.connect("ws://hub/tickets", first.clone()).await.unwrap();
    let sub_b = manager.connect("ws://hub/tickets", second.clone()).await.unwrap();

    wait_for_state(&sub_a, ConnectionState::Open).await;
    assert_eq!(connector.opens(), 1);
    assert_eq!(manager.pool_size().await, 1);

    // Both subscribers see every payload
    let server = next_session(&mut sessions).await;
    server.send_text(json!({"event": "assigned", "ticket": 7}).to_string()).await;

    wait_until(|| !first.messages().is_empty() && !second.messages().is_empty()).await;
    assert_eq!(first.messages()[0]["ticket"], 7);
    assert_eq!(second.messages()[0]["ticket"], 7);

    sub_b.disconnect().await;
    sub_a.disconnect().await;
}

#[tokio::test]
async fn test_partial_disconnect_keeps_connection_alive() {
    let (connector, mut sessions) = MockConnector::new(vec![]);
    let manager = manager_with(quiet_config(), connector.clone());

    let first = Arc::new(RecordingEvents::default());
    let second = Arc::new(RecordingEvents::default());
    let sub_a = manager.connect("ws://hub/alerts", first.clone()).await.unwrap();
    let sub_b = manager.connect("ws://hub/alerts", second).await.unwrap();
    wait_for_state(&sub_a, ConnectionState::Open).await;
    let mut server = next_session(&mut sessions).await;

    sub_b.disconnect().await;
    assert_eq!(manager.pool_size().await, 1);

    // The surviving subscriber can still talk
    assert!(sub_a.send(&json!({"ack": true})));
    match server.recv().await {
        Outgoing::Text(text) => assert_eq!(text, json!({"ack": true}).to_string()),
        Outgoing::Close => panic!("connection closed after partial disconnect"),
    }

    sub_a.disconnect().await;
}

#[tokio::test]
async fn test_last_disconnect_closes_normally() {
    let (connector, mut sessions) = MockConnector::new(vec![]);
    let manager = manager_with(quiet_config(), connector.clone());

    let events = Arc::new(RecordingEvents::default());
    let sub = manager.connect("ws://hub/tickets", events.clone()).await.unwrap();
    wait_for_state(&sub, ConnectionState::Open).await;
    let mut server = next_session(&mut sessions).await;

    sub.disconnect().await;
    assert_eq!(manager.pool_size().await, 0);

    // The peer sees a deliberate close, and no reconnection follows
    assert!(matches!(server.recv().await, Outgoing::Close));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(connector.opens(), 1);
}

// == Reconnection Tests ==

#[tokio::test]
async fn test_reconnects_after_unexpected_drop() {
    let (connector, mut sessions) = MockConnector::new(vec![]);
    let manager = manager_with(quiet_config(), connector.clone());

    let events = Arc::new(RecordingEvents::default());
    let sub = manager.connect("ws://hub/tickets", events.clone()).await.unwrap();
    wait_for_state(&sub, ConnectionState::Open).await;
    let server = next_session(&mut sessions).await;

    server.close(CLOSE_ABNORMAL).await;

    // A replacement session comes up on the same handle
    let replacement = next_session(&mut sessions).await;
    wait_for_state(&sub, ConnectionState::Open).await;
    assert_eq!(connector.opens(), 2);
    assert_eq!(events.closes(), vec![CLOSE_ABNORMAL]);
    assert_eq!(sub.metrics().await.reconnects, 1);

    // The old subscription still receives on the new session
    replacement
        .send_text(json!({"event": "resumed"}).to_string())
        .await;
    wait_until(|| !events.messages().is_empty()).await;

    sub.disconnect().await;
}

#[tokio::test]
async fn test_normal_close_is_final() {
    let (connector, mut sessions) = MockConnector::new(vec![]);
    let manager = manager_with(quiet_config(), connector.clone());

    let events = Arc::new(RecordingEvents::default());
    let sub = manager.connect("ws://hub/tickets", events.clone()).await.unwrap();
    wait_for_state(&sub, ConnectionState::Open).await;
    let server = next_session(&mut sessions).await;

    server.close(CLOSE_NORMAL).await;

    wait_for_state(&sub, ConnectionState::Closed).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(connector.opens(), 1);
    assert_eq!(events.closes(), vec![CLOSE_NORMAL]);
    assert_eq!(sub.quality().await, ConnectionQuality::Unknown);
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let (connector, _sessions) = MockConnector::new(vec![OpenPlan::Fail; 10]);
    let config = ChannelConfig {
        max_reconnect_attempts: 2,
        ..quiet_config()
    };
    let manager = manager_with(config, connector.clone());

    let events = Arc::new(RecordingEvents::default());
    let sub = manager.connect("ws://hub/tickets", events.clone()).await.unwrap();

    wait_for_state(&sub, ConnectionState::Closed).await;
    // Initial attempt plus two retries
    assert_eq!(connector.opens(), 3);
    assert_eq!(events.errors().len(), 3);
    assert!(!sub.send(&json!({"late": true})));
}

#[tokio::test]
async fn test_exhausted_connection_is_replaced_on_next_connect() {
    let (connector, mut sessions) = MockConnector::new(vec![OpenPlan::Fail; 3]);
    let config = ChannelConfig {
        max_reconnect_attempts: 2,
        ..quiet_config()
    };
    let manager = manager_with(config, connector.clone());

    let dead = manager
        .connect("ws://hub/tickets", Arc::new(RecordingEvents::default()))
        .await
        .unwrap();
    wait_for_state(&dead, ConnectionState::Closed).await;

    // Plans are exhausted, so the replacement opens successfully
    let sub = manager
        .connect("ws://hub/tickets", Arc::new(RecordingEvents::default()))
        .await
        .unwrap();
    wait_for_state(&sub, ConnectionState::Open).await;
    let _server = next_session(&mut sessions).await;
    assert_eq!(manager.pool_size().await, 1);

    sub.disconnect().await;
}

// == Control Frame Tests ==

#[tokio::test]
async fn test_server_ping_answered_with_pong() {
    let (connector, mut sessions) = MockConnector::new(vec![]);
    let manager = manager_with(quiet_config(), connector);

    let events = Arc::new(RecordingEvents::default());
    let sub = manager.connect("ws://hub/tickets", events.clone()).await.unwrap();
    wait_for_state(&sub, ConnectionState::Open).await;
    let mut server = next_session(&mut sessions).await;

    server
        .send_text(json!({"type": "ping", "timestamp": 123456}).to_string())
        .await;

    match server.recv().await {
        Outgoing::Text(text) => {
            let frame: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(frame["type"], "pong");
            assert_eq!(frame["timestamp"], 123456);
        }
        Outgoing::Close => panic!("expected a pong frame"),
    }

    // Control frames never reach subscribers
    assert!(events.messages().is_empty());

    sub.disconnect().await;
}

#[tokio::test]
async fn test_pong_latency_feeds_metrics_and_quality() {
    let (connector, mut sessions) = MockConnector::new(vec![]);
    let manager = manager_with(quiet_config(), connector);

    let sub = manager
        .connect("ws://hub/tickets", Arc::new(RecordingEvents::default()))
        .await
        .unwrap();
    wait_for_state(&sub, ConnectionState::Open).await;
    let server = next_session(&mut sessions).await;

    // A pong whose echoed timestamp is 10ms in the past
    server
        .send_text(json!({"type": "pong", "timestamp": now_ms() - 10}).to_string())
        .await;

    let mut samples = 0;
    for _ in 0..100 {
        let metrics = sub.metrics().await;
        samples = metrics.latency_samples;
        if samples > 0 {
            assert!(metrics.last_latency_ms >= 10.0);
            assert!(metrics.last_latency_ms < 1000.0);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(samples, 1);

    // No reconnects and a sub-100ms average rates Excellent
    assert_eq!(sub.quality().await, ConnectionQuality::Excellent);

    sub.disconnect().await;
}

#[tokio::test]
async fn test_ping_and_heartbeat_emitted_on_interval() {
    let (connector, mut sessions) = MockConnector::new(vec![]);
    let config = ChannelConfig {
        ping_interval: Duration::from_millis(40),
        heartbeat_interval: Duration::from_millis(40),
        ..quiet_config()
    };
    let manager = manager_with(config, connector);

    let sub = manager
        .connect("ws://hub/tickets", Arc::new(RecordingEvents::default()))
        .await
        .unwrap();
    wait_for_state(&sub, ConnectionState::Open).await;
    let mut server = next_session(&mut sessions).await;

    let mut saw_ping = false;
    let mut saw_heartbeat = false;
    for _ in 0..6 {
        if let Outgoing::Text(text) = server.recv().await {
            let frame: Value = serde_json::from_str(&text).unwrap();
            match frame["type"].as_str() {
                Some("ping") => saw_ping = true,
                Some("heartbeat") => saw_heartbeat = true,
                _ => {}
            }
        }
        if saw_ping && saw_heartbeat {
            break;
        }
    }
    assert!(saw_ping, "no ping within the window");
    assert!(saw_heartbeat, "no heartbeat within the window");

    sub.disconnect().await;
}

// == Messaging Tests ==

#[tokio::test]
async fn test_send_counts_and_reaches_the_peer() {
    let (connector, mut sessions) = MockConnector::new(vec![]);
    let manager = manager_with(quiet_config(), connector);

    let sub = manager
        .connect("ws://hub/tickets", Arc::new(RecordingEvents::default()))
        .await
        .unwrap();
    wait_for_state(&sub, ConnectionState::Open).await;
    let mut server = next_session(&mut sessions).await;

    assert!(sub.send(&json!({"op": "subscribe", "topic": "tickets"})));
    match server.recv().await {
        Outgoing::Text(text) => {
            assert_eq!(text, json!({"op": "subscribe", "topic": "tickets"}).to_string());
        }
        Outgoing::Close => panic!("expected the subscribe frame"),
    }

    let mut sent = 0;
    for _ in 0..100 {
        sent = sub.metrics().await.messages_sent;
        if sent == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(sent, 1);

    sub.disconnect().await;
}

#[tokio::test]
async fn test_send_fails_while_not_open() {
    let (connector, _sessions) = MockConnector::new(vec![OpenPlan::Fail; 10]);
    let config = ChannelConfig {
        // Long delay keeps the connection in its backoff window
        reconnect_delay: Duration::from_secs(3600),
        ..quiet_config()
    };
    let manager = manager_with(config, connector);

    let sub = manager
        .connect("ws://hub/tickets", Arc::new(RecordingEvents::default()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_ne!(sub.state(), ConnectionState::Open);
    assert!(!sub.send(&json!({"op": "subscribe"})));

    sub.disconnect().await;
}

// == Address Tests ==

#[tokio::test]
async fn test_session_token_appended_to_url() {
    struct TokenHooks;
    impl SessionHooks for TokenHooks {
        fn token(&self) -> Option<String> {
            Some("secret-token".to_string())
        }
    }

    let (connector, mut sessions) = MockConnector::new(vec![]);
    let manager = ChannelManager::with_connector(
        quiet_config(),
        connector.clone(),
        Arc::new(TokenHooks),
    );

    let sub = manager
        .connect("ws://hub/tickets", Arc::new(RecordingEvents::default()))
        .await
        .unwrap();
    wait_for_state(&sub, ConnectionState::Open).await;
    let _server = next_session(&mut sessions).await;

    let url = connector.last_url().unwrap();
    assert!(url.contains("token=secret-token"), "url was {url}");

    sub.disconnect().await;
}

#[tokio::test]
async fn test_invalid_address_rejected() {
    let (connector, _sessions) = MockConnector::new(vec![]);
    let manager = manager_with(quiet_config(), connector.clone());

    let result = manager
        .connect("not a url", Arc::new(RecordingEvents::default()))
        .await;
    assert!(matches!(result, Err(ChannelError::InvalidAddress(_))));
    assert_eq!(connector.opens(), 0);
}

#[tokio::test]
async fn test_shutdown_drains_the_pool() {
    let (connector, mut sessions) = MockConnector::new(vec![]);
    let manager = manager_with(quiet_config(), connector);

    let sub_a = manager
        .connect("ws://hub/tickets", Arc::new(RecordingEvents::default()))
        .await
        .unwrap();
    let sub_b = manager
        .connect("ws://hub/alerts", Arc::new(RecordingEvents::default()))
        .await
        .unwrap();
    wait_for_state(&sub_a, ConnectionState::Open).await;
    wait_for_state(&sub_b, ConnectionState::Open).await;
    let mut first = next_session(&mut sessions).await;
    let mut second = next_session(&mut sessions).await;

    manager.shutdown().await;

    assert!(matches!(first.recv().await, Outgoing::Close));
    assert!(matches!(second.recv().await, Outgoing::Close));
    assert_eq!(manager.pool_size().await, 0);
}
