//! Wire Frame Module
//!
//! JSON text frames exchanged over the duplex connection. Control frames
//! (ping, pong, heartbeat) are produced and consumed inside the channel
//! layer; anything else is an application payload forwarded verbatim to
//! subscribers.

use serde_json::{json, Value};

// == Close Codes ==
/// Normal closure; never triggers reconnection.
pub const CLOSE_NORMAL: u16 = 1000;
/// Peer going away; treated as intentional.
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Synthetic code for a connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Codes that mean the close was deliberate. Everything else engages the
/// backoff policy.
pub fn is_intentional_close(code: u16) -> bool {
    code == CLOSE_NORMAL || code == CLOSE_GOING_AWAY
}

// == Inbound Frame ==
/// Classified inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Peer latency probe; must be answered with a pong echoing the timestamp
    Ping { timestamp: i64 },
    /// Echo of one of our pings; latency = now - timestamp
    Pong { timestamp: i64 },
    /// Keepalive, no reply expected
    Heartbeat,
    /// Application payload, forwarded to subscribers
    Payload(Value),
}

/// Parses a text frame. Any JSON object without a recognized control `type`
/// is an application payload.
pub fn parse_frame(text: &str) -> Result<InboundFrame, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    let timestamp = value
        .get("timestamp")
        .and_then(Value::as_i64)
        .unwrap_or_default();

    let frame = match value.get("type").and_then(Value::as_str) {
        Some("ping") => InboundFrame::Ping { timestamp },
        Some("pong") => InboundFrame::Pong { timestamp },
        Some("heartbeat") => InboundFrame::Heartbeat,
        _ => InboundFrame::Payload(value),
    };
    Ok(frame)
}

// == Outbound Builders ==
pub fn ping_frame(timestamp: i64) -> String {
    json!({ "type": "ping", "timestamp": timestamp }).to_string()
}

pub fn pong_frame(timestamp: i64) -> String {
    json!({ "type": "pong", "timestamp": timestamp }).to_string()
}

pub fn heartbeat_frame(timestamp: i64) -> String {
    json!({ "type": "heartbeat", "timestamp": timestamp }).to_string()
}

/// Current Unix timestamp in milliseconds, as carried by control frames.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
