//! Channel Module
//!
//! Resilient realtime messaging: a pooled, self-healing connection per
//! address with ping/pong latency probing, heartbeat keepalives,
//! exponential-backoff reconnection and an advisory quality rating.

pub mod connection;
pub mod connector;
pub mod frame;
pub mod manager;
pub mod metrics;
pub mod quality;

pub use connection::{ChannelEvents, ConnectionState};
pub use connector::{Connector, Duplex, Incoming, Outgoing, WsConnector};
pub use frame::{
    heartbeat_frame, is_intentional_close, now_ms, parse_frame, ping_frame, pong_frame,
    InboundFrame, CLOSE_ABNORMAL, CLOSE_GOING_AWAY, CLOSE_NORMAL,
};
pub use manager::{ChannelManager, ChannelSubscription};
pub use metrics::ChannelMetrics;
pub use quality::ConnectionQuality;
