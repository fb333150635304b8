//! Channel Metrics Module
//!
//! Per-connection performance counters: traffic, reconnects and a rolling
//! latency average fed by ping/pong round trips.

use serde::Serialize;

// == Channel Metrics ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChannelMetrics {
    /// Application payloads forwarded to subscribers
    pub messages_received: u64,
    /// Frames sent on behalf of subscribers (control frames excluded)
    pub messages_sent: u64,
    /// Cumulative reconnection attempts over the connection's lifetime
    pub reconnects: u64,
    /// Number of latency samples folded into the average
    pub latency_samples: u64,
    /// Rolling average ping round-trip time in milliseconds
    pub average_latency_ms: f64,
    /// Most recent latency sample in milliseconds
    pub last_latency_ms: f64,
}

impl ChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&mut self) {
        self.messages_received += 1;
    }

    pub fn record_sent(&mut self) {
        self.messages_sent += 1;
    }

    pub fn record_reconnect(&mut self) {
        self.reconnects += 1;
    }

    /// Folds one ping round-trip sample into the rolling average.
    pub fn record_latency(&mut self, latency_ms: f64) {
        self.last_latency_ms = latency_ms;
        self.average_latency_ms = (self.average_latency_ms * self.latency_samples as f64
            + latency_ms)
            / (self.latency_samples + 1) as f64;
        self.latency_samples += 1;
    }
}
