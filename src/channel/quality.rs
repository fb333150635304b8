//! Connection Quality Module
//!
//! Advisory classification of link quality from reconnect history and
//! measured round-trip latency. Telemetry only; nothing gates on it.

use serde::Serialize;

// == Connection Quality ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    /// No live connection to judge
    Unknown,
}

/// Derives quality from the cumulative reconnect count and the rolling
/// average ping latency in milliseconds.
pub fn classify(reconnects: u64, average_latency_ms: f64) -> ConnectionQuality {
    if reconnects > 3 {
        ConnectionQuality::Poor
    } else if average_latency_ms > 1000.0 {
        ConnectionQuality::Fair
    } else if reconnects == 0 && average_latency_ms < 100.0 {
        ConnectionQuality::Excellent
    } else {
        ConnectionQuality::Good
    }
}
