//! Request Metrics Module
//!
//! Aggregated performance counters for the request coordinator. Derived
//! telemetry only.

use serde::Serialize;

// == Request Metrics ==
/// Counters and rolling averages across all calls of one coordinator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestMetrics {
    /// Network calls actually dispatched (deduplicated callers share one)
    pub total_requests: u64,
    /// Reads served from the response cache without touching the network
    pub cache_hits: u64,
    /// Calls that settled with a classified failure
    pub error_count: u64,
    /// Rolling average time of successful calls, in milliseconds
    pub average_response_time_ms: f64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a dispatched call and folds its duration into the average.
    pub fn record_response_time(&mut self, elapsed_ms: f64) {
        self.total_requests += 1;
        self.average_response_time_ms = (self.average_response_time_ms
            * (self.total_requests - 1) as f64
            + elapsed_ms)
            / self.total_requests as f64;
    }

    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn record_error(&mut self) {
        self.error_count += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_start_at_zero() {
        let metrics = RequestMetrics::new();
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.cache_hits, 0);
        assert_eq!(metrics.error_count, 0);
        assert_eq!(metrics.average_response_time_ms, 0.0);
    }

    #[test]
    fn test_rolling_average() {
        let mut metrics = RequestMetrics::new();
        metrics.record_response_time(100.0);
        metrics.record_response_time(300.0);

        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.average_response_time_ms, 200.0);

        metrics.record_response_time(200.0);
        assert_eq!(metrics.average_response_time_ms, 200.0);
    }

    #[test]
    fn test_counters() {
        let mut metrics = RequestMetrics::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_error();

        assert_eq!(metrics.cache_hits, 2);
        assert_eq!(metrics.error_count, 1);
    }
}
