//! Request metrics
//!
//! Counts tool calls, tracks per-tool usage and keeps a rolling window of
//! response times for averaging.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Number of response times kept for the rolling average
pub const RESPONSE_TIME_WINDOW: usize = 1000;

#[derive(Debug, Default)]
struct Counters {
    requests_total: u64,
    requests_successful: u64,
    requests_failed: u64,
    tools_executed: BTreeMap<String, u64>,
    response_times: VecDeque<Duration>,
}

/// Thread-safe metrics collector
#[derive(Debug)]
pub struct MetricsCollector {
    started: Instant,
    counters: Mutex<Counters>,
}

/// Point-in-time view of the collected metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_successful: u64,
    pub requests_failed: u64,
    pub tools_executed: BTreeMap<String, u64>,
    pub success_rate: f64,
    pub average_response_time_ms: f64,
    pub uptime_seconds: f64,
}

impl MetricsSnapshot {
    /// The short form returned by `get_metrics` without `detailed`
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "requests_total": self.requests_total,
            "success_rate": self.success_rate,
            "average_response_time_ms": self.average_response_time_ms,
            "uptime_seconds": self.uptime_seconds,
        })
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Record one finished request
    pub fn record_request(&self, success: bool, elapsed: Duration, tool_name: Option<&str>) {
        let mut c = self.counters.lock();

        c.requests_total += 1;
        if success {
            c.requests_successful += 1;
        } else {
            c.requests_failed += 1;
        }

        if let Some(name) = tool_name {
            *c.tools_executed.entry(name.to_string()).or_insert(0) += 1;
        }

        c.response_times.push_back(elapsed);
        while c.response_times.len() > RESPONSE_TIME_WINDOW {
            c.response_times.pop_front();
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn requests_total(&self) -> u64 {
        self.counters.lock().requests_total
    }

    /// Percentage of successful requests; 0 before any request
    pub fn success_rate(&self) -> f64 {
        let c = self.counters.lock();
        success_rate(c.requests_successful, c.requests_total)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = self.counters.lock();

        let average_response_time_ms = if c.response_times.is_empty() {
            0.0
        } else {
            let total: Duration = c.response_times.iter().sum();
            total.as_secs_f64() * 1000.0 / c.response_times.len() as f64
        };

        MetricsSnapshot {
            requests_total: c.requests_total,
            requests_successful: c.requests_successful,
            requests_failed: c.requests_failed,
            tools_executed: c.tools_executed.clone(),
            success_rate: success_rate(c.requests_successful, c.requests_total),
            average_response_time_ms,
            uptime_seconds: self.started.elapsed().as_secs_f64(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn success_rate(successful: u64, total: u64) -> f64 {
    successful as f64 / total.max(1) as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics() {
        let metrics = MetricsCollector::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 0);
        assert_eq!(snapshot.success_rate, 0.0);
        assert_eq!(snapshot.average_response_time_ms, 0.0);
    }

    #[test]
    fn test_record_requests() {
        let metrics = MetricsCollector::new();
        metrics.record_request(true, Duration::from_millis(10), Some("echo"));
        metrics.record_request(true, Duration::from_millis(30), Some("echo"));
        metrics.record_request(false, Duration::from_millis(20), Some("calculate"));
        metrics.record_request(false, Duration::from_millis(20), None);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 4);
        assert_eq!(snapshot.requests_successful, 2);
        assert_eq!(snapshot.requests_failed, 2);
        assert_eq!(snapshot.tools_executed.get("echo"), Some(&2));
        assert_eq!(snapshot.tools_executed.get("calculate"), Some(&1));
        assert_eq!(snapshot.success_rate, 50.0);
        assert!((snapshot.average_response_time_ms - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_response_window_is_bounded() {
        let metrics = MetricsCollector::new();
        for _ in 0..RESPONSE_TIME_WINDOW {
            metrics.record_request(true, Duration::from_millis(100), None);
        }
        for _ in 0..RESPONSE_TIME_WINDOW {
            metrics.record_request(true, Duration::from_millis(0), None);
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2 * RESPONSE_TIME_WINDOW as u64);
        assert_eq!(snapshot.average_response_time_ms, 0.0);
    }

    #[test]
    fn test_summary_keys() {
        let metrics = MetricsCollector::new();
        metrics.record_request(true, Duration::from_millis(5), Some("echo"));
        let summary = metrics.snapshot().summary();
        assert_eq!(summary["requests_total"], 1);
        assert_eq!(summary["success_rate"], 100.0);
        assert!(summary.get("tools_executed").is_none());
    }
}
