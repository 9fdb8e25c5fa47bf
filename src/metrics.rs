//! Request metrics.
//!
//! Components that want to report timings take an `Arc<dyn MetricsSink>`
//! handed to them at construction. `main` builds one [`RequestMetrics`] and
//! threads it through the orchestrator and the HTTP state.

use std::collections::BTreeMap;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

/// Receives one record per completed request or fetch branch.
pub trait MetricsSink: Send + Sync {
    fn record_request(&self, name: &str, duration: Duration, success: bool);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_request(&self, _name: &str, _duration: Duration, _success: bool) {}
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    count: u64,
    total_time: Duration,
    errors: u64,
}

/// In-memory per-name request counters.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    counters: DashMap<String, Counters>,
}

/// Reported numbers for one metric name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointMetrics {
    pub requests: u64,
    /// Mean duration in seconds, three decimals.
    pub avg_response_time: f64,
    pub errors: u64,
    /// Percentage of failed requests, two decimals.
    pub error_rate: f64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current numbers for every recorded name.
    pub fn snapshot(&self) -> BTreeMap<String, EndpointMetrics> {
        self.counters
            .iter()
            .map(|entry| {
                let c = entry.value();
                let (avg, rate) = if c.count > 0 {
                    (
                        c.total_time.as_secs_f64() / c.count as f64,
                        c.errors as f64 / c.count as f64 * 100.0,
                    )
                } else {
                    (0.0, 0.0)
                };
                (
                    entry.key().clone(),
                    EndpointMetrics {
                        requests: c.count,
                        avg_response_time: round_to(avg, 3),
                        errors: c.errors,
                        error_rate: round_to(rate, 2),
                    },
                )
            })
            .collect()
    }

    pub fn reset(&self) {
        self.counters.clear();
        tracing::info!("Metrics reset");
    }
}

impl MetricsSink for RequestMetrics {
    fn record_request(&self, name: &str, duration: Duration, success: bool) {
        let mut counters = self.counters.entry(name.to_string()).or_default();
        counters.count += 1;
        counters.total_time += duration;
        if !success {
            counters.errors += 1;
        }
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
