//! Metrics module for Prometheus
//!
//! This module provides metrics collection for the gateway service:
//! - Request count by outcome and status
//! - Request latency histogram
//! - Rejection counters (rate limited, auth failed, upstream errors)

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Gateway metrics collector
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    request_counter: CounterVec,
    request_latency: HistogramVec,
    rejection_counter: CounterVec,
}

impl GatewayMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        let registry = Registry::new();

        let request_counter = CounterVec::new(
            Opts::new("gateway_requests_total", "Total number of requests"),
            &["outcome", "status"],
        )
        .expect("Failed to create request counter");

        let request_latency = HistogramVec::new(
            HistogramOpts::new(
                "gateway_request_latency_seconds",
                "Request latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["outcome"],
        )
        .expect("Failed to create latency histogram");

        let rejection_counter = CounterVec::new(
            Opts::new(
                "gateway_rejections_total",
                "Requests rejected before reaching the upstream",
            ),
            &["reason"],
        )
        .expect("Failed to create rejection counter");

        registry
            .register(Box::new(request_counter.clone()))
            .expect("Failed to register request counter");
        registry
            .register(Box::new(request_latency.clone()))
            .expect("Failed to register latency histogram");
        registry
            .register(Box::new(rejection_counter.clone()))
            .expect("Failed to register rejection counter");

        Self {
            registry,
            request_counter,
            request_latency,
            rejection_counter,
        }
    }

    /// Record a completed request with its outcome, status, and latency
    pub fn record_request(&self, outcome: &str, status: u16, latency: Duration) {
        let status_str = status.to_string();

        self.request_counter
            .with_label_values(&[outcome, &status_str])
            .inc();

        self.request_latency
            .with_label_values(&[outcome])
            .observe(latency.as_secs_f64());
    }

    /// Record a request rejected before it reached the upstream
    pub fn record_rejection(&self, reason: &str) {
        self.rejection_counter.with_label_values(&[reason]).inc();
    }

    /// Get the Prometheus metrics output
    pub fn prometheus_output(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}
