//! # Prometheus Metrics
//!
//! Exposes operational metrics for the token node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Committed `transfer` and `transferFrom` calls.
    pub transfers_total: IntCounter,
    /// Committed transfers that diverted a non-zero fee.
    pub fee_collections_total: IntCounter,
    /// Rejected operations, labelled by error category.
    pub rejected_operations_total: IntCounterVec,
    /// Committed privileged operations.
    pub admin_operations_total: IntCounter,
    /// 1 while the token is paused.
    pub paused: IntGauge,
    /// Latency of mutating operations including persistence.
    pub operation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("levy".into()), None)
            .expect("failed to create prometheus registry");

        let transfers_total =
            IntCounter::new("transfers_total", "Total number of committed transfers")
                .expect("metric creation");
        registry
            .register(Box::new(transfers_total.clone()))
            .expect("metric registration");

        let fee_collections_total = IntCounter::new(
            "fee_collections_total",
            "Total number of transfers that paid a fee to the treasury",
        )
        .expect("metric creation");
        registry
            .register(Box::new(fee_collections_total.clone()))
            .expect("metric registration");

        let rejected_operations_total = IntCounterVec::new(
            Opts::new(
                "rejected_operations_total",
                "Total number of rejected operations by error category",
            ),
            &["category"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(rejected_operations_total.clone()))
            .expect("metric registration");

        let admin_operations_total = IntCounter::new(
            "admin_operations_total",
            "Total number of committed privileged operations",
        )
        .expect("metric creation");
        registry
            .register(Box::new(admin_operations_total.clone()))
            .expect("metric registration");

        let paused = IntGauge::new("paused", "1 while value movement is halted")
            .expect("metric creation");
        registry
            .register(Box::new(paused.clone()))
            .expect("metric registration");

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Mutating operation latency including persistence, in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            transfers_total,
            fee_collections_total,
            rejected_operations_total,
            admin_operations_total,
            paused,
            operation_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_metrics_use_levy_prefix() {
        let metrics = NodeMetrics::new();
        metrics.transfers_total.inc();
        metrics
            .rejected_operations_total
            .with_label_values(&["halted"])
            .inc();

        let text = metrics.encode().unwrap();
        assert!(text.contains("levy_transfers_total 1"));
        assert!(text.contains("levy_rejected_operations_total{category=\"halted\"} 1"));
    }
}
