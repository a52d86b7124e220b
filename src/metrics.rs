//! Prometheus metrics for webhook intake and deployments
//!
//! Metrics live in a dedicated registry exposed at the configured metrics
//! path. They are created lazily and registered once by [`init_metrics`].

use lazy_static::lazy_static;
use prometheus::{
    opts, Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Registry, TextEncoder,
};
use std::sync::Once;
use tracing::{debug, warn};

use crate::types::DeploymentStatus;

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref REGISTRY: Registry = Registry::new();

    /// Webhook deliveries by event header and filter outcome
    /// Labels: event, outcome (accepted, ignored, rejected, queue_full)
    pub static ref WEBHOOK_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        opts!("webhook_events_total", "Total number of webhook deliveries"),
        &["event", "outcome"]
    )
    .expect("Failed to create webhook_events_total metric");

    /// Finished deployments by status (success, failed)
    pub static ref DEPLOYMENT_TOTAL: IntCounterVec = IntCounterVec::new(
        opts!("deployment_total", "Total number of deployments"),
        &["status"]
    )
    .expect("Failed to create deployment_total metric");

    /// Deployment duration in seconds, 1s to 30min buckets
    pub static ref DEPLOYMENT_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("deployment_duration_seconds", "Time spent running the deploy action")
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0])
    )
    .expect("Failed to create deployment_duration_seconds metric");

    /// 1 while the worker is running a deployment
    pub static ref DEPLOYMENT_ACTIVE: IntGauge = IntGauge::with_opts(
        opts!("deployment_active", "Current active deployments")
    )
    .expect("Failed to create deployment_active metric");

    /// Current deployment queue size
    pub static ref DEPLOYMENT_QUEUE_SIZE: IntGauge = IntGauge::with_opts(
        opts!("deployment_queue_size", "Current deployment queue depth")
    )
    .expect("Failed to create deployment_queue_size metric");
}

static INIT: Once = Once::new();

/// Register all metrics with the global registry
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(WEBHOOK_EVENTS_TOTAL.clone()),
            Box::new(DEPLOYMENT_TOTAL.clone()),
            Box::new(DEPLOYMENT_DURATION_SECONDS.clone()),
            Box::new(DEPLOYMENT_ACTIVE.clone()),
            Box::new(DEPLOYMENT_QUEUE_SIZE.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                warn!(error = %e, "Failed to register metric");
            }
        }
        debug!("Prometheus metrics registry initialized");
    });
}

/// Record a webhook delivery outcome
pub fn record_webhook_event(event: &str, outcome: &str) {
    // Unbounded label values from the header would grow the series set
    let event = match event {
        "release" | "ping" | "push" => event,
        "" => "none",
        _ => "other",
    };
    WEBHOOK_EVENTS_TOTAL
        .with_label_values(&[event, outcome])
        .inc();
}

pub fn record_deployment_started() {
    DEPLOYMENT_ACTIVE.set(1);
}

/// Record a deployment completion with its final status
pub fn record_deployment_complete(status: DeploymentStatus, duration_ms: u64) {
    DEPLOYMENT_ACTIVE.set(0);
    DEPLOYMENT_TOTAL
        .with_label_values(&[status.as_str()])
        .inc();
    DEPLOYMENT_DURATION_SECONDS.observe(duration_ms as f64 / 1000.0);
}

pub fn set_queue_size(size: usize) {
    DEPLOYMENT_QUEUE_SIZE.set(size as i64);
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| format!("Failed to convert metrics to UTF-8: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        init_metrics();
        init_metrics();
        assert!(gather_metrics().is_ok());
    }

    #[test]
    fn test_record_webhook_event() {
        let before = WEBHOOK_EVENTS_TOTAL
            .with_label_values(&["release", "accepted"])
            .get();
        record_webhook_event("release", "accepted");
        let after = WEBHOOK_EVENTS_TOTAL
            .with_label_values(&["release", "accepted"])
            .get();
        assert!(after > before);
    }

    #[test]
    fn test_unknown_events_collapse_to_other() {
        let before = WEBHOOK_EVENTS_TOTAL
            .with_label_values(&["other", "ignored"])
            .get();
        record_webhook_event("workflow_run", "ignored");
        let after = WEBHOOK_EVENTS_TOTAL
            .with_label_values(&["other", "ignored"])
            .get();
        assert!(after > before);
    }

    #[test]
    fn test_record_deployment_complete() {
        let before = DEPLOYMENT_TOTAL.with_label_values(&["failed"]).get();
        record_deployment_complete(DeploymentStatus::Failed, 1500);
        assert!(DEPLOYMENT_TOTAL.with_label_values(&["failed"]).get() > before);
    }

    #[test]
    fn test_gather_metrics_text_format() {
        init_metrics();
        record_webhook_event("ping", "ignored");
        let text = gather_metrics().unwrap();
        assert!(text.contains("webhook_events_total"));
    }
}
