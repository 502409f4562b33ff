//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the printflow server:
//! - WebSocket connection metrics
//! - Event delivery counts by type
//! - Pipeline run outcomes
//! - Active job count (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "printflow_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "printflow_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// Events sent to subscribers, by event type.
pub static WS_EVENTS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("printflow_ws_events_sent_total", "Events sent to subscribers"),
        &["type"],
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Pipeline runs started.
pub static PIPELINE_RUNS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "printflow_pipeline_runs_started_total",
        "Total pipeline runs started since startup",
    )
    .unwrap()
});

/// Pipeline runs that completed successfully.
pub static PIPELINE_RUNS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "printflow_pipeline_runs_completed_total",
        "Total pipeline runs that completed successfully",
    )
    .unwrap()
});

/// Pipeline runs that failed.
pub static PIPELINE_RUNS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "printflow_pipeline_runs_failed_total",
        "Total pipeline runs that failed (terminal)",
    )
    .unwrap()
});

/// Tracked jobs (collected dynamically from the registry).
pub static JOBS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "printflow_jobs_active",
        "Number of jobs currently tracked in the registry",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry.register(Box::new(WS_EVENTS_SENT.clone())).unwrap();

    registry
        .register(Box::new(PIPELINE_RUNS_STARTED.clone()))
        .unwrap();
    registry
        .register(Box::new(PIPELINE_RUNS_COMPLETED.clone()))
        .unwrap();
    registry
        .register(Box::new(PIPELINE_RUNS_FAILED.clone()))
        .unwrap();
    registry.register(Box::new(JOBS_ACTIVE.clone())).unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the live registry.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    JOBS_ACTIVE.set(state.registry().active_count().await as i64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        // Access metrics to ensure they're initialized
        WS_EVENTS_SENT.with_label_values(&["progress_update"]).inc();

        let output = encode_metrics();
        assert!(output.contains("printflow_ws_events_sent_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        // Touch all metrics to ensure they appear in output
        // (Prometheus only outputs metrics that have been accessed)
        WS_CONNECTIONS_ACTIVE.set(0);
        WS_CONNECTIONS_TOTAL.inc();
        PIPELINE_RUNS_STARTED.inc();
        PIPELINE_RUNS_COMPLETED.inc();
        PIPELINE_RUNS_FAILED.inc();
        JOBS_ACTIVE.set(0);

        let output = encode_metrics();

        assert!(output.contains("printflow_ws_connections_active"));
        assert!(output.contains("printflow_ws_connections_total"));
        assert!(output.contains("printflow_pipeline_runs_started_total"));
        assert!(output.contains("printflow_pipeline_runs_completed_total"));
        assert!(output.contains("printflow_pipeline_runs_failed_total"));
        assert!(output.contains("printflow_jobs_active"));
    }
}
