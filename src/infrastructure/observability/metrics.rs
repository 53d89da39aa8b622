//! Prometheus metrics for workflow execution

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;
use crate::domain::workflow::WorkflowStatus;

/// Prometheus metrics handle for serving the metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Install the Prometheus recorder
///
/// Without an installed recorder the `record_*` helpers are no-ops.
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("docflow_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!(path = %config.path, "Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Count a committed state transition
pub fn record_transition(from: WorkflowStatus, to: WorkflowStatus) {
    counter!(
        "docflow_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

/// Count one activity attempt; `result` is `success`, `transient`,
/// `non_retryable` or `timeout`
pub fn record_activity_attempt(activity: &str, result: &'static str) {
    counter!(
        "docflow_activity_attempts_total",
        "activity" => activity.to_string(),
        "result" => result
    )
    .increment(1);
}

/// Count a review signal by outcome (`accepted`, `duplicate`, `not_waiting`, ...)
pub fn record_signal(result: &'static str) {
    counter!("docflow_signals_total", "result" => result).increment(1);
}

pub fn set_active_workflows(count: usize) {
    gauge!("docflow_active_workflows").set(count as f64);
}
