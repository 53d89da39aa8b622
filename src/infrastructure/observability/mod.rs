//! Observability infrastructure - Prometheus metrics

mod metrics;

pub use metrics::{
    create_metrics_router, init_metrics, record_activity_attempt, record_signal,
    record_transition, set_active_workflows, PrometheusMetrics,
};
