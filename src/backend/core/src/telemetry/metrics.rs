//! Prometheus metrics for the gate.
//!
//! | Metric                                    | Type      | Labels                    |
//! |-------------------------------------------|-----------|---------------------------|
//! | `rolegate_authz_decisions_total`          | counter   | outcome, reason           |
//! | `rolegate_session_store_ops_total`        | counter   | op, backend, outcome      |
//! | `rolegate_session_store_duration_seconds` | histogram | op                        |
//! | `rolegate_session_backend_misses_total`   | counter   | backend                   |
//! | `rolegate_sessions_expired_total`         | counter   |                           |
//! | `rolegate_errors_total`                   | counter   | code, category, severity  |

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const STORE_DURATION_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Handle for rendering collected metrics.
///
/// Without an installed recorder, rendering yields an empty body.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// A registry with no recorder installed.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.prometheus_handle.is_some()
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }
}

/// Install the global Prometheus recorder.
///
/// Returns a disabled registry when `enabled` is false. Fails if a recorder
/// is already installed.
pub fn init_metrics(enabled: bool, service_name: &str) -> anyhow::Result<MetricsRegistry> {
    if !enabled {
        return Ok(MetricsRegistry::disabled());
    }

    let handle = PrometheusBuilder::new()
        .add_global_label("service", service_name)
        .set_buckets_for_metric(
            Matcher::Full("rolegate_session_store_duration_seconds".to_string()),
            STORE_DURATION_BUCKETS,
        )?
        .install_recorder()?;

    register_metric_descriptions();

    tracing::info!(service_name = %service_name, "Metrics initialized");

    Ok(MetricsRegistry {
        prometheus_handle: Some(handle),
    })
}

fn register_metric_descriptions() {
    describe_counter!(
        "rolegate_authz_decisions_total",
        "Authorization decisions by outcome and deny reason"
    );
    describe_counter!(
        "rolegate_session_store_ops_total",
        "Session store operations by outcome"
    );
    describe_histogram!(
        "rolegate_session_store_duration_seconds",
        metrics::Unit::Seconds,
        "Session store operation latency"
    );
    describe_counter!(
        "rolegate_session_backend_misses_total",
        "Session reads that found no live record"
    );
    describe_counter!(
        "rolegate_sessions_expired_total",
        "Expired sessions removed by the in-memory sweeper"
    );
    describe_counter!("rolegate_errors_total", "Errors by code, category and severity");
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
