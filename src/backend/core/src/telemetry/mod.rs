//! Telemetry: structured logging, optional OTLP trace export, and metrics.
//!
//! # Example
//!
//! ```rust,no_run
//! use rolegate_core::{config::ObservabilityConfig, telemetry};
//!
//! let config = ObservabilityConfig::default();
//! telemetry::init("rolegate-server", &config).expect("Failed to initialize telemetry");
//! ```

pub mod metrics;

pub use metrics::{init_metrics, MetricsRegistry};

use opentelemetry_otlp::WithExportConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Initialize logging and, when an endpoint is configured, OTLP tracing.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(service_name: &str, config: &ObservabilityConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let telemetry_layer = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .with_trace_config(
                    opentelemetry_sdk::trace::config()
                        .with_resource(opentelemetry_sdk::Resource::new(vec![
                            opentelemetry::KeyValue::new("service.name", service_name.to_string()),
                        ])),
                )
                .install_batch(opentelemetry_sdk::runtime::Tokio)?;

            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    let (json_layer, pretty_layer) = match config.log_format {
        LogFormat::Json => (Some(fmt::layer().json().with_target(true)), None),
        LogFormat::Pretty => (None, Some(fmt::layer().pretty())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(telemetry_layer)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()?;

    tracing::info!(
        service_name,
        log_format = ?config.log_format,
        otlp = config.otlp_endpoint.is_some(),
        "Telemetry initialized"
    );

    Ok(())
}

/// Flush and shut down OpenTelemetry.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}
