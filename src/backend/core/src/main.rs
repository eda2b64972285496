//! Rolegate Server - Main entry point

use std::net::SocketAddr;
use std::time::Duration;

use rolegate_core::{
    api::{self, AppState},
    config::Config,
    gate::Gate,
    session::InMemoryBackend,
    telemetry,
};

const SERVICE_NAME: &str = "rolegate-server";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration; invalid settings abort startup
    let config = Config::load()?;

    // Initialize observability
    telemetry::init(SERVICE_NAME, &config.observability)?;
    let metrics = telemetry::init_metrics(config.observability.metrics_enabled, SERVICE_NAME)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Rolegate Server"
    );

    // Policy table and session store; a bad policy file aborts startup
    let gate = Gate::from_config(&config).await?;

    if let Some(backend) = gate.in_memory_backend() {
        tokio::spawn(sweep_expired_sessions(
            backend.clone(),
            config.session.cleanup_interval,
        ));
    }

    let state = AppState::new(gate, metrics).with_secure_cookies(config.server.secure_cookies);
    let app = api::build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    telemetry::shutdown();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Periodically drop expired in-memory sessions.
async fn sweep_expired_sessions(backend: std::sync::Arc<InMemoryBackend>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let removed = backend.cleanup_expired();
        if removed > 0 {
            metrics::counter!("rolegate_sessions_expired_total").increment(removed);
        }
    }
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
