//! HTTP API for the gate.
//!
//! | Method | Path                  | Purpose                                   |
//! |--------|-----------------------|-------------------------------------------|
//! | POST   | `/api/v1/sessions`    | Log in: bind a session to a role          |
//! | DELETE | `/api/v1/sessions`    | Log out                                   |
//! | GET    | `/api/v1/sessions/me` | Role and grants of the current session    |
//! | POST   | `/api/v1/authorize`   | Check an action on a resource             |
//! | GET    | `/health`             | Liveness plus session store reachability  |
//! | GET    | `/metrics`            | Prometheus metrics                        |

mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::gate::Gate;
use crate::telemetry::MetricsRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Gate,
    pub metrics: MetricsRegistry,

    /// Mark session cookies `Secure`
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(gate: Gate, metrics: MetricsRegistry) -> Self {
        Self {
            gate,
            metrics,
            secure_cookies: false,
        }
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }
}

/// Build the API router.
///
/// # Example
///
/// ```rust,ignore
/// let state = AppState::new(gate, metrics);
/// let app = build_router(state);
/// ```
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route(
            "/api/v1/sessions",
            post(handlers::login).delete(handlers::logout),
        )
        .route("/api/v1/sessions/me", get(handlers::session_info))
        .route("/api/v1/authorize", post(handlers::authorize))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
