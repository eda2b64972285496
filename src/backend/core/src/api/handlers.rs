//! API request handlers.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::error::{GateError, Result};
use crate::gate::{AuthorizeResponse, SessionInfo};
use crate::rbac::SessionId;
use crate::session::{extract_session_id, SessionCookie};

// ═══════════════════════════════════════════════════════════════════════════════
// Health Check
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.gate.store();
    let (status, store_status) = match store.ping().await {
        Ok(()) => (StatusCode::OK, "up"),
        Err(e) => {
            e.log();
            (StatusCode::SERVICE_UNAVAILABLE, "down")
        }
    };

    let body = serde_json::json!({
        "status": if status == StatusCode::OK { "healthy" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "session_store": {
            "backend": store.backend_name(),
            "status": store_status,
        }
    });

    (status, Json(body))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session Handlers
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub role: String,
    pub session_id: Option<String>,
}

/// Bind a session to a role and hand the id back as a cookie.
///
/// The id comes from the body, then the request headers; a fresh one is
/// minted when neither carries one. A body id outside the session id
/// alphabet is refused with 422.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Response {
    // A malformed id in the body is refused before anything is stored.
    let session_id = match req.session_id {
        Some(raw) => match SessionId::try_new(raw) {
            Ok(id) => id,
            Err(reason) => return lifecycle_failure(GateError::invalid_session_id(reason)),
        },
        None => extract_session_id(&headers).unwrap_or_else(SessionId::generate),
    };

    match state.gate.login(Some(session_id.clone()), &req.role).await {
        Ok(response) => {
            let max_age = state
                .gate
                .store()
                .config()
                .session_ttl
                .map(|ttl| ttl.as_secs());
            let cookie =
                SessionCookie::new(session_id).to_cookie_header(max_age, state.secure_cookies);

            (StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)).into_response()
        }
        Err(e) => lifecycle_failure(e),
    }
}

/// End the caller's session and clear the cookie. Succeeds without a session.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let clear = [(header::SET_COOKIE, SessionCookie::delete_cookie_header())];

    let Some(session_id) = extract_session_id(&headers) else {
        return (StatusCode::OK, clear, Json(serde_json::json!({ "ok": true }))).into_response();
    };

    match state.gate.logout(&session_id).await {
        Ok(response) => (StatusCode::OK, clear, Json(response)).into_response(),
        Err(e) => lifecycle_failure(e),
    }
}

/// Role and grants of the current session.
pub async fn session_info(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionInfo>> {
    let session_id = extract_session_id(&headers)
        .ok_or_else(|| GateError::unauthorized("No session supplied"))?;

    state
        .gate
        .session_info(&session_id)
        .await
        .map(Json)
        .ok_or_else(|| GateError::session_not_found(session_id.fingerprint()))
}

/// Map a login/logout failure to `{ok: false}` with the error's status.
/// Store failures of every kind report as unavailable.
fn lifecycle_failure(error: GateError) -> Response {
    let status = if error.code().is_store_unavailable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        error.http_status()
    };

    let body = serde_json::json!({
        "ok": false,
        "error": {
            "code": error.code().to_string(),
            "message": error.user_message(),
        }
    });

    (status, Json(body)).into_response()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Authorization Handler
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub resource: String,
    pub action: String,
    pub session_id: Option<String>,
}

/// Check an action. Always answers 200; denial is `{allowed: false}`.
pub async fn authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AuthorizeRequest>,
) -> Json<AuthorizeResponse> {
    let session_id = match req.session_id {
        Some(raw) => SessionId::parse(raw),
        None => extract_session_id(&headers),
    };

    Json(
        state
            .gate
            .authorize(session_id.as_ref(), &req.resource, &req.action)
            .await,
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}
