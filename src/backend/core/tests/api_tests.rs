//! HTTP tests for the API router.
//!
//! Tests cover:
//! - Login with supplied and minted session ids, cookie issuance
//! - Unknown roles, unsafe session ids and store outages on login
//! - Authorize via body, bearer, cookie and custom header
//! - Logout and cookie clearing
//! - Session info endpoint
//! - Health and metrics endpoints

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use rolegate_core::api::{build_router, AppState};
use rolegate_core::error::{ErrorCode, GateError, Result};
use rolegate_core::gate::Gate;
use rolegate_core::rbac::PolicyTable;
use rolegate_core::session::{
    BackendStats, InMemoryBackend, SessionBackend, SessionStore, SessionStoreConfig,
};
use rolegate_core::telemetry::MetricsRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app() -> Router {
    build_router(AppState::new(Gate::in_memory(), MetricsRegistry::disabled()))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn authorize(app: &Router, body: Value) -> bool {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/authorize", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await["allowed"].as_bool().unwrap()
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_with_supplied_session_id() {
    let app = app();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/sessions",
            json!({ "role": "customer", "session_id": "s1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("rolegate_session=s1;"));
    assert!(cookie.contains("HttpOnly"));

    let body = read_json(response).await;
    assert_eq!(body, json!({ "ok": true, "session_id": "s1" }));
}

#[tokio::test]
async fn test_login_mints_session_id() {
    let app = app();
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/sessions", json!({ "role": "admin" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let session_id = body["session_id"].as_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&session_id).is_ok());

    assert!(
        authorize(
            &app,
            json!({ "resource": "operations", "action": "delete_many", "session_id": session_id })
        )
        .await
    );
}

#[tokio::test]
async fn test_login_unknown_role_is_unprocessable() {
    let app = app();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/sessions",
            json!({ "role": "superuser", "session_id": "s1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(response).await;
    assert_eq!(body["ok"], false);

    assert!(
        !authorize(
            &app,
            json!({ "resource": "reports", "action": "view_own", "session_id": "s1" })
        )
        .await
    );
}

#[tokio::test]
async fn test_login_rejects_unsafe_session_ids() {
    let backend = Arc::new(InMemoryBackend::default());
    let store = SessionStore::new(backend.clone(), SessionStoreConfig::default());
    let gate = Gate::new(Arc::new(PolicyTable::builtin()), store);
    let app = build_router(AppState::new(gate, MetricsRegistry::disabled()));

    for raw in ["abc; Domain=evil.example; Path=/x", "ctl\u{1}id", " padded"] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/sessions",
                json!({ "role": "admin", "session_id": raw }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{raw:?}");
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let body = read_json(response).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "InvalidSessionId");
    }

    // Nothing was written, so no id can authorize.
    assert!(backend.is_empty());
    assert!(
        !authorize(
            &app,
            json!({ "resource": "reports", "action": "delete_many", "session_id": "ctl\u{1}id" })
        )
        .await
    );
}

struct DownBackend;

#[async_trait::async_trait]
impl SessionBackend for DownBackend {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(GateError::new(ErrorCode::StoreConnectionFailed, "down"))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        Err(GateError::new(ErrorCode::StoreError, "down"))
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        Err(GateError::new(ErrorCode::StoreConnectionFailed, "down"))
    }

    async fn ping(&self) -> Result<()> {
        Err(GateError::new(ErrorCode::StoreConnectionFailed, "down"))
    }

    async fn stats(&self) -> Result<BackendStats> {
        Ok(BackendStats::default())
    }

    fn name(&self) -> &'static str {
        "down"
    }
}

fn down_app() -> Router {
    let store = SessionStore::new(Arc::new(DownBackend), SessionStoreConfig::default());
    let gate = Gate::new(Arc::new(PolicyTable::builtin()), store);
    build_router(AppState::new(gate, MetricsRegistry::disabled()))
}

#[tokio::test]
async fn test_store_outage_reports_unavailable() {
    let app = down_app();

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/sessions", json!({ "role": "admin" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(read_json(response).await["ok"], false);

    assert!(
        !authorize(
            &app,
            json!({ "resource": "reports", "action": "view_own", "session_id": "x" })
        )
        .await
    );
}

// ============================================================================
// Authorize
// ============================================================================

#[tokio::test]
async fn test_authorize_session_sources() {
    let app = app();
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/sessions",
            json!({ "role": "nutritionist", "session_id": "n1" }),
        ))
        .await
        .unwrap();

    let body = json!({ "resource": "reports", "action": "edit_many" }).to_string();
    for (name, value) in [
        ("authorization", "Bearer n1"),
        ("cookie", "rolegate_session=n1"),
        ("x-session-id", "n1"),
    ] {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/authorize")
            .header(header::CONTENT_TYPE, "application/json")
            .header(name, value)
            .body(Body::from(body.clone()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(read_json(response).await, json!({ "allowed": true }), "{name}");
    }
}

#[tokio::test]
async fn test_authorize_without_session_denies() {
    let app = app();
    assert!(!authorize(&app, json!({ "resource": "reports", "action": "view_own" })).await);
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_clears_session_and_cookie() {
    let app = app();
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/sessions",
            json!({ "role": "customer", "session_id": "c1" }),
        ))
        .await
        .unwrap();

    for _ in 0..2 {
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/v1/sessions")
            .header("cookie", "rolegate_session=c1")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response.headers().get(header::SET_COOKIE).unwrap();
        assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
        assert_eq!(read_json(response).await, json!({ "ok": true }));
    }

    assert!(
        !authorize(
            &app,
            json!({ "resource": "customer_profiles", "action": "view_own", "session_id": "c1" })
        )
        .await
    );
}

// ============================================================================
// Session Info
// ============================================================================

#[tokio::test]
async fn test_session_info() {
    let app = app();
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/sessions",
            json!({ "role": "customer_executive", "session_id": "ce" }),
        ))
        .await
        .unwrap();

    let request = Request::builder()
        .uri("/api/v1/sessions/me")
        .header("authorization", "Bearer ce")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["role"], "customer_executive");
    assert_eq!(
        body["grants"]["customer_support_tickets"],
        json!(["edit_many", "edit_own", "view_many"])
    );
}

#[tokio::test]
async fn test_session_info_without_session_is_unauthorized() {
    let app = app();
    let request = Request::builder()
        .uri("/api/v1/sessions/me")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Health & Metrics
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["session_store"]["backend"], "in_memory");
}

#[tokio::test]
async fn test_health_check_reports_store_down() {
    let response = down_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(read_json(response).await["session_store"]["status"], "down");
}

#[tokio::test]
async fn test_metrics_content_type() {
    let response = app()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}
