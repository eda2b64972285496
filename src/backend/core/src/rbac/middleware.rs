//! Axum guard that enforces a `(resource, action)` requirement on a route.
//!
//! The session id is read from the request headers (see
//! [`extract_session_id`]) and checked by the [`AuthorizationEngine`]. Denied
//! requests get a 403 and never reach the inner service.

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

use super::engine::AuthorizationEngine;
use super::models::{Role, SessionId};
use super::policy::DenyReason;
use crate::session::extract_session_id;

// ═══════════════════════════════════════════════════════════════════════════════
// Session Context (extracted in handlers)
// ═══════════════════════════════════════════════════════════════════════════════

/// The authorized caller, inserted into request extensions by the guard.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub role: Role,
}

/// Axum extractor for `SessionContext`.
#[axum::async_trait]
impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or_else(|| {
                let body = serde_json::json!({
                    "success": false,
                    "error": {
                        "code": "MISSING_SESSION_CONTEXT",
                        "message": "Session context not available. Ensure the action guard is applied.",
                    }
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Layer that requires the caller's session to permit one action.
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/reports", get(list_reports))
///     .layer(RequireActionLayer::new(engine.clone(), "reports", "view_many"));
/// ```
#[derive(Clone)]
pub struct RequireActionLayer {
    engine: Arc<AuthorizationEngine>,
    resource: Arc<str>,
    action: Arc<str>,
}

impl RequireActionLayer {
    pub fn new(engine: Arc<AuthorizationEngine>, resource: &str, action: &str) -> Self {
        Self {
            engine,
            resource: Arc::from(resource),
            action: Arc::from(action),
        }
    }
}

impl<S> Layer<S> for RequireActionLayer {
    type Service = RequireActionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireActionService {
            inner,
            engine: self.engine.clone(),
            resource: self.resource.clone(),
            action: self.action.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Service that checks the required action per request.
#[derive(Clone)]
pub struct RequireActionService<S> {
    inner: S,
    engine: Arc<AuthorizationEngine>,
    resource: Arc<str>,
    action: Arc<str>,
}

impl<S> Service<Request<Body>> for RequireActionService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let engine = self.engine.clone();
        let resource = self.resource.clone();
        let action = self.action.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(session_id) = extract_session_id(request.headers()) else {
                warn!(resource = %resource, action = %action, "Request without session rejected");
                return Ok(forbidden_response(DenyReason::SessionNotFound, &resource, &action));
            };

            match engine.authorize(&session_id, &resource, &action).await {
                Ok(role) => {
                    request
                        .extensions_mut()
                        .insert(SessionContext { session_id, role });
                    inner.call(request).await
                }
                Err(reason) => Ok(forbidden_response(reason, &resource, &action)),
            }
        })
    }
}

/// Build a 403 Forbidden JSON response.
fn forbidden_response(reason: DenyReason, resource: &str, action: &str) -> Response {
    let body = serde_json::json!({
        "success": false,
        "error": {
            "code": "FORBIDDEN",
            "message": format!("Action '{}' on '{}' is not permitted", action, resource),
            "reason": reason.as_str(),
        }
    });
    (StatusCode::FORBIDDEN, Json(body)).into_response()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::models::SessionRecord;
    use crate::rbac::policy::PolicyTable;
    use crate::session::SessionStore;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    async fn whoami(ctx: SessionContext) -> String {
        ctx.role.to_string()
    }

    async fn guarded_app() -> (Router, SessionStore) {
        let store = SessionStore::in_memory();
        let engine = Arc::new(AuthorizationEngine::new(
            Arc::new(PolicyTable::builtin()),
            store.clone(),
        ));
        let app = Router::new()
            .route("/reports", get(whoami))
            .layer(RequireActionLayer::new(engine, "reports", "edit_many"));
        (app, store)
    }

    fn request(session: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/reports");
        if let Some(session) = session {
            builder = builder.header("authorization", format!("Bearer {}", session));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_allowed_request_reaches_handler() {
        let (app, store) = guarded_app().await;
        let id = SessionId::parse("n1").unwrap();
        store
            .put(&id, &SessionRecord::new(Role::Nutritionist))
            .await
            .unwrap();

        let response = app.oneshot(request(Some("n1"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"nutritionist");
    }

    #[tokio::test]
    async fn test_denied_role_gets_forbidden() {
        let (app, store) = guarded_app().await;
        let id = SessionId::parse("c1").unwrap();
        store
            .put(&id, &SessionRecord::new(Role::Customer))
            .await
            .unwrap();

        let response = app.oneshot(request(Some("c1"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "FORBIDDEN");
        assert_eq!(json["error"]["reason"], "policy_miss");
    }

    #[tokio::test]
    async fn test_missing_session_gets_forbidden() {
        let (app, _) = guarded_app().await;
        let response = app.oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
