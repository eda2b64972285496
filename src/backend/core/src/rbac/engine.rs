//! Authorization engine: session lookup followed by a policy check.
//!
//! The engine never raises. Every failure along the way (missing session,
//! unreachable store, malformed record, unknown role or resource) is folded
//! into a deny with a [`DenyReason`].

use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info};

use super::models::{Resource, Role, SessionId};
use super::policy::{DenyReason, PolicyDecision, PolicyTable};
use crate::error::ErrorCode;
use crate::session::SessionStore;

/// Evaluates `(session, resource, action)` requests.
#[derive(Clone, Debug)]
pub struct AuthorizationEngine {
    policy: Arc<PolicyTable>,
    store: SessionStore,
}

impl AuthorizationEngine {
    pub fn new(policy: Arc<PolicyTable>, store: SessionStore) -> Self {
        Self { policy, store }
    }

    pub fn policy(&self) -> &Arc<PolicyTable> {
        &self.policy
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Resolve the session's role and check it against the policy.
    ///
    /// Returns the role on allow so callers can hand it downstream.
    pub async fn authorize(
        &self,
        session_id: &SessionId,
        resource: &str,
        action: &str,
    ) -> Result<Role, DenyReason> {
        let outcome = self.resolve(session_id, resource, action).await;

        match &outcome {
            Ok(role) => {
                debug!(
                    session = %session_id.fingerprint(),
                    role = %role,
                    resource,
                    action,
                    "Access granted"
                );
            }
            Err(reason) => {
                info!(
                    session = %session_id.fingerprint(),
                    resource,
                    action,
                    reason = %reason,
                    "Access denied"
                );
            }
        }
        record_decision(&outcome);

        outcome
    }

    async fn resolve(
        &self,
        session_id: &SessionId,
        resource: &str,
        action: &str,
    ) -> Result<Role, DenyReason> {
        // Unknown resources deny the same way regardless of the session, so
        // skip the store round-trip.
        let resource: Resource = resource
            .parse()
            .map_err(|_| DenyReason::UnknownResource)?;

        let record = match self.store.try_get(session_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(DenyReason::SessionNotFound),
            Err(e) if e.code() == ErrorCode::DeserializationError => {
                return Err(DenyReason::MalformedRecord)
            }
            Err(_) => return Err(DenyReason::StoreUnavailable),
        };

        let role = record.role().map_err(|_| DenyReason::UnknownRole)?;

        match self.policy.evaluate(role, resource, action) {
            PolicyDecision::Allow => Ok(role),
            PolicyDecision::Deny(reason) => Err(reason),
        }
    }

    /// Evaluate a request into a [`PolicyDecision`].
    pub async fn check(&self, session_id: &SessionId, resource: &str, action: &str) -> PolicyDecision {
        match self.authorize(session_id, resource, action).await {
            Ok(_) => PolicyDecision::Allow,
            Err(reason) => PolicyDecision::Deny(reason),
        }
    }

    /// Whether the session may perform `action` on `resource`.
    pub async fn is_authorized(&self, session_id: &SessionId, resource: &str, action: &str) -> bool {
        self.check(session_id, resource, action).await.is_allowed()
    }
}

fn record_decision(outcome: &Result<Role, DenyReason>) {
    let (result, reason) = match outcome {
        Ok(_) => ("allow", "granted"),
        Err(reason) => ("deny", reason.as_str()),
    };
    counter!(
        "rolegate_authz_decisions_total",
        "outcome" => result,
        "reason" => reason
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::models::SessionRecord;
    use crate::session::{InMemoryBackend, SessionBackend, SessionStoreConfig};

    fn engine() -> (AuthorizationEngine, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::default());
        let store = SessionStore::new(backend.clone(), SessionStoreConfig::default());
        (
            AuthorizationEngine::new(Arc::new(PolicyTable::builtin()), store),
            backend,
        )
    }

    fn sid(raw: &str) -> SessionId {
        SessionId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_missing_session_denies() {
        let (engine, _) = engine();
        let decision = engine.check(&sid("never-logged-in"), "reports", "view_own").await;
        assert_eq!(decision, PolicyDecision::Deny(DenyReason::SessionNotFound));
    }

    #[tokio::test]
    async fn test_customer_decisions() {
        let (engine, _) = engine();
        let id = sid("s1");
        engine
            .store()
            .put(&id, &SessionRecord::new(Role::Customer))
            .await
            .unwrap();

        assert!(!engine.is_authorized(&id, "marketing", "view_own").await);
        assert!(engine.is_authorized(&id, "customer_profiles", "view_own").await);
        assert_eq!(
            engine.check(&id, "marketing", "view_own").await,
            PolicyDecision::Deny(DenyReason::PolicyMiss)
        );
    }

    #[tokio::test]
    async fn test_admin_allowed_any_action() {
        let (engine, _) = engine();
        let id = sid("root");
        engine
            .store()
            .put(&id, &SessionRecord::new(Role::Admin))
            .await
            .unwrap();

        assert_eq!(engine.authorize(&id, "reports", "anything").await, Ok(Role::Admin));
    }

    #[tokio::test]
    async fn test_unknown_resource_denies() {
        let (engine, _) = engine();
        let id = sid("root");
        engine
            .store()
            .put(&id, &SessionRecord::new(Role::Admin))
            .await
            .unwrap();

        assert_eq!(
            engine.check(&id, "payroll", "view_many").await,
            PolicyDecision::Deny(DenyReason::UnknownResource)
        );
    }

    #[tokio::test]
    async fn test_unknown_role_record_denies() {
        let (engine, backend) = engine();
        backend
            .set("rolegate:session:odd", br#"{"role":"intern"}"#.to_vec(), None)
            .await
            .unwrap();

        assert_eq!(
            engine.check(&sid("odd"), "reports", "view_own").await,
            PolicyDecision::Deny(DenyReason::UnknownRole)
        );
    }

    #[tokio::test]
    async fn test_malformed_record_denies() {
        let (engine, backend) = engine();
        backend
            .set("rolegate:session:junk", b"{role".to_vec(), None)
            .await
            .unwrap();

        assert_eq!(
            engine.check(&sid("junk"), "reports", "view_own").await,
            PolicyDecision::Deny(DenyReason::MalformedRecord)
        );
    }
}
