//! The caller-facing gate: authorize, login and logout behind one handle.
//!
//! [`Gate`] wires the policy table, session store, authorization engine and
//! lifecycle manager together and shapes their results into the response
//! types returned to callers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, SessionBackendKind};
use crate::error::Result;
use crate::rbac::{AuthorizationEngine, PolicyTable, Resource, Role, SessionId, SessionManager};
use crate::session::{InMemoryBackend, InMemoryConfig, RedisBackend, SessionBackend, SessionStore};

// ═══════════════════════════════════════════════════════════════════════════════
// Responses
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub ok: bool,
}

/// The role bound to a session and what it may do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub role: Role,
    pub grants: BTreeMap<Resource, Vec<String>>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Gate
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared entry point for authorization and session lifecycle calls.
#[derive(Clone, Debug)]
pub struct Gate {
    engine: Arc<AuthorizationEngine>,
    sessions: SessionManager,
    store: SessionStore,
    in_memory: Option<Arc<InMemoryBackend>>,
}

impl Gate {
    pub fn new(policy: Arc<PolicyTable>, store: SessionStore) -> Self {
        Self {
            engine: Arc::new(AuthorizationEngine::new(policy, store.clone())),
            sessions: SessionManager::new(store.clone()),
            store,
            in_memory: None,
        }
    }

    /// Built-in policy over a default in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(PolicyTable::builtin()), SessionStore::in_memory())
    }

    /// Build the gate described by `config`: load the policy table and connect
    /// the configured session backend.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let policy = match &config.policy.path {
            Some(path) => PolicyTable::load(path)?,
            None => {
                info!("Using built-in policy table");
                PolicyTable::builtin()
            }
        };

        let (backend, in_memory) = match config.session.backend {
            SessionBackendKind::Memory => {
                let backend = Arc::new(InMemoryBackend::new(InMemoryConfig {
                    max_capacity: config.session.max_capacity,
                    ..Default::default()
                }));
                (backend.clone() as Arc<dyn SessionBackend>, Some(backend))
            }
            SessionBackendKind::Redis => {
                let backend = RedisBackend::connect(&config.session.redis_url).await?;
                (Arc::new(backend) as Arc<dyn SessionBackend>, None)
            }
        };

        let store = SessionStore::new(backend, config.session.store_config());
        info!(
            backend = store.backend_name(),
            key_prefix = %config.session.key_prefix,
            "Session store ready"
        );

        Ok(Self {
            in_memory,
            ..Self::new(Arc::new(policy), store)
        })
    }

    pub fn engine(&self) -> &Arc<AuthorizationEngine> {
        &self.engine
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The in-memory backend, when one is in use, for periodic cleanup.
    pub fn in_memory_backend(&self) -> Option<&Arc<InMemoryBackend>> {
        self.in_memory.as_ref()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Check an action. A missing session id denies.
    pub async fn authorize(
        &self,
        session_id: Option<&SessionId>,
        resource: &str,
        action: &str,
    ) -> AuthorizeResponse {
        let allowed = match session_id {
            Some(id) => self.engine.is_authorized(id, resource, action).await,
            None => false,
        };
        AuthorizeResponse { allowed }
    }

    /// Bind a session to `role`, minting a fresh id when none is given.
    pub async fn login(&self, session_id: Option<SessionId>, role: &str) -> Result<LoginResponse> {
        let session_id = session_id.unwrap_or_else(SessionId::generate);
        self.sessions.login(&session_id, role).await?;

        Ok(LoginResponse {
            ok: true,
            session_id: session_id.as_str().to_string(),
        })
    }

    pub async fn logout(&self, session_id: &SessionId) -> Result<LogoutResponse> {
        self.sessions.logout(session_id).await?;
        Ok(LogoutResponse { ok: true })
    }

    /// Describe the session's role and grants. `None` when there is no usable
    /// session.
    pub async fn session_info(&self, session_id: &SessionId) -> Option<SessionInfo> {
        let record = self.store.get(session_id).await?;
        let role = record.role().ok()?;

        Some(SessionInfo {
            role,
            grants: self.engine.policy().grants(role),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_login_mints_session_id() {
        let gate = Gate::in_memory();
        let response = gate.login(None, "customer").await.unwrap();
        assert!(response.ok);
        assert!(!response.session_id.is_empty());

        let id = SessionId::parse(&response.session_id).unwrap();
        let allowed = gate.authorize(Some(&id), "reports", "view_own").await;
        assert_eq!(allowed, AuthorizeResponse { allowed: true });
    }

    #[tokio::test]
    async fn test_authorize_without_session() {
        let gate = Gate::in_memory();
        assert!(!gate.authorize(None, "reports", "view_own").await.allowed);
    }

    #[tokio::test]
    async fn test_login_unknown_role() {
        let gate = Gate::in_memory();
        let err = gate
            .login(SessionId::parse("s1"), "superuser")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownRole);
    }

    #[tokio::test]
    async fn test_session_info_lists_grants() {
        let gate = Gate::in_memory();
        let id = SessionId::parse("ce").unwrap();
        gate.login(Some(id.clone()), "customer_executive").await.unwrap();

        let info = gate.session_info(&id).await.unwrap();
        assert_eq!(info.role, Role::CustomerExecutive);
        assert_eq!(info.grants.len(), 1);
        assert!(info.grants.contains_key(&Resource::CustomerSupportTickets));

        gate.logout(&id).await.unwrap();
        assert!(gate.session_info(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_from_default_config() {
        let gate = Gate::from_config(&Config::default()).await.unwrap();
        assert!(gate.in_memory_backend().is_some());
        assert_eq!(gate.store().backend_name(), "in_memory");
    }

    #[tokio::test]
    async fn test_debug_does_not_leak_session_ids() {
        let gate = Gate::from_config(&Config::default()).await.unwrap();
        gate.login(SessionId::parse("raw-secret"), "admin").await.unwrap();

        let debug = format!("{:?}", gate);
        assert!(debug.contains("InMemoryBackend"));
        assert!(!debug.contains("raw-secret"));
    }
}
