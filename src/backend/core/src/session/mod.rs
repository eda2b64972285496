//! Session store: the shared cache binding session identifiers to roles.
//!
//! [`SessionStore`] wraps a [`SessionBackend`] with key namespacing, JSON
//! encoding of [`SessionRecord`]s and a deadline on every backend call.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rolegate_core::session::{SessionStore, SessionStoreConfig, InMemoryBackend};
//!
//! let store = SessionStore::new(Arc::new(InMemoryBackend::default()), SessionStoreConfig::default());
//! store.put(&id, &SessionRecord::new(Role::Customer)).await?;
//! let record = store.get(&id).await;
//! ```

pub mod backend;
pub mod cookie;

pub use backend::{BackendStats, InMemoryBackend, InMemoryConfig, RedisBackend, SessionBackend};
pub use cookie::{extract_session_id, SessionCookie, SESSION_COOKIE_NAME, SESSION_HEADER_NAME};

use crate::error::{GateError, Result};
use crate::rbac::models::{SessionId, SessionRecord};
use metrics::{counter, histogram};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default key namespace for session records.
pub const DEFAULT_KEY_PREFIX: &str = "rolegate:session:";

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Session store configuration.
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Prefix prepended to every session id to form the backend key
    pub key_prefix: String,

    /// Record lifetime; `None` keeps records until logout
    pub session_ttl: Option<Duration>,

    /// Deadline for each backend call
    pub command_timeout: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            session_ttl: Some(Duration::from_secs(3600)),
            command_timeout: Duration::from_secs(2),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session Store
// ═══════════════════════════════════════════════════════════════════════════════

/// Timeout-bounded, namespaced access to session records.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    config: Arc<SessionStoreConfig>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>, config: SessionStoreConfig) -> Self {
        Self {
            backend,
            config: Arc::new(config),
        }
    }

    /// In-memory store with default settings.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryBackend::default()),
            SessionStoreConfig::default(),
        )
    }

    pub fn config(&self) -> &SessionStoreConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn key(&self, session_id: &SessionId) -> String {
        format!("{}{}", self.config.key_prefix, session_id.as_str())
    }

    /// Run a backend call under the command timeout, recording its outcome.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let timeout = self.config.command_timeout;

        let result = match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(GateError::store_timeout(operation, timeout)),
        };

        let outcome = if result.is_ok() { "ok" } else { "error" };
        counter!(
            "rolegate_session_store_ops_total",
            "op" => operation,
            "backend" => self.backend.name(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!("rolegate_session_store_duration_seconds", "op" => operation)
            .record(start.elapsed().as_secs_f64());

        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Record access
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch a record, surfacing why it could not be read.
    ///
    /// Returns `Ok(None)` when no record exists, a `DeserializationError` when
    /// the stored value is not a session record, and a store error code when
    /// the backend failed or timed out.
    pub async fn try_get(&self, session_id: &SessionId) -> Result<Option<SessionRecord>> {
        let key = self.key(session_id);
        let raw = self.bounded("get", self.backend.get(&key)).await?;

        match raw {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch a record. Any failure reads as "no record".
    pub async fn get(&self, session_id: &SessionId) -> Option<SessionRecord> {
        match self.try_get(session_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    session = %session_id.fingerprint(),
                    error = %e,
                    "Session read failed; treating as absent"
                );
                None
            }
        }
    }

    /// Upsert a record. Last write wins.
    pub async fn put(&self, session_id: &SessionId, record: &SessionRecord) -> Result<()> {
        let key = self.key(session_id);
        let bytes = serde_json::to_vec(record)?;

        self.bounded("put", self.backend.set(&key, bytes, self.config.session_ttl))
            .await?;

        debug!(session = %session_id.fingerprint(), role = %record.role, "Session stored");
        Ok(())
    }

    /// Remove a record. Succeeds when nothing was stored.
    pub async fn delete(&self, session_id: &SessionId) -> Result<()> {
        let key = self.key(session_id);
        let removed = self.bounded("delete", self.backend.delete(&key)).await?;

        debug!(session = %session_id.fingerprint(), removed, "Session deleted");
        Ok(())
    }

    /// Check the backend is reachable within the command timeout.
    pub async fn ping(&self) -> Result<()> {
        self.bounded("ping", self.backend.ping()).await
    }

    pub async fn stats(&self) -> Result<BackendStats> {
        self.bounded("stats", self.backend.stats()).await
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
