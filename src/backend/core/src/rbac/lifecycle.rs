//! Session lifecycle: binding a session to a role and revoking it.
//!
//! ```text
//! NoSession --login(r)--> Active(r) --login(r')--> Active(r') --logout--> NoSession
//! ```
//!
//! TTL expiry in the store also returns a session to `NoSession`.

use tracing::{info, warn};

use super::models::{Role, SessionId, SessionRecord};
use crate::error::{GateError, Result};
use crate::session::SessionStore;

/// Writes and removes session records.
#[derive(Clone, Debug)]
pub struct SessionManager {
    store: SessionStore,
}

impl SessionManager {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    /// Bind `session_id` to `role`, replacing any previous binding.
    ///
    /// An unrecognized role fails with `UnknownRole` and writes nothing.
    pub async fn login(&self, session_id: &SessionId, role: &str) -> Result<SessionRecord> {
        let role: Role = role.parse().map_err(|_| {
            warn!(session = %session_id.fingerprint(), role, "Login rejected: unknown role");
            GateError::unknown_role(role)
        })?;

        let record = SessionRecord::new(role);
        if let Err(e) = self.store.put(session_id, &record).await {
            e.log();
            return Err(e);
        }

        info!(session = %session_id.fingerprint(), role = %role, "Session started");
        Ok(record)
    }

    /// Remove the session. Succeeds when no session existed.
    pub async fn logout(&self, session_id: &SessionId) -> Result<()> {
        if let Err(e) = self.store.delete(session_id).await {
            e.log();
            return Err(e);
        }

        info!(session = %session_id.fingerprint(), "Session ended");
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
