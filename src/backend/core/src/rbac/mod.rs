//! Role-based access control over cached sessions.
//!
//! This module provides:
//! - **Models**: Role, Resource, action vocabulary, SessionId, SessionRecord
//! - **Policy Table**: immutable Role × Resource → actions mapping
//! - **Authorization Engine**: session lookup + policy check, deny on any failure
//! - **Lifecycle**: login/logout writing session records
//! - **Middleware**: Axum guard requiring an action on a resource
//!
//! # Usage
//!
//! ```rust,ignore
//! use rolegate_core::rbac::{AuthorizationEngine, PolicyTable, SessionManager};
//!
//! let policy = Arc::new(PolicyTable::builtin());
//! let engine = AuthorizationEngine::new(policy, store.clone());
//! let sessions = SessionManager::new(store);
//!
//! sessions.login(&id, "customer").await?;
//! assert!(engine.is_authorized(&id, "customer_profiles", "view_own").await);
//! ```

pub mod engine;
pub mod lifecycle;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod roles;

pub use engine::AuthorizationEngine;
pub use lifecycle::SessionManager;
pub use middleware::{RequireActionLayer, RequireActionService, SessionContext};
pub use models::{
    is_canonical_action, InvalidSessionId, Resource, Role, SessionId, SessionRecord,
    UnknownVariant, MAX_SESSION_ID_LEN, NO_ACTIONS, WILDCARD_ACTION,
};
pub use policy::{ActionSet, DenyReason, PolicyDecision, PolicyError, PolicyTable};
