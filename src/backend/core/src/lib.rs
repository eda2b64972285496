#![allow(clippy::result_large_err)]
//! # Rolegate Core
//!
//! Role-based authorization gate over a shared session cache.
//!
//! ## Architecture
//!
//! - **Policy Table**: immutable Role × Resource → actions mapping, built-in or loaded from TOML
//! - **Session Store**: timeout-bounded session records over in-memory or Redis backends
//! - **Authorization Engine**: session lookup + policy check, folding every failure into a deny
//! - **Lifecycle**: login/logout writing and removing session records
//! - **Gate**: caller-facing facade shaping results into response types
//! - **API**: Axum HTTP surface and a route guard layer
//! - **Telemetry**: structured logging, optional OTLP export, Prometheus metrics

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod rbac;
pub mod session;
pub mod telemetry;

pub use error::{ErrorCode, ErrorDetails, ErrorSeverity, GateError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{ErrorCode, ErrorDetails, ErrorSeverity, GateError, Result};
    pub use crate::gate::{AuthorizeResponse, Gate, LoginResponse, LogoutResponse, SessionInfo};
    pub use crate::rbac::{
        ActionSet, AuthorizationEngine, DenyReason, PolicyDecision, PolicyError, PolicyTable,
        RequireActionLayer, RequireActionService, Resource, Role, SessionContext, SessionId,
        SessionManager, SessionRecord,
    };
    pub use crate::session::{
        BackendStats, InMemoryBackend, InMemoryConfig, RedisBackend, SessionBackend,
        SessionStore, SessionStoreConfig,
    };
}
