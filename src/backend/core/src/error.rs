//! Error handling for Rolegate Core.
//!
//! This module provides:
//! - A single error type with machine-readable codes and context chaining
//! - HTTP status code mapping for API responses
//! - User-friendly messages vs detailed internal messages
//! - Error logging with tracing integration
//! - Metrics integration for error tracking
//!
//! The authorization engine never surfaces these errors to its callers: every
//! failure on the check path folds into a deny verdict. Only session login and
//! logout, configuration loading, and the HTTP layer propagate them.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rolegate_core::error::{GateError, Result};
//!
//! fn require_session(id: Option<SessionId>) -> Result<SessionId> {
//!     id.ok_or_else(|| GateError::unauthorized("No session supplied"))
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for Rolegate operations.
pub type Result<T> = std::result::Result<T, GateError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes for API responses.
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Session Errors (1000-1099)
    SessionNotFound,
    UnknownRole,
    InvalidSessionId,

    // Session Store Errors (2100-2199)
    StoreError,
    StoreConnectionFailed,
    StoreTimeout,

    // Serialization Errors (2200-2299)
    SerializationError,
    DeserializationError,

    // Auth Errors (4000-4099)
    Unauthorized,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    MissingConfiguration,
    InvalidConfiguration,
    InvalidPolicy,

}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::SessionNotFound => 1000,
            Self::UnknownRole => 1001,
            Self::InvalidSessionId => 1002,

            Self::StoreError => 2100,
            Self::StoreConnectionFailed => 2101,
            Self::StoreTimeout => 2102,

            Self::SerializationError => 2200,
            Self::DeserializationError => 2201,

            Self::Unauthorized => 4000,

            Self::ConfigurationError => 5000,
            Self::MissingConfiguration => 5001,
            Self::InvalidConfiguration => 5002,
            Self::InvalidPolicy => 5003,
        }
    }

    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            // Unauthorized (401)
            Self::SessionNotFound | Self::Unauthorized => StatusCode::UNAUTHORIZED,

            // Unprocessable Entity (422)
            Self::UnknownRole | Self::InvalidSessionId => StatusCode::UNPROCESSABLE_ENTITY,

            // Service Unavailable (503)
            Self::StoreConnectionFailed | Self::StoreTimeout => StatusCode::SERVICE_UNAVAILABLE,

            // Internal Server Error (500)
            Self::StoreError
            | Self::SerializationError
            | Self::DeserializationError
            | Self::ConfigurationError
            | Self::MissingConfiguration
            | Self::InvalidConfiguration
            | Self::InvalidPolicy => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error means the session store could not be reached or answered.
    pub const fn is_store_unavailable(&self) -> bool {
        matches!(
            self,
            Self::StoreError | Self::StoreConnectionFailed | Self::StoreTimeout
        )
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "session",
            2100..=2199 => "session_store",
            2200..=2299 => "serialization",
            4000..=4099 => "authorization",
            5000..=5099 => "configuration",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging and alerting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller errors (bad input, unknown role)
    Low,
    /// Operational issues (store timeouts)
    Medium,
    /// System errors (store failures, corrupt records)
    High,
    /// Errors requiring immediate attention
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::SessionNotFound
            | ErrorCode::UnknownRole
            | ErrorCode::InvalidSessionId
            | ErrorCode::Unauthorized => Self::Low,

            ErrorCode::StoreTimeout => Self::Medium,

            ErrorCode::StoreError
            | ErrorCode::SerializationError
            | ErrorCode::DeserializationError
            | ErrorCode::ConfigurationError
            | ErrorCode::MissingConfiguration
            | ErrorCode::InvalidConfiguration
            | ErrorCode::InvalidPolicy => Self::High,

            ErrorCode::StoreConnectionFailed => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Related entity ID (session fingerprint, role name, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Retry information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,

    /// Suggested action for resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_secs = Some(seconds);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_action = Some(suggestion.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Rolegate Core.
#[derive(Error, Debug)]
pub struct GateError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to clients)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl GateError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    details = ?self.details,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Low severity error"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "rolegate_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false for errors
    pub success: bool,

    pub error: ErrorInfo,
}

/// Detailed error information for API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,

    pub numeric_code: u32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,

    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&GateError> for ErrorResponse {
    fn from(error: &GateError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                details: if error.details.context.is_empty()
                    && error.details.entity_id.is_none()
                    && error.details.retry_after_secs.is_none()
                {
                    None
                } else {
                    Some(error.details.clone())
                },
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Common Error Types
// ═══════════════════════════════════════════════════════════════════════════════

impl From<redis::RedisError> for GateError {
    fn from(error: redis::RedisError) -> Self {
        let (code, user_msg) = if error.is_connection_refusal() || error.is_connection_dropped() {
            (
                ErrorCode::StoreConnectionFailed,
                "Unable to connect to session store",
            )
        } else if error.is_timeout() {
            (ErrorCode::StoreTimeout, "Session store operation timed out")
        } else {
            (ErrorCode::StoreError, "A session store error occurred")
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for GateError {
    fn from(error: serde_json::Error) -> Self {
        let code = if error.is_syntax() || error.is_data() || error.is_eof() {
            ErrorCode::DeserializationError
        } else {
            ErrorCode::SerializationError
        };

        Self::with_internal(code, "Failed to process session record", error.to_string())
            .with_source(error)
    }
}

impl From<config::ConfigError> for GateError {
    fn from(error: config::ConfigError) -> Self {
        let (code, user_msg) = match &error {
            config::ConfigError::NotFound(_) => (
                ErrorCode::MissingConfiguration,
                "Required configuration not found",
            ),
            config::ConfigError::PathParse(_) | config::ConfigError::FileParse { .. } => (
                ErrorCode::InvalidConfiguration,
                "Configuration file is invalid",
            ),
            _ => (
                ErrorCode::ConfigurationError,
                "Configuration error occurred",
            ),
        };

        Self::with_internal(code, user_msg, error.to_string())
    }
}

impl From<crate::rbac::PolicyError> for GateError {
    fn from(error: crate::rbac::PolicyError) -> Self {
        Self::with_internal(
            ErrorCode::InvalidPolicy,
            "Policy table failed validation",
            error.to_string(),
        )
        .with_source(error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Convenience Constructors for Domain Errors
// ═══════════════════════════════════════════════════════════════════════════════

impl GateError {
    /// A role name outside the enumerated set was supplied.
    pub fn unknown_role(role: impl Into<String>) -> Self {
        let role = role.into();
        Self::new(ErrorCode::UnknownRole, format!("Unknown role: {}", role))
            .with_details(
                ErrorDetails::new()
                    .with_entity("role", role)
                    .with_suggestion("Use one of the enumerated roles"),
            )
    }

    /// No session exists for the supplied identifier.
    pub fn session_not_found(fingerprint: impl Into<String>) -> Self {
        Self::new(ErrorCode::SessionNotFound, "No active session")
            .with_details(ErrorDetails::new().with_entity("session", fingerprint))
    }

    /// A client-supplied session identifier was rejected.
    pub fn invalid_session_id(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidSessionId,
            format!("Invalid session identifier: {}", reason),
        )
        .with_details(ErrorDetails::new().with_suggestion(
            "Use 1-128 characters from A-Z, a-z, 0-9, '.', '_', '~' and '-'",
        ))
    }

    /// A session store call exceeded its deadline.
    pub fn store_timeout(operation: &'static str, timeout: Duration) -> Self {
        Self::with_internal(
            ErrorCode::StoreTimeout,
            "Session store operation timed out",
            format!("{} exceeded {:?}", operation, timeout),
        )
        .with_details(
            ErrorDetails::new()
                .with_context("operation", operation)
                .with_context("timeout_ms", timeout.as_millis() as u64)
                .with_retry_after(1),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
