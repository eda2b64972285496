//! RBAC data models: Role, Resource, Action vocabulary, session identifiers
//! and the cached session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Wildcard action granting every action on a resource.
pub const WILDCARD_ACTION: &str = "all";

/// Sentinel action meaning "no actions granted".
pub const NO_ACTIONS: &str = "";

/// A string that does not name one of the enumerated roles or resources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role
// ═══════════════════════════════════════════════════════════════════════════════

/// The closed set of roles a session can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
    MarketingExecutive,
    CustomerExecutive,
    Nutritionist,
}

impl Role {
    /// Get the role identifier string as stored in session records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::MarketingExecutive => "marketing_executive",
            Self::CustomerExecutive => "customer_executive",
            Self::Nutritionist => "nutritionist",
        }
    }

    /// Return all roles.
    pub fn all() -> [Role; 5] {
        [
            Self::Customer,
            Self::Admin,
            Self::MarketingExecutive,
            Self::CustomerExecutive,
            Self::Nutritionist,
        ]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "role",
                value: s.to_string(),
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resource
// ═══════════════════════════════════════════════════════════════════════════════

/// The closed set of protected resource domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Marketing,
    Operations,
    Reports,
    CustomerProfiles,
    CustomerSupportTickets,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Marketing => "marketing",
            Self::Operations => "operations",
            Self::Reports => "reports",
            Self::CustomerProfiles => "customer_profiles",
            Self::CustomerSupportTickets => "customer_support_tickets",
        }
    }

    pub fn all() -> [Resource; 5] {
        [
            Self::Marketing,
            Self::Operations,
            Self::Reports,
            Self::CustomerProfiles,
            Self::CustomerSupportTickets,
        ]
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|resource| resource.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "resource",
                value: s.to_string(),
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Action vocabulary
// ═══════════════════════════════════════════════════════════════════════════════

/// Verbs of the canonical `<verb>_<scope>` action vocabulary.
pub const ACTION_VERBS: [&str; 4] = ["view", "edit", "create", "delete"];

/// Scopes of the canonical action vocabulary: the caller's own records, or
/// records belonging to others.
pub const ACTION_SCOPES: [&str; 2] = ["own", "many"];

/// Whether `action` belongs to the canonical action vocabulary.
///
/// The wildcard and the empty sentinel are canonical; anything else must be
/// exactly `<verb>_<scope>`.
pub fn is_canonical_action(action: &str) -> bool {
    if action == WILDCARD_ACTION || action == NO_ACTIONS {
        return true;
    }
    match action.split_once('_') {
        Some((verb, scope)) => ACTION_VERBS.contains(&verb) && ACTION_SCOPES.contains(&scope),
        None => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session identifier
// ═══════════════════════════════════════════════════════════════════════════════

/// Longest accepted session identifier.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Why a client-supplied session identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSessionId {
    #[error("session identifier is empty")]
    Empty,

    #[error("session identifier exceeds 128 characters")]
    TooLong,

    #[error("session identifier contains a character outside [A-Za-z0-9._~-]")]
    ForbiddenCharacter,
}

/// Opaque per-client session identifier.
///
/// The raw value is a bearer secret. `Debug` prints only a fingerprint, and
/// logging code should use [`SessionId::fingerprint`].
///
/// Identifiers are taken verbatim and restricted to URL-safe characters, so
/// every value can be echoed into a `Set-Cookie` header as-is.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Validate a client-supplied identifier.
    pub fn try_new(raw: impl Into<String>) -> Result<Self, InvalidSessionId> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(InvalidSessionId::Empty);
        }
        if raw.len() > MAX_SESSION_ID_LEN {
            return Err(InvalidSessionId::TooLong);
        }
        if !raw.bytes().all(is_session_id_byte) {
            return Err(InvalidSessionId::ForbiddenCharacter);
        }
        Ok(Self(raw))
    }

    /// Like [`SessionId::try_new`], for transports where a bad value counts
    /// as no session at all.
    pub fn parse(raw: impl AsRef<str>) -> Option<Self> {
        Self::try_new(raw.as_ref()).ok()
    }

    /// Mint a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short SHA-256 fingerprint, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..6])
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.fingerprint())
    }
}

impl TryFrom<String> for SessionId {
    type Error = InvalidSessionId;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::try_new(raw)
    }
}

fn is_session_id_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'~' | b'-')
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session record
// ═══════════════════════════════════════════════════════════════════════════════

/// The cached claim binding a session identifier to a role.
///
/// `role` is kept in wire form so that a record written with a role outside
/// the enumerated set still deserializes and can be denied explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn new(role: Role) -> Self {
        Self {
            role: role.as_str().to_string(),
            issued_at: Some(Utc::now()),
        }
    }

    /// Resolve the recorded role against the enumerated set.
    pub fn role(&self) -> Result<Role, UnknownVariant> {
        self.role.parse()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
