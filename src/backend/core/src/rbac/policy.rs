//! Policy table: the immutable Role × Resource → actions mapping.
//!
//! The table answers "may role R perform action A on resource X?" without
//! touching the session store. It is built once at startup, either from the
//! built-in grants or from a TOML policy file, validated, and then shared
//! read-only behind an `Arc`.
//!
//! Policy files look like:
//!
//! ```toml
//! [roles.customer]
//! marketing = [""]
//! reports = ["view_own", "edit_own"]
//!
//! [roles.admin]
//! reports = ["all"]
//! ```

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use super::models::{is_canonical_action, Resource, Role, NO_ACTIONS, WILDCARD_ACTION};

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors raised while loading or validating a policy table.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Unknown role in policy: {0}")]
    UnknownRole(String),

    #[error("Unknown resource in policy: role={role}, resource={resource}")]
    UnknownResource { role: String, resource: String },

    #[error("Non-canonical action '{action}': role={role}, resource={resource}")]
    NonCanonicalAction {
        role: String,
        resource: String,
        action: String,
    },

    #[error("Failed to parse policy document: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// No record exists for the session identifier.
    SessionNotFound,
    /// The store timed out or failed while resolving the session.
    StoreUnavailable,
    /// A record exists but could not be decoded.
    MalformedRecord,
    /// The record's role is outside the enumerated set.
    UnknownRole,
    /// The requested resource is outside the enumerated set.
    UnknownResource,
    /// The role holds no matching action on the resource.
    PolicyMiss,
}

impl DenyReason {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionNotFound => "session_not_found",
            Self::StoreUnavailable => "store_unavailable",
            Self::MalformedRecord => "malformed_record",
            Self::UnknownRole => "unknown_role",
            Self::UnknownResource => "unknown_resource",
            Self::PolicyMiss => "policy_miss",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny(DenyReason),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::Allow => None,
            Self::Deny(reason) => Some(*reason),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Action set
// ═══════════════════════════════════════════════════════════════════════════════

/// Actions a role holds on a single resource.
///
/// The empty-string sentinel is dropped on construction, so an entry that only
/// held the sentinel is indistinguishable from an absent one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet {
    wildcard: bool,
    actions: BTreeSet<String>,
}

impl ActionSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn wildcard() -> Self {
        Self {
            wildcard: true,
            actions: BTreeSet::new(),
        }
    }

    pub fn from_actions<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::none();
        for action in actions {
            match action.as_ref() {
                NO_ACTIONS => {}
                WILDCARD_ACTION => set.wildcard = true,
                other => {
                    set.actions.insert(other.to_string());
                }
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        !self.wildcard && self.actions.is_empty()
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Whether `action` is granted. The wildcard grants everything, including
    /// the empty action; otherwise only a non-empty exact member matches.
    pub fn allows(&self, action: &str) -> bool {
        if self.wildcard {
            return true;
        }
        !action.is_empty() && self.actions.contains(action)
    }

    /// Granted actions in wire form, with `all` for the wildcard.
    pub fn to_vec(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.actions.len() + 1);
        if self.wildcard {
            out.push(WILDCARD_ACTION.to_string());
        }
        out.extend(self.actions.iter().cloned());
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Policy Table
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct PolicyDocument {
    #[serde(default)]
    roles: HashMap<String, HashMap<String, Vec<String>>>,
}

/// Immutable Role × Resource → [`ActionSet`] table.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    entries: HashMap<(Role, Resource), ActionSet>,
}

impl PolicyTable {
    /// Create an empty table that denies everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table assembled from each role's default grants.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for role in Role::all() {
            for (resource, actions) in role.default_grants() {
                table = table.grant(role, resource, actions.iter().copied());
            }
        }
        table
    }

    /// Set the actions a role holds on a resource, replacing any previous entry.
    pub fn grant<I, S>(mut self, role: Role, resource: Resource, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.entries
            .insert((role, resource), ActionSet::from_actions(actions));
        self
    }

    /// Parse and validate a TOML policy document.
    pub fn from_toml_str(source: &str) -> Result<Self, PolicyError> {
        let document: PolicyDocument = toml::from_str(source)?;
        let mut table = Self::new();

        for (role_name, resources) in &document.roles {
            let role: Role = role_name
                .parse()
                .map_err(|_| PolicyError::UnknownRole(role_name.clone()))?;

            for (resource_name, actions) in resources {
                let resource: Resource =
                    resource_name
                        .parse()
                        .map_err(|_| PolicyError::UnknownResource {
                            role: role_name.clone(),
                            resource: resource_name.clone(),
                        })?;

                if let Some(bad) = actions.iter().find(|a| !is_canonical_action(a)) {
                    return Err(PolicyError::NonCanonicalAction {
                        role: role_name.clone(),
                        resource: resource_name.clone(),
                        action: bad.clone(),
                    });
                }

                table = table.grant(role, resource, actions);
            }
        }

        for (role, resource) in table.undeclared_pairs(&document) {
            debug!(role = %role, resource = %resource, "Policy declares no entry; treating as no actions");
        }

        Ok(table)
    }

    /// Read, parse and validate a policy file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table = Self::from_toml_str(&source)?;
        info!(
            path = %path.display(),
            entries = table.entries.len(),
            "Loaded policy table"
        );
        Ok(table)
    }

    fn undeclared_pairs(&self, document: &PolicyDocument) -> Vec<(Role, Resource)> {
        let mut missing = Vec::new();
        for role in Role::all() {
            let declared = document.roles.get(role.as_str());
            for resource in Resource::all() {
                if declared.map_or(true, |r| !r.contains_key(resource.as_str())) {
                    missing.push((role, resource));
                }
            }
        }
        missing
    }

    /// The action set for a pair, if one was declared.
    pub fn action_set(&self, role: Role, resource: Resource) -> Option<&ActionSet> {
        self.entries.get(&(role, resource))
    }

    /// Whether `role` may perform `action` on `resource`.
    pub fn permits(&self, role: Role, resource: Resource, action: &str) -> bool {
        self.action_set(role, resource)
            .map_or(false, |set| set.allows(action))
    }

    /// String-typed variant of [`permits`](Self::permits): unknown role or
    /// resource names deny.
    pub fn permits_raw(&self, role: &str, resource: &str, action: &str) -> bool {
        match (role.parse::<Role>(), resource.parse::<Resource>()) {
            (Ok(role), Ok(resource)) => self.permits(role, resource, action),
            _ => false,
        }
    }

    /// Evaluate a typed request into a decision.
    pub fn evaluate(&self, role: Role, resource: Resource, action: &str) -> PolicyDecision {
        if self.permits(role, resource, action) {
            PolicyDecision::Allow
        } else {
            PolicyDecision::Deny(DenyReason::PolicyMiss)
        }
    }

    /// Non-empty grants held by a role, keyed by resource.
    pub fn grants(&self, role: Role) -> BTreeMap<Resource, Vec<String>> {
        Resource::all()
            .into_iter()
            .filter_map(|resource| {
                self.action_set(role, resource)
                    .filter(|set| !set.is_empty())
                    .map(|set| (resource, set.to_vec()))
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
