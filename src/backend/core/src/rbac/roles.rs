//! Built-in roles and their default grants.
//!
//! | Role                | Description                                                   |
//! |---------------------|---------------------------------------------------------------|
//! | customer            | Self-service access to own reports, profile and tickets       |
//! | admin               | Full access to every resource                                 |
//! | marketing_executive | Runs campaigns; reads customer profiles and tickets           |
//! | customer_executive  | Handles support tickets                                       |
//! | nutritionist        | Maintains reports across customers                            |

use super::models::{Resource, Role, WILDCARD_ACTION};

const ALL_ACTIONS: &[&str] = &[WILDCARD_ACTION];

impl Role {
    /// Get the human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Admin => "Admin",
            Self::MarketingExecutive => "Marketing Executive",
            Self::CustomerExecutive => "Customer Executive",
            Self::Nutritionist => "Nutritionist",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Customer => "Self-service access to own reports, profile and support tickets",
            Self::Admin => "Full access to every resource",
            Self::MarketingExecutive => "Runs marketing campaigns; reads customer profiles and tickets",
            Self::CustomerExecutive => "Handles customer support tickets",
            Self::Nutritionist => "Maintains reports across customers",
        }
    }

    /// The default action grants for this role, per resource.
    ///
    /// Resources not listed grant no actions.
    pub fn default_grants(&self) -> Vec<(Resource, &'static [&'static str])> {
        match self {
            Self::Customer => vec![
                (Resource::Reports, &["view_own", "edit_own"] as &[&str]),
                (Resource::CustomerProfiles, &["view_own", "edit_own", "delete_own"] as &[&str]),
                (Resource::CustomerSupportTickets, &["view_own"] as &[&str]),
            ],
            Self::Admin => Resource::all()
                .into_iter()
                .map(|resource| (resource, ALL_ACTIONS))
                .collect(),
            Self::MarketingExecutive => vec![
                (
                    Resource::Marketing,
                    &["view_many", "edit_many", "edit_own", "create_many"] as &[&str],
                ),
                (Resource::CustomerProfiles, &["view_many"] as &[&str]),
                (Resource::CustomerSupportTickets, &["view_many"] as &[&str]),
            ],
            Self::CustomerExecutive => vec![(
                Resource::CustomerSupportTickets,
                &["view_many", "edit_many", "edit_own"] as &[&str],
            )],
            Self::Nutritionist => vec![(
                Resource::Reports,
                &["view_many", "edit_many", "edit_own", "delete_many"] as &[&str],
            )],
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
