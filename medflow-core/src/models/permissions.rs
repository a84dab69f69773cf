//! Role-based permission policy.
//!
//! Permissions are an enum-keyed `Role x Resource x Action` table evaluated
//! in code, replacing the stored permission dictionaries the legacy system
//! kept per access group. Enforcement (deciding *when* to check) belongs to
//! the calling layer; this module only answers whether a combination is
//! allowed.

use serde::{Deserialize, Serialize};

/// Access tier assigned to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Unrestricted access, including user administration.
    Administrator,
    /// Manages fiscal tables and runs/finalizes settlements.
    Finance,
    /// Records and maintains earnings line items.
    Operator,
    /// Read-only access.
    Viewer,
}

/// Entity class a permission applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    Shifts,
    PrivateProcedures,
    AdministrativeProduction,
    Adjustments,
    ProLabore,
    Settlements,
    BracketTables,
    FiscalProfiles,
}

/// Operation a role may perform on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
    Compute,
    Finalize,
}

/// Static permission table.
pub struct PermissionPolicy;

impl PermissionPolicy {
    pub fn allows(role: Role, resource: Resource, action: Action) -> bool {
        use Action::*;
        use Resource::*;

        match role {
            Role::Administrator => true,
            Role::Viewer => matches!(action, View),
            Role::Finance => match resource {
                Settlements => matches!(action, View | Compute | Finalize),
                BracketTables | FiscalProfiles => {
                    matches!(action, View | Create | Update | Delete)
                }
                _ => matches!(action, View),
            },
            Role::Operator => match resource {
                Shifts | PrivateProcedures | AdministrativeProduction | Adjustments
                | ProLabore => matches!(action, View | Create | Update | Delete),
                _ => matches!(action, View),
            },
        }
    }
}
