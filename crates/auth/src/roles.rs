use std::collections::{BTreeMap, BTreeSet};

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use permgate_core::{AccessError, PermissionKey};

/// Company-level role of an authenticated user.
///
/// Closed enumeration checked at the boundary: unknown role strings are
/// rejected with [`AccessError::UnknownRole`] rather than defaulted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Admin, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
        }
    }

    /// Whether this role may administer other users' access.
    pub fn is_administrator(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    /// The system operator role.
    pub fn is_operator(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}

impl FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "super-admin" => Ok(Role::SuperAdmin),
            other => Err(AccessError::UnknownRole(other.to_string())),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static role → default data-permission mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleDefaults(BTreeMap<Role, BTreeSet<PermissionKey>>);

impl RoleDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: Role, keys: impl IntoIterator<Item = PermissionKey>) -> Self {
        self.0.entry(role).or_default().extend(keys);
        self
    }

    /// Default keys for a role (empty when the role has no mapping).
    pub fn for_role(&self, role: Role) -> impl Iterator<Item = &PermissionKey> {
        self.0.get(&role).into_iter().flatten()
    }

    pub fn contains(&self, role: Role, key: &PermissionKey) -> bool {
        self.0.get(&role).is_some_and(|keys| keys.contains(key))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Role, &BTreeSet<PermissionKey>)> {
        self.0.iter()
    }
}
