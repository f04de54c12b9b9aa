//! Per-user grant records.
//!
//! All three grant kinds are keyed by `(user, company, ...)` and may carry an
//! expiry. Expiry is terminal: an expired row resolves as not-granted without
//! being deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use permgate_core::{CompanyId, ModuleId, PermissionKey, UserId};

/// Explicit override of a foundation permission for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPermissionGrant {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub key: PermissionKey,
    pub is_granted: bool,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Per-user module enablement.
///
/// May be stored while the company has the module unprovisioned; resolution
/// then treats it as inactive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleGrant {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub module_id: ModuleId,
    pub is_enabled: bool,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Per-user toggle of one optional sub-feature of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePermissionGrant {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub module_id: ModuleId,
    pub key: PermissionKey,
    pub is_granted: bool,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

fn live(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_none_or(|at| at > now)
}

impl DataPermissionGrant {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !live(self.expires_at, now)
    }
}

impl ModuleGrant {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !live(self.expires_at, now)
    }

    /// Enabled and unexpired. Provisioning is checked separately.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_enabled && !self.is_expired(now)
    }
}

impl ModulePermissionGrant {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !live(self.expires_at, now)
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_granted && !self.is_expired(now)
    }
}

/// Every grant row a user holds in one company, as read in one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrants {
    pub data: Vec<DataPermissionGrant>,
    pub modules: Vec<ModuleGrant>,
    pub module_permissions: Vec<ModulePermissionGrant>,
    /// Row-set version, bumped on every write for this `(user, company)`.
    pub version: u64,
}

impl UserGrants {
    pub fn data_grant(&self, key: &PermissionKey) -> Option<&DataPermissionGrant> {
        self.data.iter().find(|g| &g.key == key)
    }

    pub fn module_grant(&self, module: &ModuleId) -> Option<&ModuleGrant> {
        self.modules.iter().find(|g| &g.module_id == module)
    }

    pub fn module_permission_grant(
        &self,
        module: &ModuleId,
        key: &PermissionKey,
    ) -> Option<&ModulePermissionGrant> {
        self.module_permissions
            .iter()
            .find(|g| &g.module_id == module && &g.key == key)
    }

    /// Whether the user's own grant for `module` is enabled and unexpired.
    pub fn module_enabled(&self, module: &ModuleId, now: DateTime<Utc>) -> bool {
        self.module_grant(module).is_some_and(|g| g.is_live(now))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn grant(expires_at: Option<DateTime<Utc>>) -> ModuleGrant {
        ModuleGrant {
            user_id: UserId::new(),
            company_id: CompanyId::new(),
            module_id: ModuleId::from("expenses-pro"),
            is_enabled: true,
            granted_by: UserId::new(),
            granted_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn expiry_is_evaluated_against_the_given_instant() {
        let now = Utc::now();
        let g = grant(Some(now + Duration::minutes(5)));
        assert!(g.is_live(now));
        assert!(!g.is_live(now + Duration::minutes(5)));
        assert!(!g.is_live(now + Duration::hours(1)));
    }

    #[test]
    fn grants_without_expiry_never_lapse() {
        let g = grant(None);
        assert!(g.is_live(Utc::now() + Duration::days(10_000)));
    }
}
