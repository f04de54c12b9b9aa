use serde::{Deserialize, Serialize};

use permgate_core::{AccessResult, CompanyId, UserId};

use crate::roles::Role;

/// Authenticated caller performing a mutation.
///
/// Identity comes from the session layer; this crate never authenticates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, company_id: CompanyId, role: Role) -> Self {
        Self {
            user_id,
            company_id,
            role,
        }
    }

    /// Build from session strings, rejecting unknown roles.
    pub fn parse(user_id: UserId, company_id: CompanyId, role: &str) -> AccessResult<Self> {
        Ok(Self::new(user_id, company_id, role.parse()?))
    }
}

/// User whose access is being read or changed, within one company.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub role: Role,
}

impl Subject {
    pub fn new(user_id: UserId, company_id: CompanyId, role: Role) -> Self {
        Self {
            user_id,
            company_id,
            role,
        }
    }

    pub fn parse(user_id: UserId, company_id: CompanyId, role: &str) -> AccessResult<Self> {
        Ok(Self::new(user_id, company_id, role.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_unknown_roles_at_the_boundary() {
        let err = Subject::parse(UserId::new(), CompanyId::new(), "root").unwrap_err();
        assert_eq!(err.code(), "unknown_role");
        assert!(Actor::parse(UserId::new(), CompanyId::new(), "admin").is_ok());
    }
}
