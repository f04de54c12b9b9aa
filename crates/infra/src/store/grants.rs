use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use permgate_auth::UserGrants;
use permgate_core::{CompanyId, ExpectedVersion, UserId};

use super::StoreError;

/// Per-(user, company) grant rows.
///
/// Rows are read and written as one versioned set, so a read-validate-write
/// sequence can detect interleaved writers.
pub trait GrantStore: Send + Sync {
    /// Current rows; an empty set at version 0 when the user has none.
    fn load(&self, user_id: UserId, company_id: CompanyId) -> Result<UserGrants, StoreError>;

    /// Replace the row set, returning the new version.
    fn save(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        grants: UserGrants,
        expected_version: ExpectedVersion,
    ) -> Result<u64, StoreError>;
}

impl<S> GrantStore for Arc<S>
where
    S: GrantStore + ?Sized,
{
    fn load(&self, user_id: UserId, company_id: CompanyId) -> Result<UserGrants, StoreError> {
        (**self).load(user_id, company_id)
    }

    fn save(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        grants: UserGrants,
        expected_version: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        (**self).save(user_id, company_id, grants, expected_version)
    }
}

/// In-memory grant store.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    rows: RwLock<HashMap<(CompanyId, UserId), UserGrants>>,
}

impl InMemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GrantStore for InMemoryGrantStore {
    fn load(&self, user_id: UserId, company_id: CompanyId) -> Result<UserGrants, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned())?;
        Ok(rows.get(&(company_id, user_id)).cloned().unwrap_or_default())
    }

    fn save(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        mut grants: UserGrants,
        expected_version: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned())?;
        let current = rows.get(&(company_id, user_id)).map(|g| g.version).unwrap_or(0);

        if !expected_version.matches(current) {
            return Err(StoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        let owners = grants
            .data
            .iter()
            .map(|g| (g.user_id, g.company_id))
            .chain(grants.modules.iter().map(|g| (g.user_id, g.company_id)))
            .chain(grants.module_permissions.iter().map(|g| (g.user_id, g.company_id)));
        for (row_user, row_company) in owners {
            if row_user != user_id || row_company != company_id {
                return Err(StoreError::Rejected(format!(
                    "row for user {row_user} in company {row_company} saved under user {user_id} in company {company_id}"
                )));
            }
        }

        grants.version = current + 1;
        let version = grants.version;
        rows.insert((company_id, user_id), grants);
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use permgate_auth::DataPermissionGrant;
    use permgate_core::PermissionKey;

    use super::*;

    fn data_grant(user_id: UserId, company_id: CompanyId) -> DataPermissionGrant {
        DataPermissionGrant {
            user_id,
            company_id,
            key: PermissionKey::from("reports.view"),
            is_granted: true,
            granted_by: UserId::new(),
            granted_at: Utc::now(),
            expires_at: None,
        }
    }

    #[test]
    fn missing_rows_load_as_empty_version_zero() {
        let store = InMemoryGrantStore::new();
        let grants = store.load(UserId::new(), CompanyId::new()).unwrap();
        assert_eq!(grants, UserGrants::default());
    }

    #[test]
    fn save_bumps_version_and_rejects_stale_writers() {
        let store = InMemoryGrantStore::new();
        let (user, company) = (UserId::new(), CompanyId::new());

        let mut grants = store.load(user, company).unwrap();
        grants.data.push(data_grant(user, company));
        assert_eq!(store.save(user, company, grants.clone(), ExpectedVersion::Exact(0)).unwrap(), 1);

        let err = store
            .save(user, company, grants, ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
        assert_eq!(store.load(user, company).unwrap().data.len(), 1);
    }

    #[test]
    fn rows_for_other_owners_reject_the_whole_write() {
        let store = InMemoryGrantStore::new();
        let (user, company) = (UserId::new(), CompanyId::new());
        let grants = UserGrants {
            data: vec![data_grant(user, company), data_grant(UserId::new(), company)],
            ..Default::default()
        };
        let err = store.save(user, company, grants, ExpectedVersion::Any).unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert_eq!(permgate_core::AccessError::from(err).code(), "invalid_id");

        let stored = store.load(user, company).unwrap();
        assert!(stored.data.is_empty());
        assert_eq!(stored.version, 0);
    }
}
