//! Append-only audit log and its paged query interface.
//!
//! Queries are company-scoped and paginated by default.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use permgate_auth::{AuditRecord, ChangeType};
use permgate_core::{CompanyId, UserId};

use super::StoreError;

/// Largest page a caller can request.
pub const MAX_PAGE_LIMIT: u32 = 1000;
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Write side of the audit log.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: AuditRecord) -> Result<(), StoreError>;
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn append(&self, record: AuditRecord) -> Result<(), StoreError> {
        (**self).append(record)
    }
}

/// Pagination parameters for audit queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self::with_default_limit(limit, offset, DEFAULT_PAGE_LIMIT)
    }

    /// Like [`Pagination::new`] with a deployment-specific default page size.
    pub fn with_default_limit(limit: Option<u32>, offset: Option<u32>, default_limit: u32) -> Self {
        Self {
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria for audit queries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub affected_user_id: Option<UserId>,
    pub actor_user_id: Option<UserId>,
    pub change_type: Option<ChangeType>,
    pub key: Option<String>,
    pub performed_after: Option<DateTime<Utc>>,
    pub performed_before: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            affected_user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.affected_user_id
            .is_none_or(|u| record.affected_user_id == Some(u))
            && self.actor_user_id.is_none_or(|u| record.actor_user_id == u)
            && self.change_type.is_none_or(|t| record.change_type == t)
            && self.key.as_deref().is_none_or(|k| record.key == k)
            && self.performed_after.is_none_or(|t| record.performed_at >= t)
            && self.performed_before.is_none_or(|t| record.performed_at <= t)
    }
}

/// One page of audit records, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPage {
    pub records: Vec<AuditRecord>,
    /// Records matching the filter across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

/// Async read side of the audit log.
#[async_trait::async_trait]
pub trait AuditQuery: Send + Sync {
    /// Records for a company, ordered by `performed_at` descending.
    async fn query_audit(
        &self,
        company_id: CompanyId,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, StoreError>;

    /// History of one affected user.
    async fn user_history(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        pagination: Option<Pagination>,
    ) -> Result<AuditPage, StoreError> {
        self.query_audit(company_id, AuditFilter::for_user(user_id), pagination.unwrap_or_default())
            .await
    }

    async fn get_record(
        &self,
        company_id: CompanyId,
        record_id: Uuid,
    ) -> Result<Option<AuditRecord>, StoreError>;
}

#[async_trait::async_trait]
impl<S> AuditQuery for Arc<S>
where
    S: AuditQuery + ?Sized,
{
    async fn query_audit(
        &self,
        company_id: CompanyId,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, StoreError> {
        (**self).query_audit(company_id, filter, pagination).await
    }

    async fn get_record(
        &self,
        company_id: CompanyId,
        record_id: Uuid,
    ) -> Result<Option<AuditRecord>, StoreError> {
        (**self).get_record(company_id, record_id).await
    }
}

/// In-memory audit log.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for InMemoryAuditLog {
    fn append(&self, record: AuditRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::poisoned())?;
        records.push(record);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuditQuery for InMemoryAuditLog {
    async fn query_audit(
        &self,
        company_id: CompanyId,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::poisoned())?;

        // Append order breaks ties between records with the same timestamp.
        let mut matching: Vec<&AuditRecord> = records
            .iter()
            .rev()
            .filter(|r| r.company_id == company_id && filter.matches(r))
            .collect();
        matching.sort_by(|a, b| b.performed_at.cmp(&a.performed_at));

        let total = matching.len() as u64;
        let page: Vec<AuditRecord> = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        let has_more = total > u64::from(pagination.offset) + u64::from(pagination.limit);

        Ok(AuditPage {
            records: page,
            total,
            pagination,
            has_more,
        })
    }

    async fn get_record(
        &self,
        company_id: CompanyId,
        record_id: Uuid,
    ) -> Result<Option<AuditRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::poisoned())?;
        Ok(records
            .iter()
            .find(|r| r.id == record_id && r.company_id == company_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record(company_id: CompanyId, user: UserId, at: DateTime<Utc>, key: &str) -> AuditRecord {
        AuditRecord::new(
            UserId::new(),
            Some(user),
            company_id,
            ChangeType::DataGrant,
            key,
            None,
            true,
            at,
        )
    }

    #[test]
    fn pagination_defaults_and_caps() {
        assert_eq!(Pagination::new(None, None).limit, 50);
        assert_eq!(Pagination::new(Some(5_000), Some(10)).limit, 1000);
        assert_eq!(Pagination::with_default_limit(None, None, 20).limit, 20);
        assert_eq!(Pagination::new(Some(0), None).limit, 1);
    }

    #[tokio::test]
    async fn query_is_company_scoped_and_newest_first() {
        let log = InMemoryAuditLog::new();
        let (company, other) = (CompanyId::new(), CompanyId::new());
        let user = UserId::new();
        let t0 = Utc::now();

        log.append(record(company, user, t0, "a")).unwrap();
        log.append(record(company, user, t0 + Duration::minutes(2), "b")).unwrap();
        log.append(record(company, user, t0 + Duration::minutes(1), "c")).unwrap();
        log.append(record(other, user, t0, "x")).unwrap();

        let page = log
            .query_audit(company, AuditFilter::default(), Pagination::default())
            .await
            .unwrap();
        let keys: Vec<_> = page.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
        assert_eq!(page.total, 3);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn filters_and_pages_compose() {
        let log = InMemoryAuditLog::new();
        let company = CompanyId::new();
        let (alice, bob) = (UserId::new(), UserId::new());
        let t0 = Utc::now();
        for i in 0..5 {
            log.append(record(company, alice, t0 + Duration::seconds(i), "k")).unwrap();
        }
        log.append(record(company, bob, t0, "k")).unwrap();

        let page = log
            .user_history(company, alice, Some(Pagination::new(Some(2), Some(0))))
            .await
            .unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.total, 5);
        assert!(page.has_more);
        assert!(page.records.iter().all(|r| r.affected_user_id == Some(alice)));

        let id = page.records[0].id;
        assert!(log.get_record(company, id).await.unwrap().is_some());
        assert!(log.get_record(CompanyId::new(), id).await.unwrap().is_none());
    }
}
