//! Persistence boundary for grants, provisioning and audit records.
//!
//! Store traits make no storage assumptions; the in-memory implementations are
//! intended for tests and single-process deployments.

pub mod audit;
pub mod grants;
pub mod provisioning;

pub use audit::{AuditFilter, AuditPage, AuditQuery, AuditSink, InMemoryAuditLog, Pagination};
pub use grants::{GrantStore, InMemoryGrantStore};
pub use provisioning::{InMemoryProvisioningStore, ProvisioningStore};

use permgate_core::AccessError;
use thiserror::Error;

/// Store operation error.
///
/// Business validation never originates here; `Rejected` only guards the
/// store's own keying rules.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// The write does not fit the key it was addressed to.
    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        StoreError::Unavailable("lock poisoned".to_string())
    }
}

impl From<StoreError> for AccessError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => AccessError::ConcurrentModificationRetry(msg),
            StoreError::Rejected(msg) => AccessError::InvalidId(msg),
            StoreError::Unavailable(msg) => AccessError::StoreUnavailable(msg),
        }
    }
}
