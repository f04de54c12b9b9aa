//! Optimistic concurrency primitives for grant rows.

use crate::error::{AccessError, AccessResult};

/// Optimistic concurrency expectation for a user's grant rows in one company.
///
/// Every write bumps the row-set version by one. Writers that read, validate
/// and then write pass the version they validated against.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (seeding, migrations).
    Any,
    /// Require the row set to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> AccessResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(AccessError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_version_mismatch_is_a_retryable_conflict() {
        let err = ExpectedVersion::Exact(3).check(4).unwrap_err();
        assert!(err.is_retryable());
        assert!(ExpectedVersion::Any.check(42).is_ok());
    }
}
