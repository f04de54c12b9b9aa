//! Access-control error model.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::id::{ModuleId, PermissionKey, TemplateId};

/// Result type used across the engine.
pub type AccessResult<T> = Result<T, AccessError>;

/// Engine-level error.
///
/// Every variant is a distinct, user-renderable failure kind. Batch operations
/// attach these to individual items instead of aborting the whole request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("unknown permission '{0}'")]
    UnknownPermission(PermissionKey),

    #[error("unknown module '{0}'")]
    UnknownModule(ModuleId),

    #[error("unknown template '{0}'")]
    UnknownTemplate(TemplateId),

    /// A permission's `requires_permissions` chain is not satisfied.
    #[error("missing dependency for '{target}': {}", join(.missing))]
    MissingDependency {
        target: PermissionKey,
        missing: BTreeSet<PermissionKey>,
    },

    /// A module's `requires_modules` chain is not satisfied.
    #[error("module '{module}' requires inactive modules: {}", join(.missing))]
    ModuleDependencyUnmet {
        module: ModuleId,
        missing: BTreeSet<ModuleId>,
    },

    /// Other active modules still depend on the module being disabled.
    #[error("module '{module}' is required by active modules: {}", join(.dependents))]
    DependentModulesActive {
        module: ModuleId,
        dependents: BTreeSet<ModuleId>,
    },

    #[error("module '{0}' is not provisioned for this company")]
    NotProvisioned(ModuleId),

    /// The module is active for the company but not enabled for the user.
    #[error("module '{0}' is not enabled for this user")]
    ModuleNotEnabled(ModuleId),

    #[error("module '{0}' is locked and can only be changed by the system operator")]
    ModuleLocked(ModuleId),

    /// Module permissions only change through their module: included ones by
    /// toggling the module, optional ones as module sub-features.
    #[error("permission '{key}' is part of module '{module}' and cannot be toggled on its own")]
    IncludedPermissionNotRevocable { key: PermissionKey, module: ModuleId },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Serialization conflict on the user's grant rows. Safe to retry.
    #[error("concurrent modification, retry: {0}")]
    ConcurrentModificationRetry(String),

    /// The loaded catalog violates a structural invariant (e.g. a dependency cycle).
    #[error("catalog invariant violated: {0}")]
    CatalogInvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AccessError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn catalog_invariant(msg: impl Into<String>) -> Self {
        Self::CatalogInvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ConcurrentModificationRetry(msg.into())
    }

    /// Stable machine-readable code, preserved across any transport encoding.
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::UnknownRole(_) => "unknown_role",
            AccessError::UnknownPermission(_) => "unknown_permission",
            AccessError::UnknownModule(_) => "unknown_module",
            AccessError::UnknownTemplate(_) => "unknown_template",
            AccessError::MissingDependency { .. } => "missing_dependency",
            AccessError::ModuleDependencyUnmet { .. } => "module_dependency_unmet",
            AccessError::DependentModulesActive { .. } => "dependent_modules_active",
            AccessError::NotProvisioned(_) => "not_provisioned",
            AccessError::ModuleNotEnabled(_) => "module_not_enabled",
            AccessError::ModuleLocked(_) => "module_locked",
            AccessError::IncludedPermissionNotRevocable { .. } => "included_permission_not_revocable",
            AccessError::Unauthorized(_) => "unauthorized",
            AccessError::ConcurrentModificationRetry(_) => "concurrent_modification_retry",
            AccessError::CatalogInvariantViolation(_) => "catalog_invariant_violation",
            AccessError::InvalidId(_) => "invalid_id",
            AccessError::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// Whether the caller may simply retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AccessError::ConcurrentModificationRetry(_) | AccessError::StoreUnavailable(_)
        )
    }
}

fn join<T: core::fmt::Display>(items: &BTreeSet<T>) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
