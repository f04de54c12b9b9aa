//! `permgate-auth`: the pure access-control model.
//!
//! Catalog, grants, resolution and authorization rules. This crate performs no
//! IO of its own: provisioning state is read through [`ProvisioningLookup`] and
//! persistence lives in `permgate-infra`.

pub mod audit;
pub mod authorize;
pub mod catalog;
pub mod changes;
pub mod dependency;
pub mod grants;
pub mod principal;
pub mod provisioning;
pub mod resolver;
pub mod roles;

pub use audit::{AuditRecord, ChangeType};
pub use authorize::{
    authorize_grant_change, authorize_module, authorize_permission, authorize_provisioning,
};
pub use catalog::{
    Catalog, CatalogDefinition, Module, ModuleFilter, ModuleTier, Permission, PermissionGroup,
    PermissionTemplate, SubFeature,
};
pub use changes::{
    ApplyResult, Change, ChangeTarget, CommitResult, FailedChange, PendingChanges, SkippedItem,
    TemplateItem,
};
pub use dependency::{DependencyResolver, GrantedSet};
pub use grants::{DataPermissionGrant, ModuleGrant, ModulePermissionGrant, UserGrants};
pub use principal::{Actor, Subject};
pub use provisioning::{PricingTier, ProvisioningConfig, ProvisioningLookup, ProvisioningRecord};
pub use resolver::{
    DropReason, DroppedPermission, EffectivePermissionSet, PermissionExplanation,
    PermissionResolver, PermissionSource,
};
pub use roles::{Role, RoleDefaults};
