//! Effective-permission resolution.
//!
//! Resolution order:
//! 1. Role defaults (super-admins additionally get every module-derived key of
//!    the company's active modules)
//! 2. Explicit data-permission grants (an unexpired revoke beats the role default)
//! 3. Included permissions of enabled, unexpired, provisioned modules
//! 4. Optional sub-features whose module passes the same check
//! 5. Drop every key whose dependency chain is not satisfied by the set so far
//!
//! Per-key problems (unknown keys, expired rows, inactive modules) never fail
//! resolution; they are recorded in [`EffectivePermissionSet::dropped`] and logged.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use permgate_core::{AccessResult, CompanyId, ModuleId, PermissionKey, UserId};

use crate::catalog::Catalog;
use crate::dependency::{DependencyResolver, GrantedSet};
use crate::grants::UserGrants;
use crate::provisioning::ProvisioningLookup;
use crate::roles::Role;

/// First source that made a key effective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissionSource {
    Role,
    DataGrant,
    ModuleIncluded { module: ModuleId },
    ModuleOptional { module: ModuleId },
}

/// Why a candidate key did not make it into the effective set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropReason {
    /// Catalog drift: the key or module is no longer in the catalog.
    UnknownPermission,
    UnknownModule { module: ModuleId },
    Expired,
    /// Explicit revoke overriding an earlier source.
    Revoked,
    /// Data grants only apply to foundation permissions.
    NotFoundation,
    /// The module is not provisioned for the company or not enabled for the user.
    ModuleInactive { module: ModuleId },
    MissingDependency { missing: BTreeSet<PermissionKey> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedPermission {
    pub key: PermissionKey,
    pub reason: DropReason,
}

/// Resolved capabilities of one user in one company at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermissionSet {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub role: Role,
    pub resolved_at: DateTime<Utc>,
    permissions: BTreeMap<PermissionKey, PermissionSource>,
    dropped: Vec<DroppedPermission>,
}

/// Human-readable answer to "why does (or doesn't) this user have `key`?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionExplanation {
    pub key: PermissionKey,
    pub granted: bool,
    pub source: Option<PermissionSource>,
    pub reason: String,
}

impl EffectivePermissionSet {
    pub fn contains(&self, key: &PermissionKey) -> bool {
        self.permissions.contains_key(key)
    }

    pub fn source_of(&self, key: &PermissionKey) -> Option<&PermissionSource> {
        self.permissions.get(key)
    }

    /// Effective keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &PermissionKey> {
        self.permissions.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PermissionKey, &PermissionSource)> {
        self.permissions.iter()
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Candidates that were considered and discarded, in resolution order.
    pub fn dropped(&self) -> &[DroppedPermission] {
        &self.dropped
    }

    pub fn key_set(&self) -> BTreeSet<PermissionKey> {
        self.permissions.keys().cloned().collect()
    }

    pub fn explain(&self, key: &PermissionKey) -> PermissionExplanation {
        if let Some(source) = self.permissions.get(key) {
            let reason = match source {
                PermissionSource::Role => format!("granted by the '{}' role defaults", self.role),
                PermissionSource::DataGrant => "granted explicitly to the user".to_string(),
                PermissionSource::ModuleIncluded { module } => {
                    format!("included with module '{module}'")
                }
                PermissionSource::ModuleOptional { module } => {
                    format!("optional feature of module '{module}' enabled for the user")
                }
            };
            return PermissionExplanation {
                key: key.clone(),
                granted: true,
                source: Some(source.clone()),
                reason,
            };
        }

        let reason = match self.dropped.iter().rev().find(|d| &d.key == key) {
            Some(d) => match &d.reason {
                DropReason::UnknownPermission => "permission is not in the catalog".to_string(),
                DropReason::UnknownModule { module } => {
                    format!("module '{module}' is not in the catalog")
                }
                DropReason::Expired => "the grant has expired".to_string(),
                DropReason::Revoked => "explicitly revoked for the user".to_string(),
                DropReason::NotFoundation => {
                    "only available through a module, not as a direct grant".to_string()
                }
                DropReason::ModuleInactive { module } => {
                    format!("module '{module}' is not active for the user and company")
                }
                DropReason::MissingDependency { missing } => format!(
                    "required permissions are not granted: {}",
                    missing
                        .iter()
                        .map(PermissionKey::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
            None => "not granted by role, grant or module".to_string(),
        };

        PermissionExplanation {
            key: key.clone(),
            granted: false,
            source: None,
            reason,
        }
    }
}

impl GrantedSet for EffectivePermissionSet {
    fn has(&self, key: &PermissionKey) -> bool {
        self.contains(key)
    }
}

/// Computes [`EffectivePermissionSet`]s. Pure apart from provisioning reads.
#[derive(Debug, Clone, Copy)]
pub struct PermissionResolver<'c> {
    catalog: &'c Catalog,
    super_admin_bypasses_provisioning: bool,
}

struct Working {
    permissions: BTreeMap<PermissionKey, PermissionSource>,
    dropped: Vec<DroppedPermission>,
}

impl Working {
    fn add(&mut self, key: &PermissionKey, source: PermissionSource) {
        self.permissions.entry(key.clone()).or_insert(source);
    }

    fn drop_key(&mut self, key: &PermissionKey, reason: DropReason) {
        self.dropped.push(DroppedPermission {
            key: key.clone(),
            reason,
        });
    }
}

impl<'c> PermissionResolver<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            super_admin_bypasses_provisioning: false,
        }
    }

    /// Let super-admin role defaults include modules the company has not provisioned.
    pub fn with_super_admin_bypass(mut self, bypass: bool) -> Self {
        self.super_admin_bypasses_provisioning = bypass;
        self
    }

    pub fn resolve<P>(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        role: Role,
        grants: &UserGrants,
        provisioning: &P,
        now: DateTime<Utc>,
    ) -> AccessResult<EffectivePermissionSet>
    where
        P: ProvisioningLookup + ?Sized,
    {
        let mut provisioned: HashMap<ModuleId, bool> = HashMap::new();
        let mut is_provisioned = |module: &ModuleId| -> AccessResult<bool> {
            if let Some(active) = provisioned.get(module) {
                return Ok(*active);
            }
            let active = provisioning.is_active(company_id, module)?;
            provisioned.insert(module.clone(), active);
            Ok(active)
        };

        let mut w = Working {
            permissions: BTreeMap::new(),
            dropped: Vec::new(),
        };

        // 1. role defaults
        for key in self.catalog.role_defaults().for_role(role) {
            if self.catalog.has_permission(key) {
                w.add(key, PermissionSource::Role);
            } else {
                tracing::warn!(%user_id, %company_id, %key, "role default references unknown permission");
                w.drop_key(key, DropReason::UnknownPermission);
            }
        }
        if role == Role::SuperAdmin {
            for module in self.catalog.modules() {
                if !self.super_admin_bypasses_provisioning && !is_provisioned(&module.id)? {
                    continue;
                }
                for key in &module.included_permissions {
                    w.add(key, PermissionSource::Role);
                }
                for feature in &module.optional_sub_features {
                    w.add(&feature.key, PermissionSource::Role);
                }
            }
        }

        // 2. explicit data grants
        let mut data: Vec<_> = grants.data.iter().collect();
        data.sort_by(|a, b| a.key.cmp(&b.key));
        for grant in data {
            let key = &grant.key;
            let Ok(permission) = self.catalog.get_permission(key) else {
                tracing::warn!(%user_id, %company_id, %key, "data grant references unknown permission");
                w.drop_key(key, DropReason::UnknownPermission);
                continue;
            };
            if grant.is_expired(now) {
                tracing::debug!(%user_id, %company_id, %key, "ignoring expired data grant");
                w.drop_key(key, DropReason::Expired);
                continue;
            }
            if !permission.is_foundation {
                tracing::warn!(%user_id, %company_id, %key, "ignoring data grant on module permission");
                w.drop_key(key, DropReason::NotFoundation);
                continue;
            }
            if grant.is_granted {
                w.add(key, PermissionSource::DataGrant);
            } else if w.permissions.remove(key).is_some() {
                w.drop_key(key, DropReason::Revoked);
            }
        }

        // 3. module-included permissions
        let mut active_modules: BTreeSet<ModuleId> = BTreeSet::new();
        let mut modules: Vec<_> = grants.modules.iter().collect();
        modules.sort_by(|a, b| a.module_id.cmp(&b.module_id));
        for grant in modules {
            let module_id = &grant.module_id;
            let Ok(module) = self.catalog.get_module(module_id) else {
                tracing::warn!(%user_id, %company_id, %module_id, "module grant references unknown module");
                continue;
            };
            if !grant.is_live(now) {
                if grant.is_enabled {
                    tracing::debug!(%user_id, %company_id, %module_id, "ignoring expired module grant");
                    for key in &module.included_permissions {
                        w.drop_key(key, DropReason::Expired);
                    }
                }
                continue;
            }
            if !is_provisioned(module_id)? {
                tracing::debug!(%user_id, %company_id, %module_id, "module not provisioned for company");
                for key in &module.included_permissions {
                    w.drop_key(
                        key,
                        DropReason::ModuleInactive {
                            module: module_id.clone(),
                        },
                    );
                }
                continue;
            }
            active_modules.insert(module_id.clone());
            for key in &module.included_permissions {
                w.add(
                    key,
                    PermissionSource::ModuleIncluded {
                        module: module_id.clone(),
                    },
                );
            }
        }

        // 4. optional sub-features
        let mut optional: Vec<_> = grants.module_permissions.iter().collect();
        optional.sort_by(|a, b| (&a.module_id, &a.key).cmp(&(&b.module_id, &b.key)));
        for grant in optional {
            let (module_id, key) = (&grant.module_id, &grant.key);
            let offered = self
                .catalog
                .get_module(module_id)
                .map(|m| m.offers_sub_feature(key))
                .unwrap_or(false);
            if !offered {
                tracing::warn!(%user_id, %company_id, %module_id, %key, "sub-feature grant not offered by catalog");
                w.drop_key(
                    key,
                    DropReason::UnknownModule {
                        module: module_id.clone(),
                    },
                );
                continue;
            }
            if !grant.is_granted {
                continue;
            }
            if grant.is_expired(now) {
                w.drop_key(key, DropReason::Expired);
                continue;
            }
            if !active_modules.contains(module_id) {
                w.drop_key(
                    key,
                    DropReason::ModuleInactive {
                        module: module_id.clone(),
                    },
                );
                continue;
            }
            w.add(
                key,
                PermissionSource::ModuleOptional {
                    module: module_id.clone(),
                },
            );
        }

        // 5. dependency pruning against the pre-pruning set; a kept key's closure
        // is entirely present, so every member of it is kept as well.
        let deps = DependencyResolver::new(self.catalog);
        let candidate: BTreeSet<PermissionKey> = w.permissions.keys().cloned().collect();
        let mut unmet = Vec::new();
        for key in &candidate {
            let missing: BTreeSet<PermissionKey> = deps
                .required_closure(key)?
                .into_iter()
                .filter(|k| !candidate.contains(k))
                .collect();
            if !missing.is_empty() {
                unmet.push((key.clone(), missing));
            }
        }
        for (key, missing) in unmet {
            tracing::debug!(%user_id, %company_id, %key, ?missing, "dropping permission with unmet dependencies");
            w.permissions.remove(&key);
            w.drop_key(&key, DropReason::MissingDependency { missing });
        }

        Ok(EffectivePermissionSet {
            user_id,
            company_id,
            role,
            resolved_at: now,
            permissions: w.permissions,
            dropped: w.dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Duration;
    use proptest::prelude::*;

    use super::*;
    use crate::catalog::{CatalogDefinition, Module, ModuleTier, Permission, PermissionGroup};
    use crate::grants::{DataPermissionGrant, ModuleGrant, ModulePermissionGrant};
    use crate::roles::RoleDefaults;

    struct Provisioned(BTreeMap<ModuleId, bool>);

    impl Provisioned {
        fn none() -> Self {
            Self(BTreeMap::new())
        }

        fn with(modules: &[&'static str]) -> Self {
            Self(modules.iter().map(|m| (ModuleId::from(*m), true)).collect())
        }
    }

    impl ProvisioningLookup for Provisioned {
        fn is_active(&self, _company_id: CompanyId, module: &ModuleId) -> AccessResult<bool> {
            Ok(self.0.get(module).copied().unwrap_or(false))
        }
    }

    fn catalog() -> Catalog {
        Catalog::from_definition(CatalogDefinition {
            permissions: vec![
                Permission::foundation("dashboard.view", "Dashboard", PermissionGroup::Dashboard),
                Permission::foundation("expenses.view", "View", PermissionGroup::Expenses),
                Permission::foundation("reports.view", "Reports", PermissionGroup::Reports),
                Permission::premium("expenses.approve", "Approve", PermissionGroup::Approvals)
                    .requires(["expenses.view"]),
                Permission::premium("approvals.workflows", "Workflows", PermissionGroup::Approvals)
                    .requires(["expenses.approve"]),
            ],
            modules: vec![
                Module::new("expenses-pro", "Pro", ModuleTier::Premium, "expenses")
                    .including(["expenses.approve"])
                    .optional("approvals.workflows", "Workflows"),
            ],
            role_defaults: RoleDefaults::new()
                .with(Role::User, [PermissionKey::from("dashboard.view")])
                .with(
                    Role::Admin,
                    ["dashboard.view", "expenses.view"].map(PermissionKey::from),
                ),
            templates: vec![],
        })
        .unwrap()
    }

    struct Fixture {
        user: UserId,
        company: CompanyId,
        actor: UserId,
        now: DateTime<Utc>,
        grants: UserGrants,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                user: UserId::new(),
                company: CompanyId::new(),
                actor: UserId::new(),
                now: Utc::now(),
                grants: UserGrants::default(),
            }
        }

        fn data(mut self, key: &'static str, granted: bool, expires_at: Option<DateTime<Utc>>) -> Self {
            self.grants.data.push(DataPermissionGrant {
                user_id: self.user,
                company_id: self.company,
                key: PermissionKey::from(key),
                is_granted: granted,
                granted_by: self.actor,
                granted_at: self.now,
                expires_at,
            });
            self
        }

        fn module(mut self, id: &'static str, enabled: bool, expires_at: Option<DateTime<Utc>>) -> Self {
            self.grants.modules.push(ModuleGrant {
                user_id: self.user,
                company_id: self.company,
                module_id: ModuleId::from(id),
                is_enabled: enabled,
                granted_by: self.actor,
                granted_at: self.now,
                expires_at,
            });
            self
        }

        fn optional(mut self, module: &'static str, key: &'static str) -> Self {
            self.grants.module_permissions.push(ModulePermissionGrant {
                user_id: self.user,
                company_id: self.company,
                module_id: ModuleId::from(module),
                key: PermissionKey::from(key),
                is_granted: true,
                granted_by: self.actor,
                granted_at: self.now,
                expires_at: None,
            });
            self
        }

        fn resolve(&self, role: Role, provisioning: &Provisioned) -> EffectivePermissionSet {
            self.resolve_at(role, provisioning, self.now)
        }

        fn resolve_at(&self, role: Role, provisioning: &Provisioned, now: DateTime<Utc>) -> EffectivePermissionSet {
            let catalog = catalog();
            PermissionResolver::new(&catalog)
                .resolve(self.user, self.company, role, &self.grants, provisioning, now)
                .unwrap()
        }
    }

    fn keys(set: &EffectivePermissionSet) -> Vec<&str> {
        set.keys().map(PermissionKey::as_str).collect()
    }

    #[test]
    fn role_defaults_only() {
        let set = Fixture::new().resolve(Role::User, &Provisioned::none());
        assert_eq!(keys(&set), vec!["dashboard.view"]);
        assert_eq!(
            set.source_of(&PermissionKey::from("dashboard.view")),
            Some(&PermissionSource::Role)
        );
    }

    #[test]
    fn explicit_revoke_beats_role_default() {
        let set = Fixture::new()
            .data("dashboard.view", false, None)
            .resolve(Role::User, &Provisioned::none());
        assert!(set.is_empty());
        assert!(!set.explain(&PermissionKey::from("dashboard.view")).granted);
    }

    #[test]
    fn expired_revoke_leaves_role_default_in_place() {
        let f = Fixture::new();
        let past = f.now - Duration::hours(1);
        let set = f
            .data("dashboard.view", false, Some(past))
            .resolve(Role::User, &Provisioned::none());
        assert!(set.contains(&PermissionKey::from("dashboard.view")));
    }

    #[test]
    fn unprovisioned_module_contributes_nothing() {
        let f = Fixture::new()
            .data("expenses.view", true, None)
            .module("expenses-pro", true, None);

        let off = f.resolve(Role::User, &Provisioned::none());
        assert_eq!(keys(&off), vec!["dashboard.view", "expenses.view"]);
        assert!(off.dropped().iter().any(|d| d.reason
            == DropReason::ModuleInactive {
                module: ModuleId::from("expenses-pro")
            }));

        let on = f.resolve(Role::User, &Provisioned::with(&["expenses-pro"]));
        assert_eq!(keys(&on), vec!["dashboard.view", "expenses.approve", "expenses.view"]);
        assert_eq!(
            on.source_of(&PermissionKey::from("expenses.approve")),
            Some(&PermissionSource::ModuleIncluded {
                module: ModuleId::from("expenses-pro")
            })
        );
    }

    #[test]
    fn module_permissions_need_their_prerequisites() {
        let set = Fixture::new()
            .module("expenses-pro", true, None)
            .resolve(Role::User, &Provisioned::with(&["expenses-pro"]));
        assert!(!set.contains(&PermissionKey::from("expenses.approve")));
        let why = set.explain(&PermissionKey::from("expenses.approve"));
        assert!(why.reason.contains("expenses.view"));
    }

    #[test]
    fn optional_feature_requires_active_module() {
        let f = Fixture::new()
            .data("expenses.view", true, None)
            .optional("expenses-pro", "approvals.workflows");
        let set = f.resolve(Role::User, &Provisioned::with(&["expenses-pro"]));
        assert!(!set.contains(&PermissionKey::from("approvals.workflows")));

        let f = f.module("expenses-pro", true, None);
        let set = f.resolve(Role::User, &Provisioned::with(&["expenses-pro"]));
        assert_eq!(
            set.source_of(&PermissionKey::from("approvals.workflows")),
            Some(&PermissionSource::ModuleOptional {
                module: ModuleId::from("expenses-pro")
            })
        );
    }

    #[test]
    fn data_grants_cannot_bypass_modules() {
        let set = Fixture::new()
            .data("expenses.view", true, None)
            .data("expenses.approve", true, None)
            .resolve(Role::User, &Provisioned::none());
        assert!(!set.contains(&PermissionKey::from("expenses.approve")));
    }

    #[test]
    fn unknown_keys_are_dropped_not_raised() {
        let set = Fixture::new()
            .data("retired.permission", true, None)
            .module("retired-module", true, None)
            .resolve(Role::User, &Provisioned::none());
        assert_eq!(keys(&set), vec!["dashboard.view"]);
        assert!(set.dropped().iter().any(|d| d.reason == DropReason::UnknownPermission));
    }

    #[test]
    fn expiry_changes_output_without_writes() {
        let f = Fixture::new();
        let expires = f.now + Duration::minutes(30);
        let f = f.data("reports.view", true, Some(expires));

        let before = f.resolve(Role::User, &Provisioned::none());
        assert!(before.contains(&PermissionKey::from("reports.view")));

        let after = f.resolve_at(Role::User, &Provisioned::none(), expires + Duration::seconds(1));
        assert!(!after.contains(&PermissionKey::from("reports.view")));
    }

    #[test]
    fn super_admin_gets_module_permissions_of_provisioned_modules() {
        // expenses.approve still needs expenses.view, which super-admins lack here
        let set = Fixture::new().resolve(Role::SuperAdmin, &Provisioned::with(&["expenses-pro"]));
        assert!(!set.contains(&PermissionKey::from("expenses.approve")));

        let catalog = catalog();
        let with_view = Fixture::new().data("expenses.view", true, None);
        let set = PermissionResolver::new(&catalog)
            .resolve(
                with_view.user,
                with_view.company,
                Role::SuperAdmin,
                &with_view.grants,
                &Provisioned::with(&["expenses-pro"]),
                with_view.now,
            )
            .unwrap();
        assert!(set.contains(&PermissionKey::from("expenses.approve")));
        assert!(set.contains(&PermissionKey::from("approvals.workflows")));

        let unprovisioned = PermissionResolver::new(&catalog)
            .resolve(
                with_view.user,
                with_view.company,
                Role::SuperAdmin,
                &with_view.grants,
                &Provisioned::none(),
                with_view.now,
            )
            .unwrap();
        assert!(!unprovisioned.contains(&PermissionKey::from("expenses.approve")));
    }

    #[test]
    fn first_source_wins_for_attribution() {
        let set = Fixture::new()
            .data("dashboard.view", true, None)
            .resolve(Role::User, &Provisioned::none());
        assert_eq!(
            set.source_of(&PermissionKey::from("dashboard.view")),
            Some(&PermissionSource::Role)
        );
    }

    const DATA_KEYS: [&str; 3] = ["dashboard.view", "expenses.view", "reports.view"];

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Every effective key has its whole requirement chain effective too.
        #[test]
        fn resolved_sets_are_dependency_closed(
            data in prop::collection::vec((0usize..3, any::<bool>()), 0..6),
            module_enabled in any::<bool>(),
            provisioned in any::<bool>(),
            with_optional in any::<bool>(),
            admin in any::<bool>(),
        ) {
            let mut f = Fixture::new();
            for (idx, granted) in data {
                f = f.data(DATA_KEYS[idx], granted, None);
            }
            f = f.module("expenses-pro", module_enabled, None);
            if with_optional {
                f = f.optional("expenses-pro", "approvals.workflows");
            }
            let lookup = if provisioned { Provisioned::with(&["expenses-pro"]) } else { Provisioned::none() };
            let role = if admin { Role::Admin } else { Role::User };
            let set = f.resolve(role, &lookup);

            let catalog = catalog();
            let deps = DependencyResolver::new(&catalog);
            for key in set.keys() {
                for required in deps.required_closure(key).unwrap() {
                    prop_assert!(set.contains(&required), "{key} kept without {required}");
                }
            }
        }

        /// Provisioning is a hard gate regardless of per-user grant state.
        #[test]
        fn unprovisioned_modules_never_leak(
            module_enabled in any::<bool>(),
            with_optional in any::<bool>(),
            direct in any::<bool>(),
        ) {
            let mut f = Fixture::new()
                .data("expenses.view", true, None)
                .module("expenses-pro", module_enabled, None);
            if with_optional {
                f = f.optional("expenses-pro", "approvals.workflows");
            }
            if direct {
                f = f.data("expenses.approve", true, None);
            }
            let set = f.resolve(Role::User, &Provisioned::none());
            prop_assert!(!set.contains(&PermissionKey::from("expenses.approve")));
            prop_assert!(!set.contains(&PermissionKey::from("approvals.workflows")));
        }

        /// An unexpired explicit revoke always removes a role default.
        #[test]
        fn explicit_revoke_always_wins(minutes_left in 1i64..10_000, admin in any::<bool>()) {
            let f = Fixture::new();
            let expires = f.now + Duration::minutes(minutes_left);
            let role = if admin { Role::Admin } else { Role::User };
            let set = f
                .data("dashboard.view", false, Some(expires))
                .resolve(role, &Provisioned::none());
            prop_assert!(!set.contains(&PermissionKey::from("dashboard.view")));
        }
    }
}
