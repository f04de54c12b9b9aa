//! Permission and module dependency validation.

use std::collections::{BTreeSet, HashSet};

use permgate_core::{AccessError, AccessResult, CompanyId, ModuleId, PermissionKey};

use crate::catalog::Catalog;
use crate::provisioning::ProvisioningLookup;

/// Validates `requires_permissions` / `requires_modules` chains against a
/// candidate state.
///
/// The catalog graph is acyclic by construction; walks still carry a visited
/// set and abort with [`AccessError::CatalogInvariantViolation`] if a node is
/// re-entered on the current path.
#[derive(Debug, Clone, Copy)]
pub struct DependencyResolver<'c> {
    catalog: &'c Catalog,
}

impl<'c> DependencyResolver<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }

    /// Every permission `target` transitively requires (excluding `target`).
    ///
    /// Unknown keys contribute nothing.
    pub fn required_closure(&self, target: &PermissionKey) -> AccessResult<BTreeSet<PermissionKey>> {
        let mut closure = BTreeSet::new();
        let mut path = Vec::new();
        self.walk(target, &mut path, &mut closure)?;
        closure.remove(target);
        Ok(closure)
    }

    fn walk(
        &self,
        key: &PermissionKey,
        path: &mut Vec<PermissionKey>,
        closure: &mut BTreeSet<PermissionKey>,
    ) -> AccessResult<()> {
        if path.contains(key) {
            return Err(AccessError::catalog_invariant(format!(
                "permission dependency cycle through '{key}'"
            )));
        }
        let Ok(permission) = self.catalog.get_permission(key) else {
            return Ok(());
        };

        path.push(key.clone());
        for dep in &permission.requires_permissions {
            if closure.insert(dep.clone()) {
                self.walk(dep, path, closure)?;
            } else if path.contains(dep) {
                return Err(AccessError::catalog_invariant(format!(
                    "permission dependency cycle through '{dep}'"
                )));
            }
        }
        path.pop();
        Ok(())
    }

    /// Check that granting `target` on top of `candidate` leaves no unmet
    /// requirement anywhere in its chain.
    pub fn validate_permission_grant<S>(&self, candidate: &S, target: &PermissionKey) -> AccessResult<()>
    where
        S: GrantedSet + ?Sized,
    {
        let missing: BTreeSet<PermissionKey> = self
            .required_closure(target)?
            .into_iter()
            .filter(|k| !candidate.has(k))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AccessError::MissingDependency {
                target: target.clone(),
                missing,
            })
        }
    }

    /// Check that `module` is provisioned for the company and every module it
    /// transitively requires is active there too.
    pub fn validate_module_enable<P>(
        &self,
        provisioning: &P,
        company_id: CompanyId,
        module: &ModuleId,
    ) -> AccessResult<()>
    where
        P: ProvisioningLookup + ?Sized,
    {
        self.catalog.get_module(module)?;
        if !provisioning.is_active(company_id, module)? {
            return Err(AccessError::NotProvisioned(module.clone()));
        }

        let missing: BTreeSet<ModuleId> = self
            .required_modules(module)?
            .into_iter()
            .map(|m| provisioning.is_active(company_id, &m).map(|active| (m, active)))
            .collect::<AccessResult<Vec<_>>>()?
            .into_iter()
            .filter_map(|(m, active)| (!active).then_some(m))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AccessError::ModuleDependencyUnmet {
                module: module.clone(),
                missing,
            })
        }
    }

    /// Every module `module` transitively requires (excluding `module`).
    pub fn required_modules(&self, module: &ModuleId) -> AccessResult<BTreeSet<ModuleId>> {
        let mut out = BTreeSet::new();
        let mut stack = vec![module.clone()];
        let mut visited: HashSet<ModuleId> = HashSet::new();

        while let Some(id) = stack.pop() {
            let m = self.catalog.get_module(&id)?;
            for dep in &m.requires_modules {
                if dep == module {
                    return Err(AccessError::catalog_invariant(format!(
                        "module dependency cycle through '{module}'"
                    )));
                }
                if visited.insert(dep.clone()) {
                    out.insert(dep.clone());
                    stack.push(dep.clone());
                }
            }
        }

        Ok(out)
    }
}

/// Anything that can answer "is this key currently granted?".
pub trait GrantedSet {
    fn has(&self, key: &PermissionKey) -> bool;
}

impl GrantedSet for BTreeSet<PermissionKey> {
    fn has(&self, key: &PermissionKey) -> bool {
        self.contains(key)
    }
}

impl GrantedSet for HashSet<PermissionKey> {
    fn has(&self, key: &PermissionKey) -> bool {
        self.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::catalog::{CatalogDefinition, Module, ModuleTier, Permission, PermissionGroup};

    fn catalog() -> Catalog {
        Catalog::from_definition(CatalogDefinition {
            permissions: vec![
                Permission::foundation("expenses.view", "View", PermissionGroup::Expenses),
                Permission::foundation("expenses.create", "Create", PermissionGroup::Expenses)
                    .requires(["expenses.view"]),
                Permission::premium("expenses.approve", "Approve", PermissionGroup::Approvals)
                    .requires(["expenses.create"]),
            ],
            modules: vec![
                Module::new("base", "Base", ModuleTier::Core, "core"),
                Module::new("pro", "Pro", ModuleTier::Premium, "expenses")
                    .including(["expenses.approve"])
                    .requires(["base"]),
                Module::new("ai", "AI", ModuleTier::Premium, "automation").requires(["pro"]),
            ],
            ..Default::default()
        })
        .unwrap()
    }

    struct Active(BTreeMap<ModuleId, bool>);

    impl ProvisioningLookup for Active {
        fn is_active(&self, _company_id: CompanyId, module: &ModuleId) -> AccessResult<bool> {
            Ok(self.0.get(module).copied().unwrap_or(false))
        }
    }

    fn keys(items: &[&'static str]) -> BTreeSet<PermissionKey> {
        items.iter().map(|k| PermissionKey::from(*k)).collect()
    }

    #[test]
    fn transitive_requirements_are_collected() {
        let catalog = catalog();
        let resolver = DependencyResolver::new(&catalog);
        let closure = resolver
            .required_closure(&PermissionKey::from("expenses.approve"))
            .unwrap();
        assert_eq!(closure, keys(&["expenses.create", "expenses.view"]));
    }

    #[test]
    fn grant_with_full_chain_passes() {
        let catalog = catalog();
        let resolver = DependencyResolver::new(&catalog);
        let candidate = keys(&["expenses.view", "expenses.create"]);
        assert!(
            resolver
                .validate_permission_grant(&candidate, &PermissionKey::from("expenses.approve"))
                .is_ok()
        );
    }

    #[test]
    fn grant_reports_every_missing_link() {
        let catalog = catalog();
        let resolver = DependencyResolver::new(&catalog);
        let err = resolver
            .validate_permission_grant(&BTreeSet::new(), &PermissionKey::from("expenses.approve"))
            .unwrap_err();
        assert_eq!(
            err,
            AccessError::MissingDependency {
                target: PermissionKey::from("expenses.approve"),
                missing: keys(&["expenses.create", "expenses.view"]),
            }
        );
    }

    #[test]
    fn module_enable_requires_provisioning() {
        let catalog = catalog();
        let resolver = DependencyResolver::new(&catalog);
        let company = CompanyId::new();
        let lookup = Active(BTreeMap::new());
        let err = resolver
            .validate_module_enable(&lookup, company, &ModuleId::from("pro"))
            .unwrap_err();
        assert_eq!(err, AccessError::NotProvisioned(ModuleId::from("pro")));
    }

    #[test]
    fn module_enable_reports_transitive_unmet_modules() {
        let catalog = catalog();
        let resolver = DependencyResolver::new(&catalog);
        let company = CompanyId::new();
        let lookup = Active([(ModuleId::from("ai"), true)].into_iter().collect());
        let err = resolver
            .validate_module_enable(&lookup, company, &ModuleId::from("ai"))
            .unwrap_err();
        assert_eq!(
            err,
            AccessError::ModuleDependencyUnmet {
                module: ModuleId::from("ai"),
                missing: [ModuleId::from("base"), ModuleId::from("pro")].into(),
            }
        );
    }

    #[test]
    fn unknown_module_is_a_catalog_miss() {
        let catalog = catalog();
        let resolver = DependencyResolver::new(&catalog);
        let lookup = Active(BTreeMap::new());
        let err = resolver
            .validate_module_enable(&lookup, CompanyId::new(), &ModuleId::from("ghost"))
            .unwrap_err();
        assert_eq!(err.code(), "unknown_module");
    }
}
