//! Permission and module catalog.
//!
//! The catalog is immutable at runtime: it is loaded once, validated, and then
//! passed by reference to the resolvers. Changing it is a deployment concern
//! (see the infra crate's catalog cache for the swap hook).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use permgate_core::{AccessError, AccessResult, ModuleId, PermissionKey, TemplateId};

use crate::roles::{Role, RoleDefaults};

// ─────────────────────────────────────────────────────────────────────────────
// Definitions
// ─────────────────────────────────────────────────────────────────────────────

/// Functional group a permission belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionGroup {
    Dashboard,
    Expenses,
    Approvals,
    Reports,
    Users,
    Settings,
    Billing,
    Automation,
    Integrations,
    Compliance,
}

/// Catalog definition of a single permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub key: PermissionKey,
    pub name: String,
    pub group: PermissionGroup,
    /// Keys that must also be granted for this one to be effective.
    #[serde(default)]
    pub requires_permissions: BTreeSet<PermissionKey>,
    /// Free/basic permission, never tied to a paid module.
    #[serde(default)]
    pub is_foundation: bool,
    /// Only the system operator may grant or revoke it.
    #[serde(default)]
    pub is_system_only: bool,
}

impl Permission {
    pub fn foundation(key: &'static str, name: impl Into<String>, group: PermissionGroup) -> Self {
        Self {
            key: PermissionKey::from(key),
            name: name.into(),
            group,
            requires_permissions: BTreeSet::new(),
            is_foundation: true,
            is_system_only: false,
        }
    }

    /// A permission that only ever becomes active through a module.
    pub fn premium(key: &'static str, name: impl Into<String>, group: PermissionGroup) -> Self {
        Self {
            is_foundation: false,
            ..Self::foundation(key, name, group)
        }
    }

    pub fn requires(mut self, keys: impl IntoIterator<Item = &'static str>) -> Self {
        self.requires_permissions
            .extend(keys.into_iter().map(PermissionKey::from));
        self
    }

    pub fn system_only(mut self) -> Self {
        self.is_system_only = true;
        self
    }
}

/// Pricing tier of a module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleTier {
    Core,
    Standard,
    Premium,
}

/// Independently toggleable feature of an enabled module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubFeature {
    pub key: PermissionKey,
    pub name: String,
}

/// Catalog definition of a module.
///
/// Prices are in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    pub tier: ModuleTier,
    pub category: String,
    /// Granted implicitly and atomically whenever the module is enabled for a user.
    #[serde(default)]
    pub included_permissions: BTreeSet<PermissionKey>,
    #[serde(default)]
    pub optional_sub_features: Vec<SubFeature>,
    #[serde(default)]
    pub requires_modules: BTreeSet<ModuleId>,
    #[serde(default)]
    pub default_monthly_price: u64,
    #[serde(default)]
    pub default_per_user_price: u64,
    /// Per-user state may only be altered by the system operator.
    #[serde(default)]
    pub locked: bool,
}

impl Module {
    pub fn new(
        id: &'static str,
        name: impl Into<String>,
        tier: ModuleTier,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: ModuleId::from(id),
            name: name.into(),
            tier,
            category: category.into(),
            included_permissions: BTreeSet::new(),
            optional_sub_features: Vec::new(),
            requires_modules: BTreeSet::new(),
            default_monthly_price: 0,
            default_per_user_price: 0,
            locked: false,
        }
    }

    pub fn including(mut self, keys: impl IntoIterator<Item = &'static str>) -> Self {
        self.included_permissions
            .extend(keys.into_iter().map(PermissionKey::from));
        self
    }

    pub fn optional(mut self, key: &'static str, name: impl Into<String>) -> Self {
        self.optional_sub_features.push(SubFeature {
            key: PermissionKey::from(key),
            name: name.into(),
        });
        self
    }

    pub fn requires(mut self, modules: impl IntoIterator<Item = &'static str>) -> Self {
        self.requires_modules
            .extend(modules.into_iter().map(ModuleId::from));
        self
    }

    pub fn priced(mut self, monthly: u64, per_user: u64) -> Self {
        self.default_monthly_price = monthly;
        self.default_per_user_price = per_user;
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    pub fn offers_sub_feature(&self, key: &PermissionKey) -> bool {
        self.optional_sub_features.iter().any(|f| &f.key == key)
    }
}

/// Named, role-targeted bundle of data permissions and modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTemplate {
    pub id: TemplateId,
    pub name: String,
    pub target_role: Role,
    #[serde(default)]
    pub data_permissions: BTreeSet<PermissionKey>,
    #[serde(default)]
    pub modules: BTreeSet<ModuleId>,
}

/// Serialized catalog document, as loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDefinition {
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub role_defaults: RoleDefaults,
    #[serde(default)]
    pub templates: Vec<PermissionTemplate>,
}

/// Optional filters for [`Catalog::list_modules`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleFilter {
    pub tier: Option<ModuleTier>,
    pub category: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Validated, indexed catalog.
///
/// # Invariants
/// - Every referenced permission, module and template exists.
/// - Permission and module dependency graphs are acyclic.
/// - Module-included permissions are never foundation permissions.
#[derive(Debug, Clone)]
pub struct Catalog {
    permissions: HashMap<PermissionKey, Permission>,
    modules: BTreeMap<ModuleId, Module>,
    role_defaults: RoleDefaults,
    templates: HashMap<TemplateId, PermissionTemplate>,
    /// Reverse index: permission → modules including it.
    included_by: HashMap<PermissionKey, BTreeSet<ModuleId>>,
    /// Reverse index: module → modules that directly require it.
    required_by: HashMap<ModuleId, BTreeSet<ModuleId>>,
}

impl Catalog {
    /// Validate and index a catalog document.
    pub fn from_definition(def: CatalogDefinition) -> AccessResult<Self> {
        let mut permissions = HashMap::with_capacity(def.permissions.len());
        for p in def.permissions {
            let key = p.key.clone();
            if permissions.insert(key.clone(), p).is_some() {
                return Err(AccessError::catalog_invariant(format!(
                    "duplicate permission key '{key}'"
                )));
            }
        }

        let mut modules = BTreeMap::new();
        for m in def.modules {
            let id = m.id.clone();
            if modules.insert(id.clone(), m).is_some() {
                return Err(AccessError::catalog_invariant(format!(
                    "duplicate module id '{id}'"
                )));
            }
        }

        let mut templates = HashMap::with_capacity(def.templates.len());
        for t in def.templates {
            let id = t.id.clone();
            if templates.insert(id.clone(), t).is_some() {
                return Err(AccessError::catalog_invariant(format!(
                    "duplicate template id '{id}'"
                )));
            }
        }

        let mut included_by: HashMap<PermissionKey, BTreeSet<ModuleId>> = HashMap::new();
        let mut required_by: HashMap<ModuleId, BTreeSet<ModuleId>> = HashMap::new();

        for p in permissions.values() {
            for dep in &p.requires_permissions {
                if !permissions.contains_key(dep) {
                    return Err(AccessError::catalog_invariant(format!(
                        "permission '{}' requires unknown permission '{dep}'",
                        p.key
                    )));
                }
            }
        }

        for m in modules.values() {
            for key in &m.included_permissions {
                let Some(p) = permissions.get(key) else {
                    return Err(AccessError::catalog_invariant(format!(
                        "module '{}' includes unknown permission '{key}'",
                        m.id
                    )));
                };
                if p.is_foundation {
                    return Err(AccessError::catalog_invariant(format!(
                        "module '{}' includes foundation permission '{key}'",
                        m.id
                    )));
                }
                included_by.entry(key.clone()).or_default().insert(m.id.clone());
            }
            for feature in &m.optional_sub_features {
                let Some(p) = permissions.get(&feature.key) else {
                    return Err(AccessError::catalog_invariant(format!(
                        "module '{}' offers unknown sub-feature '{}'",
                        m.id, feature.key
                    )));
                };
                if p.is_foundation {
                    return Err(AccessError::catalog_invariant(format!(
                        "module '{}' offers foundation permission '{}' as a sub-feature",
                        m.id, feature.key
                    )));
                }
            }
            for dep in &m.requires_modules {
                if !modules.contains_key(dep) {
                    return Err(AccessError::catalog_invariant(format!(
                        "module '{}' requires unknown module '{dep}'",
                        m.id
                    )));
                }
                required_by.entry(dep.clone()).or_default().insert(m.id.clone());
            }
        }

        // Role defaults and template data keys bypass provisioning, so they
        // must be foundation permissions.
        let is_foundation = |k: &PermissionKey| permissions.get(k).map(|p| p.is_foundation);

        for (role, keys) in def.role_defaults.iter() {
            for key in keys {
                match is_foundation(key) {
                    None => {
                        return Err(AccessError::catalog_invariant(format!(
                            "role '{role}' defaults to unknown permission '{key}'"
                        )));
                    }
                    Some(false) => {
                        return Err(AccessError::catalog_invariant(format!(
                            "role '{role}' defaults to non-foundation permission '{key}'"
                        )));
                    }
                    Some(true) => {}
                }
            }
        }

        for t in templates.values() {
            for key in &t.data_permissions {
                match is_foundation(key) {
                    None => {
                        return Err(AccessError::catalog_invariant(format!(
                            "template '{}' references unknown permission '{key}'",
                            t.id
                        )));
                    }
                    Some(false) => {
                        return Err(AccessError::catalog_invariant(format!(
                            "template '{}' lists non-foundation permission '{key}' as a data grant",
                            t.id
                        )));
                    }
                    Some(true) => {}
                }
            }
            if let Some(id) = t.modules.iter().find(|m| !modules.contains_key(*m)) {
                return Err(AccessError::catalog_invariant(format!(
                    "template '{}' references unknown module '{id}'",
                    t.id
                )));
            }
        }

        detect_cycle(permissions.keys(), |k| {
            permissions
                .get(k)
                .map(|p| p.requires_permissions.iter().cloned().collect())
                .unwrap_or_default()
        })
        .map_err(|path| {
            AccessError::catalog_invariant(format!("permission dependency cycle: {}", path.join(" -> ")))
        })?;

        detect_cycle(modules.keys(), |id| {
            modules
                .get(id)
                .map(|m| m.requires_modules.iter().cloned().collect())
                .unwrap_or_default()
        })
        .map_err(|path| {
            AccessError::catalog_invariant(format!("module dependency cycle: {}", path.join(" -> ")))
        })?;

        tracing::debug!(
            permissions = permissions.len(),
            modules = modules.len(),
            templates = templates.len(),
            "catalog loaded"
        );

        Ok(Self {
            permissions,
            modules,
            role_defaults: def.role_defaults,
            templates,
            included_by,
            required_by,
        })
    }

    pub fn get_permission(&self, key: &PermissionKey) -> AccessResult<&Permission> {
        self.permissions
            .get(key)
            .ok_or_else(|| AccessError::UnknownPermission(key.clone()))
    }

    pub fn get_module(&self, id: &ModuleId) -> AccessResult<&Module> {
        self.modules
            .get(id)
            .ok_or_else(|| AccessError::UnknownModule(id.clone()))
    }

    pub fn get_template(&self, id: &TemplateId) -> AccessResult<&PermissionTemplate> {
        self.templates
            .get(id)
            .ok_or_else(|| AccessError::UnknownTemplate(id.clone()))
    }

    pub fn has_permission(&self, key: &PermissionKey) -> bool {
        self.permissions.contains_key(key)
    }

    /// Modules matching the filter, ordered by id.
    pub fn list_modules(&self, filter: &ModuleFilter) -> Vec<&Module> {
        self.modules
            .values()
            .filter(|m| filter.tier.is_none_or(|t| m.tier == t))
            .filter(|m| filter.category.as_deref().is_none_or(|c| m.category == c))
            .collect()
    }

    /// Permissions, optionally restricted to one group, ordered by key.
    pub fn list_permissions(&self, group: Option<PermissionGroup>) -> Vec<&Permission> {
        let mut out: Vec<&Permission> = self
            .permissions
            .values()
            .filter(|p| group.is_none_or(|g| p.group == g))
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn templates(&self) -> impl Iterator<Item = &PermissionTemplate> {
        self.templates.values()
    }

    pub fn role_defaults(&self) -> &RoleDefaults {
        &self.role_defaults
    }

    /// Modules whose `included_permissions` contain `key`.
    pub fn modules_including<'a>(
        &'a self,
        key: &PermissionKey,
    ) -> impl Iterator<Item = &'a ModuleId> + use<'a> {
        self.included_by.get(key).into_iter().flatten()
    }

    /// Modules that directly require `module`.
    pub fn dependents_of<'a>(
        &'a self,
        module: &ModuleId,
    ) -> impl Iterator<Item = &'a ModuleId> + use<'a> {
        self.required_by.get(module).into_iter().flatten()
    }

    /// Every module that requires `module`, directly or transitively, ordered
    /// deepest dependents first (safe disable order).
    pub fn transitive_dependents(&self, module: &ModuleId) -> Vec<ModuleId> {
        fn visit(
            catalog: &Catalog,
            id: &ModuleId,
            seen: &mut BTreeSet<ModuleId>,
            out: &mut Vec<ModuleId>,
        ) {
            for dep in catalog.dependents_of(id) {
                if seen.insert(dep.clone()) {
                    visit(catalog, dep, seen, out);
                    out.push(dep.clone());
                }
            }
        }

        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        visit(self, module, &mut seen, &mut out);
        out
    }

    /// `keys` reordered so each comes after every other member of `keys` it
    /// requires, directly or through keys outside the set.
    pub fn permission_order<'k>(
        &self,
        keys: impl IntoIterator<Item = &'k PermissionKey>,
    ) -> Vec<PermissionKey> {
        dependency_order(keys, |k| {
            self.permissions
                .get(k)
                .map(|p| p.requires_permissions.iter().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// `modules` reordered so each comes after the members it requires
    /// (safe enable order). Reverse it for a safe disable order.
    pub fn module_order<'m>(&self, modules: impl IntoIterator<Item = &'m ModuleId>) -> Vec<ModuleId> {
        dependency_order(modules, |id| {
            self.modules
                .get(id)
                .map(|m| m.requires_modules.iter().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// Built-in catalog for the expense-management product.
    pub fn default_catalog() -> AccessResult<Self> {
        Self::from_definition(default_definition())
    }
}

/// Depth-first cycle detection over string-keyed graphs.
///
/// Returns the offending path when a back edge is found.
fn detect_cycle<'a, K, I, F>(nodes: I, edges: F) -> Result<(), Vec<String>>
where
    K: Clone + Ord + core::fmt::Display + 'a,
    I: Iterator<Item = &'a K>,
    F: Fn(&K) -> Vec<K>,
{
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        InProgress,
        Done,
    }

    fn visit<K, F>(
        node: &K,
        edges: &F,
        marks: &mut BTreeMap<K, Mark>,
        stack: &mut Vec<K>,
    ) -> Result<(), Vec<String>>
    where
        K: Clone + Ord + core::fmt::Display,
        F: Fn(&K) -> Vec<K>,
    {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = stack.iter().position(|k| k == node).unwrap_or(0);
                let mut path: Vec<String> = stack[start..].iter().map(ToString::to_string).collect();
                path.push(node.to_string());
                return Err(path);
            }
            None => {}
        }

        marks.insert(node.clone(), Mark::InProgress);
        stack.push(node.clone());
        for next in edges(node) {
            visit(&next, edges, marks, stack)?;
        }
        stack.pop();
        marks.insert(node.clone(), Mark::Done);
        Ok(())
    }

    let mut marks = BTreeMap::new();
    let mut stack = Vec::new();
    let mut roots: Vec<&K> = nodes.collect();
    roots.sort();
    for node in roots {
        visit(node, &edges, &mut marks, &mut stack)?;
    }
    Ok(())
}

/// Depth-first post-order over `edges`, restricted to `members` in the output.
///
/// Unknown members have no edges and keep their relative order. Assumes an
/// acyclic graph, which [`Catalog::from_definition`] guarantees.
fn dependency_order<'a, K, I, F>(members: I, edges: F) -> Vec<K>
where
    K: Clone + Ord + 'a,
    I: IntoIterator<Item = &'a K>,
    F: Fn(&K) -> Vec<K>,
{
    fn visit<K, F>(node: &K, edges: &F, members: &BTreeSet<K>, seen: &mut BTreeSet<K>, out: &mut Vec<K>)
    where
        K: Clone + Ord,
        F: Fn(&K) -> Vec<K>,
    {
        if !seen.insert(node.clone()) {
            return;
        }
        for next in edges(node) {
            visit(&next, edges, members, seen, out);
        }
        if members.contains(node) {
            out.push(node.clone());
        }
    }

    let roots: Vec<&K> = members.into_iter().collect();
    let set: BTreeSet<K> = roots.iter().map(|k| (*k).clone()).collect();
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(set.len());
    for node in roots {
        visit(node, &edges, &set, &mut seen, &mut out);
    }
    out
}

fn default_definition() -> CatalogDefinition {
    use PermissionGroup as G;

    let permissions = vec![
        Permission::foundation("dashboard.view", "View dashboard", G::Dashboard),
        Permission::foundation("expenses.view", "View expenses", G::Expenses),
        Permission::foundation("expenses.create", "Submit expenses", G::Expenses)
            .requires(["expenses.view"]),
        Permission::foundation("expenses.edit", "Edit any expense", G::Expenses)
            .requires(["expenses.view"]),
        Permission::foundation("reports.view", "View reports", G::Reports),
        Permission::foundation("users.view", "View users", G::Users),
        Permission::foundation("users.manage", "Manage users", G::Users).requires(["users.view"]),
        Permission::foundation("settings.view", "View company settings", G::Settings),
        Permission::foundation("settings.manage", "Manage company settings", G::Settings)
            .requires(["settings.view"]),
        Permission::foundation("billing.manage", "Manage billing", G::Billing).system_only(),
        Permission::premium("expenses.approve", "Approve expenses", G::Approvals)
            .requires(["expenses.view"]),
        Permission::premium("expenses.export", "Export expenses", G::Expenses)
            .requires(["expenses.view"]),
        Permission::premium("approvals.workflows", "Multi-step approval workflows", G::Approvals)
            .requires(["expenses.approve"]),
        Permission::premium("reports.advanced", "Advanced reporting", G::Reports)
            .requires(["reports.view"]),
        Permission::premium("reports.schedule", "Scheduled reports", G::Reports)
            .requires(["reports.advanced"]),
        Permission::premium("ai.prefill", "AI form prefill", G::Automation)
            .requires(["expenses.create"]),
        Permission::premium("ai.receipt_scan", "AI receipt scanning", G::Automation)
            .requires(["ai.prefill"]),
        Permission::premium("integrations.accounting_sync", "Accounting sync", G::Integrations)
            .requires(["expenses.export"]),
        Permission::premium("audit.view", "View audit trail", G::Compliance),
    ];

    let modules = vec![
        Module::new("compliance-audit", "Compliance audit trail", ModuleTier::Core, "compliance")
            .including(["audit.view"])
            .locked(),
        Module::new("expenses-pro", "Expenses Pro", ModuleTier::Premium, "expenses")
            .including(["expenses.approve", "expenses.export"])
            .optional("approvals.workflows", "Multi-step approval workflows")
            .priced(4_900, 500),
        Module::new("advanced-reporting", "Advanced reporting", ModuleTier::Standard, "reporting")
            .including(["reports.advanced"])
            .optional("reports.schedule", "Scheduled reports")
            .priced(1_900, 200),
        Module::new("ai-prefill", "AI prefill", ModuleTier::Premium, "automation")
            .including(["ai.prefill"])
            .optional("ai.receipt_scan", "Receipt scanning")
            .requires(["expenses-pro"])
            .priced(2_900, 300),
        Module::new("accounting-sync", "Accounting sync", ModuleTier::Standard, "integrations")
            .including(["integrations.accounting_sync"])
            .requires(["expenses-pro"])
            .priced(1_500, 0),
    ];

    let user_defaults = ["dashboard.view", "expenses.view", "expenses.create"];
    let admin_defaults = [
        "reports.view",
        "users.view",
        "users.manage",
        "settings.view",
        "settings.manage",
        "expenses.edit",
    ];

    let role_defaults = RoleDefaults::new()
        .with(Role::User, user_defaults.map(PermissionKey::from))
        .with(Role::Admin, user_defaults.map(PermissionKey::from))
        .with(Role::Admin, admin_defaults.map(PermissionKey::from))
        .with(Role::SuperAdmin, user_defaults.map(PermissionKey::from))
        .with(Role::SuperAdmin, admin_defaults.map(PermissionKey::from))
        .with(Role::SuperAdmin, [PermissionKey::from("billing.manage")]);

    let templates = vec![
        PermissionTemplate {
            id: TemplateId::from("finance-approver"),
            name: "Finance approver".to_string(),
            target_role: Role::User,
            data_permissions: ["reports.view"].map(PermissionKey::from).into(),
            modules: ["expenses-pro"].map(ModuleId::from).into(),
        },
        PermissionTemplate {
            id: TemplateId::from("finance-admin"),
            name: "Finance administrator".to_string(),
            target_role: Role::Admin,
            data_permissions: ["reports.view", "users.view"].map(PermissionKey::from).into(),
            modules: ["expenses-pro", "advanced-reporting", "accounting-sync"]
                .map(ModuleId::from)
                .into(),
        },
    ];

    CatalogDefinition {
        permissions,
        modules,
        role_defaults,
        templates,
    }
}
