//! Staged access changes and their itemized outcomes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use permgate_core::{AccessError, ModuleId, PermissionKey};

use crate::catalog::Catalog;

/// What a single change toggles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeTarget {
    /// Foundation data permission.
    Data { key: PermissionKey },
    /// Per-user module enablement.
    Module { module: ModuleId },
    /// Optional sub-feature of a module.
    ModulePermission { module: ModuleId, key: PermissionKey },
}

impl ChangeTarget {
    pub fn data(key: impl Into<PermissionKey>) -> Self {
        Self::Data { key: key.into() }
    }

    pub fn module(module: impl Into<ModuleId>) -> Self {
        Self::Module {
            module: module.into(),
        }
    }

    pub fn module_permission(module: impl Into<ModuleId>, key: impl Into<PermissionKey>) -> Self {
        Self::ModulePermission {
            module: module.into(),
            key: key.into(),
        }
    }

    /// Key used in audit records (`module/key` for sub-features).
    pub fn audit_key(&self) -> String {
        match self {
            ChangeTarget::Data { key } => key.to_string(),
            ChangeTarget::Module { module } => module.to_string(),
            ChangeTarget::ModulePermission { module, key } => format!("{module}/{key}"),
        }
    }
}

impl core::fmt::Display for ChangeTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.audit_key())
    }
}

/// One proposed toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub target: ChangeTarget,
    pub desired_state: bool,
    /// Temporary access: the grant lapses at this instant.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Change {
    pub fn grant(target: ChangeTarget) -> Self {
        Self {
            target,
            desired_state: true,
            expires_at: None,
            reason: None,
        }
    }

    pub fn revoke(target: ChangeTarget) -> Self {
        Self {
            desired_state: false,
            ..Self::grant(target)
        }
    }

    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedChange {
    pub target: ChangeTarget,
    #[serde(serialize_with = "serialize_error")]
    pub error: AccessError,
}

/// Per-item outcome of a commit. Items are independent: siblings of a failed
/// item still take effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitResult {
    pub succeeded: Vec<ChangeTarget>,
    pub failed: Vec<FailedChange>,
}

impl CommitResult {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn error_for(&self, target: &ChangeTarget) -> Option<&AccessError> {
        self.failed
            .iter()
            .find(|f| &f.target == target)
            .map(|f| &f.error)
    }
}

/// Client-side staging buffer for an admin's unsaved toggles.
///
/// Never persisted: only the final [`PendingChanges::into_changes`] list is
/// ever sent to a commit. Re-staging a target overwrites the earlier choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChanges {
    staged: BTreeMap<ChangeTarget, Change>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, target: ChangeTarget, desired_state: bool) -> &mut Self {
        let change = if desired_state {
            Change::grant(target.clone())
        } else {
            Change::revoke(target.clone())
        };
        self.staged.insert(target, change);
        self
    }

    pub fn stage_change(&mut self, change: Change) -> &mut Self {
        self.staged.insert(change.target.clone(), change);
        self
    }

    pub fn unstage(&mut self, target: &ChangeTarget) -> Option<Change> {
        self.staged.remove(target)
    }

    pub fn desired_state(&self, target: &ChangeTarget) -> Option<bool> {
        self.staged.get(target).map(|c| c.desired_state)
    }

    pub fn clear(&mut self) {
        self.staged.clear();
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Keep only the failed items of a commit staged, so they can be retried.
    pub fn restage_failures(&mut self, result: &CommitResult) {
        let failed: BTreeSet<&ChangeTarget> = result.failed.iter().map(|f| &f.target).collect();
        self.staged.retain(|target, _| failed.contains(target));
    }

    /// Changes in commit order, so no staged item fails only because a
    /// sibling it depends on has not been applied yet:
    ///
    /// 1. sub-feature revokes
    /// 2. module disables, dependents before the modules they require
    /// 3. data revokes
    /// 4. data grants, requirements first
    /// 5. module enables, requirements first
    /// 6. sub-feature grants
    pub fn into_changes(self, catalog: &Catalog) -> Vec<Change> {
        let mut data: BTreeMap<PermissionKey, Change> = BTreeMap::new();
        let mut modules: BTreeMap<ModuleId, Change> = BTreeMap::new();
        let mut feature_grants = Vec::new();
        let mut feature_revokes = Vec::new();
        for (target, change) in self.staged {
            match target {
                ChangeTarget::Data { key } => {
                    data.insert(key, change);
                }
                ChangeTarget::Module { module } => {
                    modules.insert(module, change);
                }
                ChangeTarget::ModulePermission { .. } if change.desired_state => {
                    feature_grants.push(change)
                }
                ChangeTarget::ModulePermission { .. } => feature_revokes.push(change),
            }
        }

        let (data_grants, data_revokes): (Vec<_>, Vec<_>) =
            data.into_iter().partition(|(_, c)| c.desired_state);
        let (enables, disables): (Vec<_>, Vec<_>) =
            modules.into_iter().partition(|(_, c)| c.desired_state);
        let mut data_grants: BTreeMap<_, _> = data_grants.into_iter().collect();
        let mut enables: BTreeMap<_, _> = enables.into_iter().collect();
        let mut disables: BTreeMap<_, _> = disables.into_iter().collect();

        let disable_order: Vec<ModuleId> = catalog.module_order(disables.keys()).into_iter().rev().collect();
        let grant_order = catalog.permission_order(data_grants.keys());
        let enable_order = catalog.module_order(enables.keys());

        let mut out = feature_revokes;
        out.extend(disable_order.iter().filter_map(|m| disables.remove(m)));
        out.extend(data_revokes.into_iter().map(|(_, c)| c));
        out.extend(grant_order.iter().filter_map(|k| data_grants.remove(k)));
        out.extend(enable_order.iter().filter_map(|m| enables.remove(m)));
        out.extend(feature_grants);
        out
    }
}

/// Item of a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TemplateItem {
    Permission(PermissionKey),
    Module(ModuleId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub item: TemplateItem,
    #[serde(serialize_with = "serialize_error")]
    pub reason: AccessError,
}

/// Outcome of applying a template: best-effort, partial success allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    /// Items in effect after the call, whether newly granted or already held.
    pub applied: BTreeSet<TemplateItem>,
    pub skipped: Vec<SkippedItem>,
}

fn serialize_error<S: Serializer>(error: &AccessError, serializer: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeStruct;

    let mut s = serializer.serialize_struct("AccessError", 2)?;
    s.serialize_field("code", error.code())?;
    s.serialize_field("message", &error.to_string())?;
    s.end()
}
