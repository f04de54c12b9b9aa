//! Commit protocol for staged access changes.
//!
//! ```text
//! commit(actor, subject, changes)
//!   ↓ authorize actor against subject (whole batch)
//!   ↓ take the subject's (company, user) lock
//!   ↓ per change: load rows → validate → write at expected version → audit
//!   ↓ release
//! CommitResult { succeeded, failed }
//! ```
//!
//! Items are independent: a failing item is reported and its siblings still
//! apply. Every applied item appends exactly one audit record, including
//! items that re-assert the current state. A failed append is logged at
//! `error` and the item still counts as applied, since its row is written.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use permgate_auth::{
    authorize_grant_change, authorize_module, authorize_permission, Actor, AuditRecord, Catalog,
    Change, ChangeTarget, ChangeType, CommitResult, DataPermissionGrant, DependencyResolver,
    EffectivePermissionSet, FailedChange, ModuleGrant, ModulePermissionGrant,
    PermissionResolver, ProvisioningLookup, Subject, UserGrants,
};
use permgate_core::{
    AccessError, AccessResult, Clock, CompanyId, ExpectedVersion, ModuleId, PermissionKey,
    TemplateId, UserId,
};

use crate::catalog_cache::CatalogCache;
use crate::lock::KeyedLocks;
use crate::store::{AuditSink, GrantStore};

/// Everything fixed for the duration of one commit or template application.
pub(crate) struct Session<'a> {
    pub catalog: &'a Catalog,
    pub actor: &'a Actor,
    pub subject: &'a Subject,
    pub now: DateTime<Utc>,
    pub template: Option<&'a TemplateId>,
}

/// Validated next state for one change.
struct Planned {
    grants: UserGrants,
    old_value: Option<bool>,
    note: Option<String>,
}

pub struct BatchMutator<G, L, A> {
    catalog: Arc<CatalogCache>,
    grants: G,
    provisioning: L,
    audit: A,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks<(CompanyId, UserId)>,
    super_admin_bypass: bool,
}

impl<G, L, A> BatchMutator<G, L, A>
where
    G: GrantStore,
    L: ProvisioningLookup + Send + Sync,
    A: AuditSink,
{
    pub fn new(
        catalog: Arc<CatalogCache>,
        grants: G,
        provisioning: L,
        audit: A,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            grants,
            provisioning,
            audit,
            clock,
            locks: KeyedLocks::new(),
            super_admin_bypass: false,
        }
    }

    pub fn with_super_admin_bypass(mut self, bypass: bool) -> Self {
        self.super_admin_bypass = bypass;
        self
    }

    /// Apply `changes` to `subject`'s grants, item by item.
    ///
    /// Only an unauthorized actor fails the whole call; every other problem is
    /// attached to the item it concerns.
    pub fn commit(
        &self,
        actor: &Actor,
        subject: &Subject,
        changes: Vec<Change>,
    ) -> AccessResult<CommitResult> {
        if let Err(err) = authorize_grant_change(actor, subject) {
            tracing::warn!(
                actor_id = %actor.user_id,
                user_id = %subject.user_id,
                company_id = %subject.company_id,
                error = err.code(),
                "commit rejected"
            );
            return Err(err);
        }

        let catalog = self.catalog.current();
        let session = Session {
            catalog: &catalog,
            actor,
            subject,
            now: self.clock.now(),
            template: None,
        };

        let result = self.serialized(subject, || {
            let mut result = CommitResult::default();
            for change in changes {
                match self.apply(&session, &change) {
                    Ok(()) => result.succeeded.push(change.target),
                    Err(error) => result.failed.push(FailedChange {
                        target: change.target,
                        error,
                    }),
                }
            }
            result
        });

        tracing::info!(
            actor_id = %actor.user_id,
            user_id = %subject.user_id,
            company_id = %subject.company_id,
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "commit finished"
        );
        Ok(result)
    }

    /// Current effective permissions of `subject`.
    pub fn effective_permissions(&self, subject: &Subject) -> AccessResult<EffectivePermissionSet> {
        let catalog = self.catalog.current();
        let grants = self.load(subject)?;
        self.resolve(&catalog, subject, &grants, self.clock.now())
    }

    pub(crate) fn catalog(&self) -> Arc<Catalog> {
        self.catalog.current()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn provisioning(&self) -> &L {
        &self.provisioning
    }

    /// Run `f` with the subject's grant rows locked against other writers.
    pub(crate) fn serialized<T>(&self, subject: &Subject, f: impl FnOnce() -> T) -> T {
        self.locks
            .with_lock(&(subject.company_id, subject.user_id), f)
    }

    pub(crate) fn load(&self, subject: &Subject) -> AccessResult<UserGrants> {
        Ok(self.grants.load(subject.user_id, subject.company_id)?)
    }

    pub(crate) fn resolve(
        &self,
        catalog: &Catalog,
        subject: &Subject,
        grants: &UserGrants,
        now: DateTime<Utc>,
    ) -> AccessResult<EffectivePermissionSet> {
        PermissionResolver::new(catalog)
            .with_super_admin_bypass(self.super_admin_bypass)
            .resolve(
                subject.user_id,
                subject.company_id,
                subject.role,
                grants,
                &self.provisioning,
                now,
            )
    }

    /// Validate, write and audit one change. Must run inside [`Self::serialized`].
    pub(crate) fn apply(&self, session: &Session<'_>, change: &Change) -> AccessResult<()> {
        let subject = session.subject;
        let result = self.apply_inner(session, change);
        match &result {
            Ok(()) => tracing::info!(
                actor_id = %session.actor.user_id,
                user_id = %subject.user_id,
                company_id = %subject.company_id,
                change = %change.target,
                desired = change.desired_state,
                "access change applied"
            ),
            Err(err) => tracing::warn!(
                actor_id = %session.actor.user_id,
                user_id = %subject.user_id,
                company_id = %subject.company_id,
                change = %change.target,
                desired = change.desired_state,
                error = err.code(),
                "access change rejected"
            ),
        }
        result
    }

    fn apply_inner(&self, session: &Session<'_>, change: &Change) -> AccessResult<()> {
        let subject = session.subject;
        let current = self.load(subject)?;

        let planned = match &change.target {
            ChangeTarget::Data { key } => self.plan_data(session, &current, key, change)?,
            ChangeTarget::Module { module } => self.plan_module(session, &current, module, change)?,
            ChangeTarget::ModulePermission { module, key } => {
                self.plan_module_permission(session, &current, module, key, change)?
            }
        };

        self.grants.save(
            subject.user_id,
            subject.company_id,
            planned.grants,
            ExpectedVersion::Exact(current.version),
        )?;

        let reason = match (change.reason.clone(), planned.note) {
            (Some(r), Some(n)) => Some(format!("{r}; {n}")),
            (r, n) => r.or(n),
        };
        let record = AuditRecord::new(
            session.actor.user_id,
            Some(subject.user_id),
            subject.company_id,
            ChangeType::for_change(&change.target, change.desired_state),
            change.target.audit_key(),
            planned.old_value,
            change.desired_state,
            session.now,
        )
        .with_reason(reason)
        .with_template(session.template.cloned());

        // The row is already written, so the item counts as applied.
        if let Err(err) = self.audit.append(record) {
            tracing::error!(
                user_id = %subject.user_id,
                company_id = %subject.company_id,
                change = %change.target,
                error = %err,
                "audit append failed after grant write"
            );
        }
        Ok(())
    }

    fn plan_data(
        &self,
        session: &Session<'_>,
        current: &UserGrants,
        key: &PermissionKey,
        change: &Change,
    ) -> AccessResult<Planned> {
        let catalog = session.catalog;
        let permission = catalog.get_permission(key)?;
        authorize_permission(session.actor, permission)?;

        if !permission.is_foundation {
            let owner = catalog.modules_including(key).next().cloned().or_else(|| {
                catalog
                    .modules()
                    .find(|m| m.offers_sub_feature(key))
                    .map(|m| m.id.clone())
            });
            return Err(match owner {
                Some(module) => AccessError::IncludedPermissionNotRevocable {
                    key: key.clone(),
                    module,
                },
                None => AccessError::UnknownPermission(key.clone()),
            });
        }

        if change.desired_state {
            self.check_permission_chain(session, current, [key])?;
        }

        let old_value = current.data_grant(key).map(|g| g.is_granted);
        let mut grants = current.clone();
        grants.data.retain(|g| &g.key != key);
        grants.data.push(DataPermissionGrant {
            user_id: session.subject.user_id,
            company_id: session.subject.company_id,
            key: key.clone(),
            is_granted: change.desired_state,
            granted_by: session.actor.user_id,
            granted_at: session.now,
            expires_at: change.expires_at,
        });

        Ok(Planned {
            grants,
            old_value,
            note: None,
        })
    }

    fn plan_module(
        &self,
        session: &Session<'_>,
        current: &UserGrants,
        module_id: &ModuleId,
        change: &Change,
    ) -> AccessResult<Planned> {
        let catalog = session.catalog;
        let module = catalog.get_module(module_id)?;
        authorize_module(session.actor, module)?;
        let mut grants = current.clone();
        let mut note = None;

        if change.desired_state {
            let deps = DependencyResolver::new(catalog);
            deps.validate_module_enable(&self.provisioning, session.subject.company_id, module_id)?;

            let missing: BTreeSet<ModuleId> = deps
                .required_modules(module_id)?
                .into_iter()
                .filter(|m| !current.module_enabled(m, session.now))
                .collect();
            if !missing.is_empty() {
                return Err(AccessError::ModuleDependencyUnmet {
                    module: module_id.clone(),
                    missing,
                });
            }

            self.check_permission_chain(session, current, &module.included_permissions)?;
        } else {
            let dependents: BTreeSet<ModuleId> = catalog
                .transitive_dependents(module_id)
                .into_iter()
                .filter(|m| current.module_enabled(m, session.now))
                .collect();
            if !dependents.is_empty() {
                return Err(AccessError::DependentModulesActive {
                    module: module_id.clone(),
                    dependents,
                });
            }

            let mut cleared: Vec<&str> = current
                .module_permissions
                .iter()
                .filter(|g| &g.module_id == module_id && g.is_granted)
                .map(|g| g.key.as_str())
                .collect();
            cleared.sort_unstable();
            if !cleared.is_empty() {
                note = Some(format!("cleared sub-features: {}", cleared.join(", ")));
            }
            grants.module_permissions.retain(|g| &g.module_id != module_id);
        }

        let old_value = current.module_grant(module_id).map(|g| g.is_enabled);
        grants.modules.retain(|g| &g.module_id != module_id);
        grants.modules.push(ModuleGrant {
            user_id: session.subject.user_id,
            company_id: session.subject.company_id,
            module_id: module_id.clone(),
            is_enabled: change.desired_state,
            granted_by: session.actor.user_id,
            granted_at: session.now,
            expires_at: change.expires_at,
        });

        Ok(Planned {
            grants,
            old_value,
            note,
        })
    }

    fn plan_module_permission(
        &self,
        session: &Session<'_>,
        current: &UserGrants,
        module_id: &ModuleId,
        key: &PermissionKey,
        change: &Change,
    ) -> AccessResult<Planned> {
        let catalog = session.catalog;
        let module = catalog.get_module(module_id)?;
        authorize_module(session.actor, module)?;

        if !module.offers_sub_feature(key) {
            return Err(if module.included_permissions.contains(key) {
                AccessError::IncludedPermissionNotRevocable {
                    key: key.clone(),
                    module: module_id.clone(),
                }
            } else {
                AccessError::UnknownPermission(key.clone())
            });
        }
        authorize_permission(session.actor, catalog.get_permission(key)?)?;

        let old_value = current
            .module_permission_grant(module_id, key)
            .map(|g| g.is_granted);
        let mut grants = current.clone();
        grants
            .module_permissions
            .retain(|g| !(&g.module_id == module_id && &g.key == key));

        // A revoke removes the row so no sub-feature row outlives its module.
        if change.desired_state {
            if !self
                .provisioning
                .is_active(session.subject.company_id, module_id)?
            {
                return Err(AccessError::NotProvisioned(module_id.clone()));
            }
            if !current.module_enabled(module_id, session.now) {
                return Err(AccessError::ModuleNotEnabled(module_id.clone()));
            }
            self.check_permission_chain(session, current, [key])?;

            grants.module_permissions.push(ModulePermissionGrant {
                user_id: session.subject.user_id,
                company_id: session.subject.company_id,
                module_id: module_id.clone(),
                key: key.clone(),
                is_granted: true,
                granted_by: session.actor.user_id,
                granted_at: session.now,
                expires_at: change.expires_at,
            });
        }

        Ok(Planned {
            grants,
            old_value,
            note: None,
        })
    }

    /// Every key in `targets` must have its requirement chain met by the
    /// current effective set plus the targets themselves.
    fn check_permission_chain<'k>(
        &self,
        session: &Session<'_>,
        current: &UserGrants,
        targets: impl IntoIterator<Item = &'k PermissionKey> + Clone,
    ) -> AccessResult<()> {
        let effective = self.resolve(session.catalog, session.subject, current, session.now)?;
        let mut candidate = effective.key_set();
        candidate.extend(targets.clone().into_iter().cloned());

        let deps = DependencyResolver::new(session.catalog);
        for key in targets {
            deps.validate_permission_grant(&candidate, key)?;
        }
        Ok(())
    }
}
