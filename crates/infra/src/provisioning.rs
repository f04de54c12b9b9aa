//! Company-level module provisioning.
//!
//! The only writer of provisioning rows. Every state change is audited with no
//! affected user; changes for one company are serialized.

use std::collections::BTreeSet;
use std::sync::Arc;

use permgate_auth::{
    authorize_module, authorize_provisioning, Actor, AuditRecord, Catalog, ChangeType,
    DependencyResolver, ProvisioningConfig, ProvisioningLookup, ProvisioningRecord,
};
use permgate_core::{AccessError, AccessResult, Clock, CompanyId, ModuleId};

use crate::catalog_cache::CatalogCache;
use crate::lock::KeyedLocks;
use crate::store::{AuditSink, ProvisioningStore};

pub struct ProvisioningManager<S, A> {
    catalog: Arc<CatalogCache>,
    store: S,
    audit: A,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks<CompanyId>,
}

impl<S, A> ProvisioningManager<S, A>
where
    S: ProvisioningStore,
    A: AuditSink,
{
    pub fn new(catalog: Arc<CatalogCache>, store: S, audit: A, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            store,
            audit,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    /// Create or overwrite the company's subscription to `module_id`.
    ///
    /// Enabling requires every module it depends on to be active for the
    /// company already; disabling fails while active modules depend on it.
    pub fn provision_module(
        &self,
        actor: &Actor,
        company_id: CompanyId,
        module_id: &ModuleId,
        config: ProvisioningConfig,
    ) -> AccessResult<ProvisioningRecord> {
        authorize_provisioning(actor, company_id)?;
        let catalog = self.catalog.current();
        let module = catalog.get_module(module_id)?;
        authorize_module(actor, module)?;

        self.locks.with_lock(&company_id, || -> AccessResult<_> {
            let existing = self.store.get(company_id, module_id)?;
            if config.enabled {
                self.check_requirements(&catalog, company_id, module_id)?;
            } else if existing.as_ref().is_some_and(|r| r.is_enabled) {
                let dependents = self.active_dependents(&catalog, company_id, module_id)?;
                if !dependents.is_empty() {
                    return Err(AccessError::DependentModulesActive {
                        module: module_id.clone(),
                        dependents: dependents.into_iter().collect(),
                    });
                }
            }

            let record = config.into_record(company_id, module, actor.user_id, self.clock.now());
            self.write(actor, &record, existing.as_ref(), None)?;
            Ok(record)
        })
    }

    /// Toggle an existing subscription.
    ///
    /// With `cascade`, active dependents are disabled first, deepest first, each
    /// with its own audit record. Returns every record that changed, in write order.
    pub fn set_enabled(
        &self,
        actor: &Actor,
        company_id: CompanyId,
        module_id: &ModuleId,
        enabled: bool,
        cascade: bool,
    ) -> AccessResult<Vec<ProvisioningRecord>> {
        authorize_provisioning(actor, company_id)?;
        let catalog = self.catalog.current();
        authorize_module(actor, catalog.get_module(module_id)?)?;

        self.locks.with_lock(&company_id, || -> AccessResult<_> {
            let existing = self
                .store
                .get(company_id, module_id)?
                .ok_or_else(|| AccessError::NotProvisioned(module_id.clone()))?;
            if existing.is_enabled == enabled {
                return Ok(Vec::new());
            }

            let now = self.clock.now();
            let mut changed = Vec::new();

            if enabled {
                self.check_requirements(&catalog, company_id, module_id)?;
            } else {
                let dependents = self.active_dependents(&catalog, company_id, module_id)?;
                if !dependents.is_empty() && !cascade {
                    return Err(AccessError::DependentModulesActive {
                        module: module_id.clone(),
                        dependents: dependents.into_iter().collect(),
                    });
                }
                for dep in &dependents {
                    authorize_module(actor, catalog.get_module(dep)?)?;
                }

                let reason = format!("cascade from '{module_id}'");
                for dep in dependents {
                    let Some(previous) = self.store.get(company_id, &dep)? else {
                        continue;
                    };
                    let record = ProvisioningRecord {
                        is_enabled: false,
                        updated_by: actor.user_id,
                        updated_at: now,
                        ..previous.clone()
                    };
                    self.write(actor, &record, Some(&previous), Some(reason.clone()))?;
                    changed.push(record);
                }
            }

            let record = ProvisioningRecord {
                is_enabled: enabled,
                updated_by: actor.user_id,
                updated_at: now,
                ..existing.clone()
            };
            self.write(actor, &record, Some(&existing), None)?;
            changed.push(record);
            Ok(changed)
        })
    }

    pub fn get(&self, company_id: CompanyId, module_id: &ModuleId) -> AccessResult<Option<ProvisioningRecord>> {
        Ok(self.store.get(company_id, module_id)?)
    }

    /// Every module the company has a subscription row for, enabled or not.
    pub fn list_company_modules(&self, company_id: CompanyId) -> AccessResult<Vec<ProvisioningRecord>> {
        Ok(self.store.list(company_id)?)
    }

    fn check_requirements(
        &self,
        catalog: &Catalog,
        company_id: CompanyId,
        module_id: &ModuleId,
    ) -> AccessResult<()> {
        let mut missing = BTreeSet::new();
        for dep in DependencyResolver::new(catalog).required_modules(module_id)? {
            if !self.is_active(company_id, &dep)? {
                missing.insert(dep);
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AccessError::ModuleDependencyUnmet {
                module: module_id.clone(),
                missing,
            })
        }
    }

    /// Active transitive dependents, deepest first.
    fn active_dependents(
        &self,
        catalog: &Catalog,
        company_id: CompanyId,
        module_id: &ModuleId,
    ) -> AccessResult<Vec<ModuleId>> {
        let mut out = Vec::new();
        for dep in catalog.transitive_dependents(module_id) {
            if self.is_active(company_id, &dep)? {
                out.push(dep);
            }
        }
        Ok(out)
    }

    fn write(
        &self,
        actor: &Actor,
        record: &ProvisioningRecord,
        previous: Option<&ProvisioningRecord>,
        reason: Option<String>,
    ) -> AccessResult<()> {
        self.store.upsert(record.clone())?;
        let audit = AuditRecord::new(
            actor.user_id,
            None,
            record.company_id,
            ChangeType::for_provisioning(record.is_enabled),
            record.module_id.as_str(),
            previous.map(|p| p.is_enabled),
            record.is_enabled,
            record.updated_at,
        )
        .with_reason(reason);
        if let Err(err) = self.audit.append(audit) {
            tracing::error!(
                company_id = %record.company_id,
                module_id = %record.module_id,
                error = %err,
                "audit append failed after provisioning write"
            );
        }
        tracing::info!(
            company_id = %record.company_id,
            module_id = %record.module_id,
            actor_id = %actor.user_id,
            enabled = record.is_enabled,
            "module provisioning changed"
        );
        Ok(())
    }
}

impl<S, A> ProvisioningLookup for ProvisioningManager<S, A>
where
    S: ProvisioningStore,
    A: AuditSink,
{
    fn is_active(&self, company_id: CompanyId, module: &ModuleId) -> AccessResult<bool> {
        Ok(self
            .store
            .get(company_id, module)?
            .is_some_and(|r| r.is_enabled))
    }
}
