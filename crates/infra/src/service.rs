//! `AccessService`: the engine's external surface.
//!
//! Composes the catalog cache, provisioning manager, batch mutator, template
//! engine and audit log. Transport layers call this and nothing below it.

use std::path::Path;
use std::sync::Arc;

use permgate_auth::{
    Actor, ApplyResult, Catalog, Change, CommitResult, EffectivePermissionSet, Module,
    ModuleFilter, PendingChanges, PermissionExplanation, ProvisioningConfig, ProvisioningRecord,
    Subject,
};
use permgate_core::{AccessResult, Clock, CompanyId, ModuleId, PermissionKey, TemplateId, UserId};

use crate::catalog_cache::CatalogCache;
use crate::config::{ConfigError, EngineConfig};
use crate::mutator::BatchMutator;
use crate::provisioning::ProvisioningManager;
use crate::store::{
    AuditFilter, AuditPage, AuditQuery, AuditSink, GrantStore, InMemoryAuditLog,
    InMemoryGrantStore, InMemoryProvisioningStore, Pagination, ProvisioningStore,
};
use crate::templates::TemplateEngine;

type Provisioning<P, A> = Arc<ProvisioningManager<P, A>>;

pub struct AccessService<G, P, A> {
    config: EngineConfig,
    catalog: Arc<CatalogCache>,
    provisioning: Provisioning<P, A>,
    mutator: Arc<BatchMutator<G, Provisioning<P, A>, A>>,
    templates: TemplateEngine<G, Provisioning<P, A>, A>,
    audit: A,
}

/// Service over the in-memory stores.
pub type InMemoryAccessService =
    AccessService<Arc<InMemoryGrantStore>, Arc<InMemoryProvisioningStore>, Arc<InMemoryAuditLog>>;

impl InMemoryAccessService {
    /// Load the configured catalog and wire fresh in-memory stores.
    pub fn in_memory(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let catalog = config.load_catalog()?;
        Ok(Self::new(
            config,
            catalog,
            Arc::new(InMemoryGrantStore::new()),
            Arc::new(InMemoryProvisioningStore::new()),
            Arc::new(InMemoryAuditLog::new()),
            clock,
        ))
    }
}

impl<G, P, A> AccessService<G, P, A>
where
    G: GrantStore,
    P: ProvisioningStore,
    A: AuditSink + AuditQuery + Clone,
{
    pub fn new(
        config: EngineConfig,
        catalog: Catalog,
        grants: G,
        provisioning_store: P,
        audit: A,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let catalog = Arc::new(CatalogCache::new(catalog));
        let provisioning = Arc::new(ProvisioningManager::new(
            catalog.clone(),
            provisioning_store,
            audit.clone(),
            clock.clone(),
        ));
        let mutator = Arc::new(
            BatchMutator::new(catalog.clone(), grants, provisioning.clone(), audit.clone(), clock)
                .with_super_admin_bypass(config.super_admin_bypass_provisioning),
        );
        let templates = TemplateEngine::new(mutator.clone());

        Self {
            config,
            catalog,
            provisioning,
            mutator,
            templates,
            audit,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Effective permissions for a session identity. Unknown role strings fail
    /// with `UnknownRole`.
    pub fn get_effective_permissions(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        role: &str,
    ) -> AccessResult<EffectivePermissionSet> {
        self.effective_permissions(&Subject::parse(user_id, company_id, role)?)
    }

    pub fn effective_permissions(&self, subject: &Subject) -> AccessResult<EffectivePermissionSet> {
        self.mutator.effective_permissions(subject)
    }

    pub fn explain(&self, subject: &Subject, key: &PermissionKey) -> AccessResult<PermissionExplanation> {
        Ok(self.effective_permissions(subject)?.explain(key))
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.current()
    }

    pub fn list_modules(&self, filter: &ModuleFilter) -> Vec<Module> {
        self.catalog
            .current()
            .list_modules(filter)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn list_company_modules(&self, company_id: CompanyId) -> AccessResult<Vec<ProvisioningRecord>> {
        self.provisioning.list_company_modules(company_id)
    }

    /// Company audit trail, newest first. `limit` defaults to the configured
    /// page size.
    pub async fn list_audit_records(
        &self,
        company_id: CompanyId,
        filter: AuditFilter,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> AccessResult<AuditPage> {
        let pagination = Pagination::with_default_limit(limit, offset, self.config.audit_page_limit);
        Ok(self.audit.query_audit(company_id, filter, pagination).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    pub fn propose_and_commit(
        &self,
        actor: &Actor,
        subject: &Subject,
        changes: Vec<Change>,
    ) -> AccessResult<CommitResult> {
        self.mutator.commit(actor, subject, changes)
    }

    /// Commit a staging buffer in dependency order, leaving only the failed
    /// items staged.
    pub fn commit_pending(
        &self,
        actor: &Actor,
        subject: &Subject,
        pending: &mut PendingChanges,
    ) -> AccessResult<CommitResult> {
        let changes = pending.clone().into_changes(&self.catalog.current());
        let result = self.mutator.commit(actor, subject, changes)?;
        pending.restage_failures(&result);
        Ok(result)
    }

    pub fn apply_template(
        &self,
        actor: &Actor,
        subject: &Subject,
        template_id: &TemplateId,
    ) -> AccessResult<ApplyResult> {
        self.templates.apply_template(actor, subject, template_id)
    }

    pub fn provision_module(
        &self,
        actor: &Actor,
        company_id: CompanyId,
        module_id: &ModuleId,
        config: ProvisioningConfig,
    ) -> AccessResult<ProvisioningRecord> {
        self.provisioning
            .provision_module(actor, company_id, module_id, config)
    }

    pub fn set_company_module_enabled(
        &self,
        actor: &Actor,
        company_id: CompanyId,
        module_id: &ModuleId,
        enabled: bool,
        cascade: bool,
    ) -> AccessResult<Vec<ProvisioningRecord>> {
        self.provisioning
            .set_enabled(actor, company_id, module_id, enabled, cascade)
    }

    /// Swap in a new catalog file (deploy hook).
    pub fn reload_catalog(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.catalog.reload_from(path)
    }
}
