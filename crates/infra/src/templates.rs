//! Template application: one logical batch of data grants and module enables.
//!
//! Best-effort. Items the user already holds count as applied without a write;
//! items that cannot be applied (typically a module the company has not
//! provisioned) are reported under `skipped` with the reason.

use std::sync::Arc;

use permgate_auth::{
    authorize_grant_change, Actor, ApplyResult, Change, ChangeTarget, ProvisioningLookup,
    SkippedItem, Subject, TemplateItem,
};
use permgate_core::{AccessResult, ModuleId, PermissionKey, TemplateId};

use crate::mutator::{BatchMutator, Session};
use crate::store::{AuditSink, GrantStore};

pub struct TemplateEngine<G, L, A> {
    mutator: Arc<BatchMutator<G, L, A>>,
}

impl<G, L, A> TemplateEngine<G, L, A>
where
    G: GrantStore,
    L: ProvisioningLookup + Send + Sync,
    A: AuditSink,
{
    pub fn new(mutator: Arc<BatchMutator<G, L, A>>) -> Self {
        Self { mutator }
    }

    pub fn apply_template(
        &self,
        actor: &Actor,
        subject: &Subject,
        template_id: &TemplateId,
    ) -> AccessResult<ApplyResult> {
        authorize_grant_change(actor, subject)?;
        let catalog = self.mutator.catalog();
        let template = catalog.get_template(template_id)?;
        if template.target_role != subject.role {
            tracing::warn!(
                template_id = %template_id,
                user_id = %subject.user_id,
                target_role = %template.target_role,
                role = %subject.role,
                "applying template to a user outside its target role"
            );
        }

        let session = Session {
            catalog: &catalog,
            actor,
            subject,
            now: self.mutator.now(),
            template: Some(template_id),
        };
        let reason = format!("template '{template_id}'");

        let result = self.mutator.serialized(subject, || {
            let mut result = ApplyResult::default();
            let mut outcome = |item: TemplateItem, applied: AccessResult<()>| match applied {
                Ok(()) => {
                    result.applied.insert(item);
                }
                Err(error) => result.skipped.push(SkippedItem {
                    item,
                    reason: error,
                }),
            };

            for key in catalog.permission_order(&template.data_permissions) {
                let applied = self.already_holds_permission(&session, &key).and_then(|held| {
                    if held {
                        Ok(())
                    } else {
                        let change = Change::grant(ChangeTarget::data(key.clone())).because(&reason);
                        self.mutator.apply(&session, &change)
                    }
                });
                outcome(TemplateItem::Permission(key), applied);
            }

            for module in catalog.module_order(&template.modules) {
                let applied = self.already_holds_module(&session, &module).and_then(|held| {
                    if held {
                        Ok(())
                    } else {
                        let change = Change::grant(ChangeTarget::module(module.clone())).because(&reason);
                        self.mutator.apply(&session, &change)
                    }
                });
                outcome(TemplateItem::Module(module), applied);
            }

            result
        });

        tracing::info!(
            template_id = %template_id,
            actor_id = %actor.user_id,
            user_id = %subject.user_id,
            company_id = %subject.company_id,
            applied = result.applied.len(),
            skipped = result.skipped.len(),
            "template applied"
        );
        Ok(result)
    }

    fn already_holds_permission(
        &self,
        session: &Session<'_>,
        key: &PermissionKey,
    ) -> AccessResult<bool> {
        let grants = self.mutator.load(session.subject)?;
        let effective = self
            .mutator
            .resolve(session.catalog, session.subject, &grants, session.now)?;
        Ok(effective.contains(key))
    }

    fn already_holds_module(&self, session: &Session<'_>, module: &ModuleId) -> AccessResult<bool> {
        let grants = self.mutator.load(session.subject)?;
        Ok(grants.module_enabled(module, session.now)
            && self
                .mutator
                .provisioning()
                .is_active(session.subject.company_id, module)?)
    }
}
