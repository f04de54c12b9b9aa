//! Append-only audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use permgate_core::{CompanyId, TemplateId, UserId};

use crate::changes::ChangeTarget;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    DataGrant,
    DataRevoke,
    ModuleEnable,
    ModuleDisable,
    ModulePermissionGrant,
    ModulePermissionRevoke,
    ProvisioningEnable,
    ProvisioningDisable,
}

impl ChangeType {
    pub fn for_change(target: &ChangeTarget, desired_state: bool) -> Self {
        match (target, desired_state) {
            (ChangeTarget::Data { .. }, true) => ChangeType::DataGrant,
            (ChangeTarget::Data { .. }, false) => ChangeType::DataRevoke,
            (ChangeTarget::Module { .. }, true) => ChangeType::ModuleEnable,
            (ChangeTarget::Module { .. }, false) => ChangeType::ModuleDisable,
            (ChangeTarget::ModulePermission { .. }, true) => ChangeType::ModulePermissionGrant,
            (ChangeTarget::ModulePermission { .. }, false) => ChangeType::ModulePermissionRevoke,
        }
    }

    pub fn for_provisioning(enabled: bool) -> Self {
        if enabled {
            ChangeType::ProvisioningEnable
        } else {
            ChangeType::ProvisioningDisable
        }
    }
}

/// Immutable record of one committed access change.
///
/// Company-level provisioning changes have no affected user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub actor_user_id: UserId,
    pub affected_user_id: Option<UserId>,
    pub company_id: CompanyId,
    pub change_type: ChangeType,
    pub key: String,
    /// State before the change; `None` when no row existed.
    pub old_value: Option<bool>,
    pub new_value: bool,
    pub reason: Option<String>,
    /// Template that issued the change, if any.
    pub template_id: Option<TemplateId>,
    pub performed_at: DateTime<Utc>,
}

impl AuditRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        actor_user_id: UserId,
        affected_user_id: Option<UserId>,
        company_id: CompanyId,
        change_type: ChangeType,
        key: impl Into<String>,
        old_value: Option<bool>,
        new_value: bool,
        performed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            actor_user_id,
            affected_user_id,
            company_id,
            change_type,
            key: key.into(),
            old_value,
            new_value,
            reason: None,
            template_id: None,
            performed_at,
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_template(mut self, template_id: Option<TemplateId>) -> Self {
        self.template_id = template_id;
        self
    }
}
