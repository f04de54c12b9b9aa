//! Actor authorization for access mutations.
//!
//! - No IO
//! - No panics
//! - Pure policy checks over the actor, subject and catalog entry involved

use permgate_core::{AccessError, AccessResult, CompanyId};

use crate::catalog::{Module, Permission};
use crate::principal::{Actor, Subject};

/// May `actor` change `subject`'s grants at all?
///
/// Administrators act only inside their own company and never on their own
/// access; the system operator is unrestricted.
pub fn authorize_grant_change(actor: &Actor, subject: &Subject) -> AccessResult<()> {
    if actor.role.is_operator() {
        return Ok(());
    }
    if !actor.role.is_administrator() {
        return Err(AccessError::unauthorized(format!(
            "role '{}' cannot change user access",
            actor.role
        )));
    }
    if actor.company_id != subject.company_id {
        return Err(AccessError::unauthorized("company mismatch"));
    }
    if actor.user_id == subject.user_id {
        return Err(AccessError::unauthorized("administrators cannot change their own access"));
    }
    Ok(())
}

/// May `actor` change company-level provisioning for `company_id`?
pub fn authorize_provisioning(actor: &Actor, company_id: CompanyId) -> AccessResult<()> {
    if actor.role.is_operator() {
        return Ok(());
    }
    if !actor.role.is_administrator() {
        return Err(AccessError::unauthorized(format!(
            "role '{}' cannot change module provisioning",
            actor.role
        )));
    }
    if actor.company_id != company_id {
        return Err(AccessError::unauthorized("company mismatch"));
    }
    Ok(())
}

/// System-only permissions are reserved for the operator.
pub fn authorize_permission(actor: &Actor, permission: &Permission) -> AccessResult<()> {
    if permission.is_system_only && !actor.role.is_operator() {
        return Err(AccessError::unauthorized(format!(
            "permission '{}' is reserved for the system operator",
            permission.key
        )));
    }
    Ok(())
}

/// Locked modules keep their per-user state unless the operator changes it.
pub fn authorize_module(actor: &Actor, module: &Module) -> AccessResult<()> {
    if module.locked && !actor.role.is_operator() {
        return Err(AccessError::ModuleLocked(module.id.clone()));
    }
    Ok(())
}
