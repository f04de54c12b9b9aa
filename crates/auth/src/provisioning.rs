//! Company-level module provisioning records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use permgate_core::{AccessResult, CompanyId, ModuleId, UserId};

use crate::catalog::Module;

/// Billing tier a company bought a module under.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingTier {
    Trial,
    Standard,
    Enterprise,
    Custom,
}

/// Per-company module subscription.
///
/// `is_enabled == false` is a hard gate: none of the module's permissions can
/// be active for any user of the company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningRecord {
    pub company_id: CompanyId,
    pub module_id: ModuleId,
    pub is_enabled: bool,
    pub pricing_tier: PricingTier,
    pub monthly_price: u64,
    pub per_user_price: u64,
    pub users_licensed: u32,
    pub updated_by: UserId,
    pub updated_at: DateTime<Utc>,
}

/// Requested provisioning settings. Prices default to the catalog's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    pub enabled: bool,
    pub pricing_tier: PricingTier,
    #[serde(default)]
    pub monthly_price: Option<u64>,
    #[serde(default)]
    pub per_user_price: Option<u64>,
    #[serde(default)]
    pub users_licensed: u32,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pricing_tier: PricingTier::Standard,
            monthly_price: None,
            per_user_price: None,
            users_licensed: 0,
        }
    }
}

impl ProvisioningConfig {
    /// Build the stored record for `module`, filling prices from the catalog.
    pub fn into_record(
        self,
        company_id: CompanyId,
        module: &Module,
        updated_by: UserId,
        updated_at: DateTime<Utc>,
    ) -> ProvisioningRecord {
        ProvisioningRecord {
            company_id,
            module_id: module.id.clone(),
            is_enabled: self.enabled,
            pricing_tier: self.pricing_tier,
            monthly_price: self.monthly_price.unwrap_or(module.default_monthly_price),
            per_user_price: self.per_user_price.unwrap_or(module.default_per_user_price),
            users_licensed: self.users_licensed,
            updated_by,
            updated_at,
        }
    }
}

/// Read-side view of provisioning used by validators and the resolver.
pub trait ProvisioningLookup {
    /// Whether `module` is provisioned and enabled for `company_id`.
    fn is_active(&self, company_id: CompanyId, module: &ModuleId) -> AccessResult<bool>;
}

impl<P> ProvisioningLookup for std::sync::Arc<P>
where
    P: ProvisioningLookup + ?Sized,
{
    fn is_active(&self, company_id: CompanyId, module: &ModuleId) -> AccessResult<bool> {
        (**self).is_active(company_id, module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModuleTier;

    #[test]
    fn config_falls_back_to_catalog_prices() {
        let module = Module::new("expenses-pro", "Pro", ModuleTier::Premium, "expenses").priced(4_900, 500);
        let record = ProvisioningConfig {
            monthly_price: Some(3_000),
            ..Default::default()
        }
        .into_record(CompanyId::new(), &module, UserId::new(), Utc::now());

        assert_eq!(record.monthly_price, 3_000);
        assert_eq!(record.per_user_price, 500);
        assert!(record.is_enabled);
    }
}
