use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use permgate_auth::ProvisioningRecord;
use permgate_core::{CompanyId, ModuleId};

use super::StoreError;

/// Company-level module provisioning rows.
///
/// Writes go through the provisioning manager only.
pub trait ProvisioningStore: Send + Sync {
    fn get(
        &self,
        company_id: CompanyId,
        module_id: &ModuleId,
    ) -> Result<Option<ProvisioningRecord>, StoreError>;

    fn upsert(&self, record: ProvisioningRecord) -> Result<(), StoreError>;

    /// Every record of the company, ordered by module id.
    fn list(&self, company_id: CompanyId) -> Result<Vec<ProvisioningRecord>, StoreError>;
}

impl<S> ProvisioningStore for Arc<S>
where
    S: ProvisioningStore + ?Sized,
{
    fn get(
        &self,
        company_id: CompanyId,
        module_id: &ModuleId,
    ) -> Result<Option<ProvisioningRecord>, StoreError> {
        (**self).get(company_id, module_id)
    }

    fn upsert(&self, record: ProvisioningRecord) -> Result<(), StoreError> {
        (**self).upsert(record)
    }

    fn list(&self, company_id: CompanyId) -> Result<Vec<ProvisioningRecord>, StoreError> {
        (**self).list(company_id)
    }
}

/// In-memory provisioning store.
#[derive(Debug, Default)]
pub struct InMemoryProvisioningStore {
    rows: RwLock<HashMap<(CompanyId, ModuleId), ProvisioningRecord>>,
}

impl InMemoryProvisioningStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProvisioningStore for InMemoryProvisioningStore {
    fn get(
        &self,
        company_id: CompanyId,
        module_id: &ModuleId,
    ) -> Result<Option<ProvisioningRecord>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned())?;
        Ok(rows.get(&(company_id, module_id.clone())).cloned())
    }

    fn upsert(&self, record: ProvisioningRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned())?;
        rows.insert((record.company_id, record.module_id.clone()), record);
        Ok(())
    }

    fn list(&self, company_id: CompanyId) -> Result<Vec<ProvisioningRecord>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned())?;
        let mut out: Vec<ProvisioningRecord> = rows
            .iter()
            .filter_map(|((c, _), r)| (*c == company_id).then(|| r.clone()))
            .collect();
        out.sort_by(|a, b| a.module_id.cmp(&b.module_id));
        Ok(out)
    }
}
