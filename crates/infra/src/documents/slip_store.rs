//! Salary slip document store seam.
//!
//! The host ERP persists slips; settlement and the recalculation hooks go
//! through this trait. Writes are typed whole-document saves — there is no
//! raw column path to drift away from the schema. A failed write propagates
//! so the enclosing voucher transition aborts as a unit.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use payforge_core::TenantId;
use payforge_payroll::{PayrollBatchId, SalarySlip, SlipId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlipStoreError {
    #[error("slip not found")]
    NotFound,

    /// The backing store rejected the operation.
    #[error("slip store failure: {0}")]
    Storage(String),
}

/// Fetch/persist seam for salary slip documents.
pub trait SlipStore: Send + Sync {
    fn get(&self, tenant_id: TenantId, slip_id: SlipId) -> Result<SalarySlip, SlipStoreError>;

    /// All slips belonging to a payroll batch.
    fn list_by_batch(
        &self,
        tenant_id: TenantId,
        batch_id: PayrollBatchId,
    ) -> Result<Vec<SalarySlip>, SlipStoreError>;

    fn save(&self, tenant_id: TenantId, slip: &SalarySlip) -> Result<(), SlipStoreError>;
}

impl<S> SlipStore for Arc<S>
where
    S: SlipStore + ?Sized,
{
    fn get(&self, tenant_id: TenantId, slip_id: SlipId) -> Result<SalarySlip, SlipStoreError> {
        (**self).get(tenant_id, slip_id)
    }

    fn list_by_batch(
        &self,
        tenant_id: TenantId,
        batch_id: PayrollBatchId,
    ) -> Result<Vec<SalarySlip>, SlipStoreError> {
        (**self).list_by_batch(tenant_id, batch_id)
    }

    fn save(&self, tenant_id: TenantId, slip: &SalarySlip) -> Result<(), SlipStoreError> {
        (**self).save(tenant_id, slip)
    }
}

/// In-memory slip store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySlipStore {
    inner: RwLock<HashMap<(TenantId, SlipId), SalarySlip>>,
}

impl InMemorySlipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlipStore for InMemorySlipStore {
    fn get(&self, tenant_id: TenantId, slip_id: SlipId) -> Result<SalarySlip, SlipStoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| SlipStoreError::Storage("lock poisoned".to_string()))?;
        map.get(&(tenant_id, slip_id))
            .cloned()
            .ok_or(SlipStoreError::NotFound)
    }

    fn list_by_batch(
        &self,
        tenant_id: TenantId,
        batch_id: PayrollBatchId,
    ) -> Result<Vec<SalarySlip>, SlipStoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| SlipStoreError::Storage("lock poisoned".to_string()))?;

        let mut slips: Vec<SalarySlip> = map
            .iter()
            .filter(|((t, _), slip)| *t == tenant_id && slip.batch_id() == Some(batch_id))
            .map(|(_, slip)| slip.clone())
            .collect();
        // Deterministic order for settlement and tests.
        slips.sort_by_key(|s| *s.id_typed().0.as_uuid());
        Ok(slips)
    }

    fn save(&self, tenant_id: TenantId, slip: &SalarySlip) -> Result<(), SlipStoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| SlipStoreError::Storage("lock poisoned".to_string()))?;
        map.insert((tenant_id, slip.id_typed()), slip.clone());
        Ok(())
    }
}
