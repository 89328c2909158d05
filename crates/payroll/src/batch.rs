use serde::{Deserialize, Serialize};

use payforge_core::AggregateId;

/// Payroll batch identifier (a payroll run that produced a set of slips).
///
/// The batch itself lives in the host payroll module; only its identity
/// crosses this layer. Voucher lines reference it to mark a payment as
/// settling the batch's slips.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayrollBatchId(pub AggregateId);

impl PayrollBatchId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PayrollBatchId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
