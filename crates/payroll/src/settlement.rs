//! Batch settlement: how one posted payment voucher distributes across the
//! slips of a payroll batch.
//!
//! The decision is pure: given the voucher's payroll-referencing lines and
//! the batch's slip roster, produce the postings. Whether the postings are
//! recorded or reversed is the caller's concern (submit vs. cancel), as is
//! persistence.

use serde::{Deserialize, Serialize};

use payforge_core::EmployeeId;

use crate::batch::PayrollBatchId;
use crate::slip::SlipId;

/// A voucher line as settlement sees it: the referenced batch, the payee
/// party, and the debit side.
///
/// The payee is optional: a funded line without a party still counts for
/// batch attribution, it just cannot match any slip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLine {
    pub batch_id: PayrollBatchId,
    pub payee: Option<EmployeeId>,
    pub debit: u64,
}

/// Why a voucher produced no settlement. These are skips, not errors:
/// unrelated or malformed vouchers must never block posting/cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementSkip {
    /// No line references a payroll batch with a positive debit.
    NoPayrollLines,
    /// Lines reference more than one batch; attribution is ambiguous.
    AmbiguousBatchAttribution,
}

/// One slip update: the slip receives (or gives back) `amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlipPosting {
    pub slip_id: SlipId,
    pub amount: u64,
}

/// The postings a voucher settles against a single batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub batch_id: PayrollBatchId,
    pub postings: Vec<SlipPosting>,
}

/// The single batch a voucher's funded payroll lines attribute to.
///
/// Callers use this to know which roster to fetch before calling [`plan`].
pub fn attributed_batch(lines: &[PaymentLine]) -> Result<PayrollBatchId, SettlementSkip> {
    let mut funded = lines.iter().filter(|l| l.debit > 0);
    let batch_id = funded.next().ok_or(SettlementSkip::NoPayrollLines)?.batch_id;
    if funded.any(|l| l.batch_id != batch_id) {
        return Err(SettlementSkip::AmbiguousBatchAttribution);
    }
    Ok(batch_id)
}

/// Decide the settlement for a voucher's payroll lines against a batch
/// roster of `(slip, payee)` pairs.
///
/// Matching is by payee equality only. A batch holding several slips for
/// one payee gives each the full line debit independently (all-pairs join;
/// batches are small, one slip per payee is the common case). Lines whose
/// payee has no slip contribute nothing.
pub fn plan(
    lines: &[PaymentLine],
    roster: &[(SlipId, EmployeeId)],
) -> Result<SettlementPlan, SettlementSkip> {
    let batch_id = attributed_batch(lines)?;
    let funded: Vec<&PaymentLine> = lines.iter().filter(|l| l.debit > 0).collect();

    let mut postings = Vec::new();
    for line in &funded {
        for (slip_id, payee) in roster {
            if Some(*payee) == line.payee {
                postings.push(SlipPosting {
                    slip_id: *slip_id,
                    amount: line.debit,
                });
            }
        }
    }

    Ok(SettlementPlan { batch_id, postings })
}
