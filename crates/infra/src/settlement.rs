//! Voucher-driven slip settlement (the payment reconciliation hook).
//!
//! Runs synchronously inside the voucher transition: submit records the
//! voucher's payroll debits against the batch's slips, cancel takes them
//! back. Unrelated or malformed vouchers are skips, never errors; only a
//! store failure (or a broken slip invariant) aborts the transition.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use payforge_core::{DomainError, TenantId};
use payforge_events::execute;
use payforge_payroll::settlement::{self, SettlementSkip, SlipPosting};
use payforge_payroll::slip::{RecordPayment, ReversePayment};
use payforge_payroll::{PayrollBatchId, SalarySlip, SlipCommand, SlipId};
use payforge_vouchers::voucher::{VoucherCancelled, VoucherSubmitted, payroll_payment_lines};
use payforge_vouchers::{VoucherEvent, VoucherLine};

use crate::documents::{SlipStore, SlipStoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error(transparent)]
    Store(#[from] SlipStoreError),

    /// A slip rejected the payment command (e.g. amount overflow).
    #[error("slip update failed: {0}")]
    Slip(#[from] DomainError),
}

/// What a voucher event did to the batch's slips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    Applied {
        batch_id: PayrollBatchId,
        slips_updated: usize,
    },
    Reversed {
        batch_id: PayrollBatchId,
        slips_updated: usize,
    },
    /// The voucher does not settle exactly one payroll batch.
    Skipped(SettlementSkip),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Apply,
    Reverse,
}

/// Synchronous settlement handler over a slip store.
pub struct SettlementHandler<S: SlipStore> {
    store: S,
}

impl<S: SlipStore> SettlementHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Entry point: a voucher transitioned to Submitted.
    pub fn on_voucher_submitted(
        &self,
        event: &VoucherSubmitted,
    ) -> Result<SettlementOutcome, SettlementError> {
        self.settle(event.tenant_id, &event.lines, Direction::Apply)
    }

    /// Entry point: a voucher transitioned to Cancelled.
    pub fn on_voucher_cancelled(
        &self,
        event: &VoucherCancelled,
    ) -> Result<SettlementOutcome, SettlementError> {
        self.settle(event.tenant_id, &event.lines, Direction::Reverse)
    }

    /// Dispatch on any voucher event; non-transition events are skips.
    pub fn on_voucher_event(
        &self,
        event: &VoucherEvent,
    ) -> Result<Option<SettlementOutcome>, SettlementError> {
        match event {
            VoucherEvent::VoucherSubmitted(e) => self.on_voucher_submitted(e).map(Some),
            VoucherEvent::VoucherCancelled(e) => self.on_voucher_cancelled(e).map(Some),
            VoucherEvent::VoucherCreated(_) => Ok(None),
        }
    }

    fn settle(
        &self,
        tenant_id: TenantId,
        lines: &[VoucherLine],
        direction: Direction,
    ) -> Result<SettlementOutcome, SettlementError> {
        let payment_lines = payroll_payment_lines(lines);

        let batch_id = match settlement::attributed_batch(&payment_lines) {
            Ok(batch_id) => batch_id,
            Err(skip) => {
                debug!(?skip, "voucher does not settle a payroll batch");
                return Ok(SettlementOutcome::Skipped(skip));
            }
        };

        let slips = self.store.list_by_batch(tenant_id, batch_id)?;
        let roster: Vec<(SlipId, _)> = slips
            .iter()
            .filter_map(|s| s.employee_id().map(|e| (s.id_typed(), e)))
            .collect();

        let plan = match settlement::plan(&payment_lines, &roster) {
            Ok(plan) => plan,
            Err(skip) => return Ok(SettlementOutcome::Skipped(skip)),
        };

        let mut by_id: HashMap<SlipId, SalarySlip> =
            slips.into_iter().map(|s| (s.id_typed(), s)).collect();
        let mut touched: Vec<SlipId> = Vec::new();

        for SlipPosting { slip_id, amount } in &plan.postings {
            let Some(slip) = by_id.get_mut(slip_id) else {
                continue;
            };

            let occurred_at = chrono::Utc::now();
            let command = match direction {
                Direction::Apply => SlipCommand::RecordPayment(RecordPayment {
                    tenant_id,
                    slip_id: *slip_id,
                    amount: *amount,
                    occurred_at,
                }),
                Direction::Reverse => SlipCommand::ReversePayment(ReversePayment {
                    tenant_id,
                    slip_id: *slip_id,
                    amount: *amount,
                    occurred_at,
                }),
            };
            execute(slip, &command)?;

            if !touched.contains(slip_id) {
                touched.push(*slip_id);
            }
        }

        for slip_id in &touched {
            // Whole-document save; a failure propagates and the enclosing
            // transition aborts with it.
            self.store.save(tenant_id, &by_id[slip_id])?;
        }

        let slips_updated = touched.len();
        match direction {
            Direction::Apply => {
                info!(%batch_id, slips_updated, "recorded voucher payment against batch");
                Ok(SettlementOutcome::Applied {
                    batch_id,
                    slips_updated,
                })
            }
            Direction::Reverse => {
                info!(%batch_id, slips_updated, "reversed voucher payment against batch");
                Ok(SettlementOutcome::Reversed {
                    batch_id,
                    slips_updated,
                })
            }
        }
    }
}
