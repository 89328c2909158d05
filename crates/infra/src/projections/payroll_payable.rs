//! Payroll Payable Projection.
//!
//! Tracks per-batch payroll liabilities from submitted vouchers: credits
//! referencing a batch accrue what is owed, debits record what was paid,
//! cancellation reverses both. Feeds the payables aging report.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use payforge_core::{AggregateId, TenantId};
use payforge_events::EventEnvelope;
use payforge_payroll::PayrollBatchId;
use payforge_reports::PayrollLiability;
use payforge_vouchers::{VoucherEvent, VoucherLine};

use crate::dispatcher::VOUCHER_AGGREGATE_TYPE;
use crate::read_model::TenantStore;

/// Tenant+aggregate cursor for idempotent projection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum PayrollPayableProjectionError {
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Payroll payable projection: per-batch invoiced/paid running totals.
///
/// - Submitted vouchers add credits (owed) and debits (paid) per batch line
/// - Cancelled vouchers take the same amounts back
/// - A batch whose totals return to zero drops out of the read model
///
/// Rebuildable from voucher events. Tenant-isolated.
#[derive(Debug)]
pub struct PayrollPayableProjection<S>
where
    S: TenantStore<PayrollBatchId, PayrollLiability>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> PayrollPayableProjection<S>
where
    S: TenantStore<PayrollBatchId, PayrollLiability>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn get_cursor(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors
                .get(&CursorKey {
                    tenant_id,
                    aggregate_id,
                })
                .unwrap_or(&0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, tenant_id: TenantId, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(
                CursorKey {
                    tenant_id,
                    aggregate_id,
                },
                sequence_number,
            );
        }
    }

    fn clear_cursors(&self, tenant_id: TenantId) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.retain(|k, _| k.tenant_id != tenant_id);
        }
    }

    /// Get one batch's liability.
    pub fn get(&self, tenant_id: TenantId, batch_id: &PayrollBatchId) -> Option<PayrollLiability> {
        self.store.get(tenant_id, batch_id)
    }

    /// All liabilities for a tenant (report input).
    pub fn list(&self, tenant_id: TenantId) -> Vec<PayrollLiability> {
        let mut liabilities = self.store.list(tenant_id);
        liabilities.sort_by_key(|l| *l.batch_id.0.as_uuid());
        liabilities
    }

    /// Apply envelope into the payroll payable read model.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<VoucherEvent>,
    ) -> Result<(), PayrollPayableProjectionError> {
        if envelope.aggregate_type() != VOUCHER_AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(tenant_id, aggregate_id);

        if seq == 0 {
            return Err(PayrollPayableProjectionError::NonMonotonicSequence { last, found: seq });
        }

        if seq <= last {
            return Ok(());
        }

        if seq != last + 1 && last != 0 {
            return Err(PayrollPayableProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev = envelope.payload();

        let (event_tenant, voucher_id) = match ev {
            VoucherEvent::VoucherCreated(e) => (e.tenant_id, e.voucher_id),
            VoucherEvent::VoucherSubmitted(e) => (e.tenant_id, e.voucher_id),
            VoucherEvent::VoucherCancelled(e) => (e.tenant_id, e.voucher_id),
        };

        if event_tenant != tenant_id {
            return Err(PayrollPayableProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }

        if voucher_id.0 != aggregate_id {
            return Err(PayrollPayableProjectionError::TenantIsolation(
                "event voucher_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            VoucherEvent::VoucherCreated(_) => {
                // Draft vouchers carry no liability.
            }
            VoucherEvent::VoucherSubmitted(e) => {
                self.accumulate(tenant_id, e.posting_date, &e.lines, false);
            }
            VoucherEvent::VoucherCancelled(e) => {
                self.accumulate(tenant_id, e.posting_date, &e.lines, true);
            }
        }

        self.update_cursor(tenant_id, aggregate_id, seq);
        Ok(())
    }

    fn accumulate(
        &self,
        tenant_id: TenantId,
        posting_date: chrono::NaiveDate,
        lines: &[VoucherLine],
        reverse: bool,
    ) {
        for line in lines {
            let Some(batch_id) = line.referenced_batch() else {
                continue;
            };

            let mut liability = self.store.get(tenant_id, &batch_id).unwrap_or_else(|| {
                PayrollLiability {
                    batch_id,
                    account: line.account.name.clone(),
                    posting_date,
                    invoiced: 0,
                    paid: 0,
                }
            });

            if reverse {
                liability.invoiced = liability.invoiced.saturating_sub(line.credit);
                liability.paid = liability.paid.saturating_sub(line.debit);
            } else {
                liability.invoiced += line.credit;
                liability.paid += line.debit;
            }

            if liability.invoiced == 0 && liability.paid == 0 {
                self.store.remove(tenant_id, &batch_id);
            } else {
                self.store.upsert(tenant_id, batch_id, liability);
            }
        }
    }

    /// Rebuild the read model from scratch.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<VoucherEvent>>,
    ) -> Result<(), PayrollPayableProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
            tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
            tenants.dedup();
            for t in tenants {
                self.store.clear_tenant(t);
                self.clear_cursors(t);
            }
        }

        envs.sort_by_key(|e| {
            (
                *e.tenant_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_model::InMemoryTenantStore;
    use chrono::NaiveDate;
    use payforge_core::EmployeeId;
    use payforge_vouchers::voucher::{VoucherCancelled, VoucherSubmitted};
    use payforge_vouchers::{Account, AccountKind, LineReference, VoucherId};
    use std::sync::Arc;

    fn make_envelope(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
        event: VoucherEvent,
    ) -> EventEnvelope<VoucherEvent> {
        EventEnvelope::new(
            uuid::Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            VOUCHER_AGGREGATE_TYPE,
            seq,
            event,
        )
    }

    fn payable_account() -> Account {
        Account {
            code: "2110".to_string(),
            name: "Payroll Payable".to_string(),
            kind: AccountKind::Liability,
        }
    }

    fn batch_line(batch_id: PayrollBatchId, debit: u64, credit: u64) -> VoucherLine {
        VoucherLine {
            account: payable_account(),
            reference: Some(LineReference::PayrollBatch { batch_id }),
            party: Some(EmployeeId::new()),
            debit,
            credit,
        }
    }

    fn bank_line(debit: u64, credit: u64) -> VoucherLine {
        VoucherLine {
            account: Account {
                code: "1000".to_string(),
                name: "Bank".to_string(),
                kind: AccountKind::Asset,
            },
            reference: None,
            party: None,
            debit,
            credit,
        }
    }

    fn posting_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 31).unwrap()
    }

    fn submitted(
        tenant_id: TenantId,
        voucher_id: VoucherId,
        lines: Vec<VoucherLine>,
    ) -> VoucherEvent {
        VoucherEvent::VoucherSubmitted(VoucherSubmitted {
            tenant_id,
            voucher_id,
            posting_date: posting_date(),
            lines,
            occurred_at: chrono::Utc::now(),
        })
    }

    fn cancelled(
        tenant_id: TenantId,
        voucher_id: VoucherId,
        lines: Vec<VoucherLine>,
    ) -> VoucherEvent {
        VoucherEvent::VoucherCancelled(VoucherCancelled {
            tenant_id,
            voucher_id,
            posting_date: posting_date(),
            lines,
            occurred_at: chrono::Utc::now(),
        })
    }

    fn projection() -> PayrollPayableProjection<
        Arc<InMemoryTenantStore<PayrollBatchId, PayrollLiability>>,
    > {
        PayrollPayableProjection::new(Arc::new(InMemoryTenantStore::new()))
    }

    #[test]
    fn accrual_then_payment_tracks_outstanding() {
        let proj = projection();
        let tenant_id = TenantId::new();
        let batch_id = PayrollBatchId::new(AggregateId::new());

        // Accrual voucher: expense debit, payable credit against the batch.
        let accrual_id = VoucherId::new(AggregateId::new());
        proj.apply_envelope(&make_envelope(
            tenant_id,
            accrual_id.0,
            1,
            submitted(
                tenant_id,
                accrual_id,
                vec![bank_line(5000, 0), batch_line(batch_id, 0, 5000)],
            ),
        ))
        .unwrap();

        let liability = proj.get(tenant_id, &batch_id).unwrap();
        assert_eq!(liability.invoiced, 5000);
        assert_eq!(liability.paid, 0);
        assert_eq!(liability.outstanding(), 5000);

        // Payment voucher: payable debit against the batch, bank credit.
        let payment_id = VoucherId::new(AggregateId::new());
        proj.apply_envelope(&make_envelope(
            tenant_id,
            payment_id.0,
            1,
            submitted(
                tenant_id,
                payment_id,
                vec![batch_line(batch_id, 2000, 0), bank_line(0, 2000)],
            ),
        ))
        .unwrap();

        let liability = proj.get(tenant_id, &batch_id).unwrap();
        assert_eq!(liability.paid, 2000);
        assert_eq!(liability.outstanding(), 3000);
    }

    #[test]
    fn cancellation_restores_the_previous_totals() {
        let proj = projection();
        let tenant_id = TenantId::new();
        let batch_id = PayrollBatchId::new(AggregateId::new());
        let voucher_id = VoucherId::new(AggregateId::new());
        let lines = vec![batch_line(batch_id, 2000, 0), bank_line(0, 2000)];

        proj.apply_envelope(&make_envelope(
            tenant_id,
            voucher_id.0,
            1,
            submitted(tenant_id, voucher_id, lines.clone()),
        ))
        .unwrap();
        proj.apply_envelope(&make_envelope(
            tenant_id,
            voucher_id.0,
            2,
            cancelled(tenant_id, voucher_id, lines),
        ))
        .unwrap();

        // Fully unwound: the batch drops out of the read model.
        assert!(proj.get(tenant_id, &batch_id).is_none());
    }

    #[test]
    fn duplicate_delivery_is_idempotent() {
        let proj = projection();
        let tenant_id = TenantId::new();
        let batch_id = PayrollBatchId::new(AggregateId::new());
        let voucher_id = VoucherId::new(AggregateId::new());

        let env = make_envelope(
            tenant_id,
            voucher_id.0,
            1,
            submitted(
                tenant_id,
                voucher_id,
                vec![bank_line(5000, 0), batch_line(batch_id, 0, 5000)],
            ),
        );

        proj.apply_envelope(&env).unwrap();
        proj.apply_envelope(&env).unwrap();

        assert_eq!(proj.get(tenant_id, &batch_id).unwrap().invoiced, 5000);
    }

    #[test]
    fn gapped_sequence_is_rejected() {
        let proj = projection();
        let tenant_id = TenantId::new();
        let batch_id = PayrollBatchId::new(AggregateId::new());
        let voucher_id = VoucherId::new(AggregateId::new());

        proj.apply_envelope(&make_envelope(
            tenant_id,
            voucher_id.0,
            2,
            submitted(
                tenant_id,
                voucher_id,
                vec![bank_line(100, 0), batch_line(batch_id, 0, 100)],
            ),
        ))
        .unwrap();

        let err = proj
            .apply_envelope(&make_envelope(
                tenant_id,
                voucher_id.0,
                5,
                cancelled(
                    tenant_id,
                    voucher_id,
                    vec![bank_line(100, 0), batch_line(batch_id, 0, 100)],
                ),
            ))
            .unwrap_err();

        match err {
            PayrollPayableProjectionError::NonMonotonicSequence { last: 2, found: 5 } => {}
            other => panic!("Expected sequence error, got {other:?}"),
        }
    }

    #[test]
    fn rebuild_replays_out_of_order_history() {
        let proj = projection();
        let tenant_id = TenantId::new();
        let batch_id = PayrollBatchId::new(AggregateId::new());
        let voucher_id = VoucherId::new(AggregateId::new());

        let submit = make_envelope(
            tenant_id,
            voucher_id.0,
            1,
            submitted(
                tenant_id,
                voucher_id,
                vec![bank_line(5000, 0), batch_line(batch_id, 0, 5000)],
            ),
        );
        let cancel = make_envelope(
            tenant_id,
            voucher_id.0,
            2,
            cancelled(
                tenant_id,
                voucher_id,
                vec![bank_line(5000, 0), batch_line(batch_id, 0, 5000)],
            ),
        );

        proj.rebuild_from_scratch(vec![cancel, submit]).unwrap();
        assert!(proj.get(tenant_id, &batch_id).is_none());
    }
}
