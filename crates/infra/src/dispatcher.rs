//! Voucher lifecycle dispatch (the host-hook pipeline).
//!
//! Order matters: the aggregate decides, settlement runs synchronously,
//! state is applied, envelopes go to the bus. A settlement failure aborts
//! the transition before anything is applied or published — the caller's
//! transaction sees one atomic outcome.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use payforge_core::{Aggregate, AggregateRoot, DomainError, TenantId};
use payforge_events::{Event, EventBus, EventEnvelope};
use payforge_vouchers::voucher::{CancelVoucher, SubmitVoucher};
use payforge_vouchers::{PaymentVoucher, VoucherCommand, VoucherEvent, VoucherId};

use crate::documents::SlipStore;
use crate::settlement::{SettlementError, SettlementHandler, SettlementOutcome};

/// Envelope aggregate type for voucher streams.
pub const VOUCHER_AGGREGATE_TYPE: &str = "vouchers.voucher";

#[derive(Debug)]
pub enum DispatchError {
    /// Domain validation/invariant failure (deterministic).
    Domain(DomainError),
    /// Settlement hook failed; the transition is aborted.
    Settlement(SettlementError),
    /// Publication failed after the transition completed (at-least-once;
    /// retry may duplicate).
    Publish(String),
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        DispatchError::Domain(value)
    }
}

impl From<SettlementError> for DispatchError {
    fn from(value: SettlementError) -> Self {
        DispatchError::Settlement(value)
    }
}

fn identify(voucher: &PaymentVoucher) -> Result<(TenantId, VoucherId), DomainError> {
    let tenant_id = voucher
        .tenant_id()
        .ok_or_else(|| DomainError::invariant("voucher has no tenant"))?;
    Ok((tenant_id, voucher.id_typed()))
}

/// Runs voucher transitions with their document hooks and publication.
pub struct VoucherDispatcher<S: SlipStore, B: EventBus<EventEnvelope<VoucherEvent>>> {
    settlement: SettlementHandler<S>,
    bus: B,
}

impl<S, B> VoucherDispatcher<S, B>
where
    S: SlipStore,
    B: EventBus<EventEnvelope<VoucherEvent>>,
{
    pub fn new(settlement: SettlementHandler<S>, bus: B) -> Self {
        Self { settlement, bus }
    }

    pub fn settlement(&self) -> &SettlementHandler<S> {
        &self.settlement
    }

    /// Submit a voucher: runs settlement, applies, publishes.
    pub fn submit(
        &self,
        voucher: &mut PaymentVoucher,
        occurred_at: DateTime<Utc>,
    ) -> Result<SettlementOutcome, DispatchError> {
        let (tenant_id, voucher_id) = identify(voucher)?;
        self.transition(
            voucher,
            VoucherCommand::SubmitVoucher(SubmitVoucher {
                tenant_id,
                voucher_id,
                occurred_at,
            }),
        )
    }

    /// Cancel a voucher: runs the reverse settlement, applies, publishes.
    pub fn cancel(
        &self,
        voucher: &mut PaymentVoucher,
        occurred_at: DateTime<Utc>,
    ) -> Result<SettlementOutcome, DispatchError> {
        let (tenant_id, voucher_id) = identify(voucher)?;
        self.transition(
            voucher,
            VoucherCommand::CancelVoucher(CancelVoucher {
                tenant_id,
                voucher_id,
                occurred_at,
            }),
        )
    }

    fn transition(
        &self,
        voucher: &mut PaymentVoucher,
        command: VoucherCommand,
    ) -> Result<SettlementOutcome, DispatchError> {
        // Decide first; nothing is applied until the hooks pass.
        let events = voucher.handle(&command)?;

        let mut outcome = None;
        for event in &events {
            if let Some(o) = self.settlement.on_voucher_event(event)? {
                outcome = Some(o);
            }
        }

        let (tenant_id, _) = identify(voucher)?;
        let base_version = voucher.version();

        for (i, event) in events.iter().enumerate() {
            voucher.apply(event);
            debug!(event_type = event.event_type(), voucher = %voucher.id_typed(), "publishing");

            let envelope = EventEnvelope::new(
                Uuid::now_v7(),
                tenant_id,
                voucher.id_typed().0,
                VOUCHER_AGGREGATE_TYPE,
                base_version + i as u64 + 1,
                event.clone(),
            );
            self.bus
                .publish(envelope)
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        // Submit/cancel each emit exactly one settling event.
        outcome.ok_or_else(|| {
            DispatchError::Domain(DomainError::invariant(
                "voucher transition produced no settlement outcome",
            ))
        })
    }
}
