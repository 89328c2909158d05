use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use payforge_core::{Aggregate, AggregateId, AggregateRoot, DomainError, EmployeeId, TenantId};
use payforge_events::Event;

use crate::batch::PayrollBatchId;
use crate::component::{ComponentCode, ComponentKind, PayComponent};
use crate::status::PaymentStatus;
use crate::tax::TaxBreakup;

/// Salary slip identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlipId(pub AggregateId);

impl SlipId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SlipId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Document lifecycle of a slip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlipState {
    Draft,
    Finalized,
    Cancelled,
}

/// Replacement figures produced by a recalculation pass.
///
/// The engine computes; the aggregate applies. Keeping the write on the
/// command path means recalculation obeys the same lifecycle rules as any
/// other edit (draft slips only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalcResult {
    pub earnings: Vec<PayComponent>,
    pub deductions: Vec<PayComponent>,
    pub gross_pay: u64,
    pub total_deduction: u64,
    pub net_pay: u64,
    pub tax: TaxBreakup,
}

/// Aggregate root: SalarySlip (one payee's pay result for a period).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalarySlip {
    id: SlipId,
    tenant_id: Option<TenantId>,
    batch_id: Option<PayrollBatchId>,
    employee_id: Option<EmployeeId>,
    period_start: Option<NaiveDate>,
    period_end: Option<NaiveDate>,
    state: SlipState,
    earnings: Vec<PayComponent>,
    deductions: Vec<PayComponent>,
    gross_pay: u64,
    total_deduction: u64,
    net_pay: u64,
    /// Amount settled so far by payment vouchers. Owned by settlement;
    /// nothing else writes it.
    journal_amount: u64,
    payment_status: PaymentStatus,
    tax: TaxBreakup,
    version: u64,
    created: bool,
}

/// Sum of component amounts that count toward totals.
fn total_of(components: &[PayComponent]) -> u64 {
    components
        .iter()
        .filter(|c| c.in_total())
        .map(|c| c.amount)
        .sum()
}

impl SalarySlip {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SlipId) -> Self {
        Self {
            id,
            tenant_id: None,
            batch_id: None,
            employee_id: None,
            period_start: None,
            period_end: None,
            state: SlipState::Draft,
            earnings: Vec::new(),
            deductions: Vec::new(),
            gross_pay: 0,
            total_deduction: 0,
            net_pay: 0,
            journal_amount: 0,
            payment_status: PaymentStatus::Unpaid,
            tax: TaxBreakup::default(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SlipId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn batch_id(&self) -> Option<PayrollBatchId> {
        self.batch_id
    }

    pub fn employee_id(&self) -> Option<EmployeeId> {
        self.employee_id
    }

    pub fn state(&self) -> SlipState {
        self.state
    }

    pub fn earnings(&self) -> &[PayComponent] {
        &self.earnings
    }

    pub fn deductions(&self) -> &[PayComponent] {
        &self.deductions
    }

    pub fn gross_pay(&self) -> u64 {
        self.gross_pay
    }

    pub fn total_deduction(&self) -> u64 {
        self.total_deduction
    }

    pub fn net_pay(&self) -> u64 {
        self.net_pay
    }

    pub fn journal_amount(&self) -> u64 {
        self.journal_amount
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn tax(&self) -> &TaxBreakup {
        &self.tax
    }

    pub fn is_draft(&self) -> bool {
        self.state == SlipState::Draft
    }

    /// Slip originates from a payroll run (as opposed to a manual one-off).
    pub fn from_batch(&self) -> bool {
        self.batch_id.is_some()
    }

    /// Does the slip carry any of the given deduction components?
    pub fn has_dependent_component(&self, dependent: &[ComponentCode]) -> bool {
        self.deductions
            .iter()
            .any(|d| dependent.contains(&d.component))
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_slip_id(&self, slip_id: SlipId) -> Result<(), DomainError> {
        if self.id != slip_id {
            return Err(DomainError::invariant("slip_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self, what: &str) -> Result<(), DomainError> {
        if self.state != SlipState::Draft {
            return Err(DomainError::validation(format!(
                "{what} is only allowed on draft slips"
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for SalarySlip {
    type Id = SlipId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: DraftSlip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSlip {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    pub batch_id: Option<PayrollBatchId>,
    pub employee_id: EmployeeId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub earnings: Vec<PayComponent>,
    pub deductions: Vec<PayComponent>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateEarnings (manual edit of a draft slip's earnings rows).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEarnings {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    pub earnings: Vec<PayComponent>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyRecalculation (install engine-produced figures).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyRecalculation {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    pub result: RecalcResult,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FinalizeSlip (net pay becomes fixed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeSlip {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelSlip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSlip {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment (a settling voucher line hit this slip).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    /// Payment amount in smallest currency unit.
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReversePayment (the settling voucher was cancelled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversePayment {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlipCommand {
    DraftSlip(DraftSlip),
    UpdateEarnings(UpdateEarnings),
    ApplyRecalculation(ApplyRecalculation),
    FinalizeSlip(FinalizeSlip),
    CancelSlip(CancelSlip),
    RecordPayment(RecordPayment),
    ReversePayment(ReversePayment),
}

/// Event: SlipDrafted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlipDrafted {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    pub batch_id: Option<PayrollBatchId>,
    pub employee_id: EmployeeId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub earnings: Vec<PayComponent>,
    pub deductions: Vec<PayComponent>,
    pub gross_pay: u64,
    pub total_deduction: u64,
    pub net_pay: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EarningsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsUpdated {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    pub earnings: Vec<PayComponent>,
    pub gross_pay: u64,
    pub net_pay: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SlipRecalculated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlipRecalculated {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    pub result: RecalcResult,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SlipFinalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlipFinalized {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    pub net_pay: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SlipCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlipCancelled {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    pub amount: u64,
    /// Running settled amount after this payment.
    pub journal_amount: u64,
    pub payment_status: PaymentStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentReversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReversed {
    pub tenant_id: TenantId,
    pub slip_id: SlipId,
    pub amount: u64,
    pub journal_amount: u64,
    pub payment_status: PaymentStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlipEvent {
    SlipDrafted(SlipDrafted),
    EarningsUpdated(EarningsUpdated),
    SlipRecalculated(SlipRecalculated),
    SlipFinalized(SlipFinalized),
    SlipCancelled(SlipCancelled),
    PaymentRecorded(PaymentRecorded),
    PaymentReversed(PaymentReversed),
}

impl Event for SlipEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SlipEvent::SlipDrafted(_) => "payroll.slip.drafted",
            SlipEvent::EarningsUpdated(_) => "payroll.slip.earnings_updated",
            SlipEvent::SlipRecalculated(_) => "payroll.slip.recalculated",
            SlipEvent::SlipFinalized(_) => "payroll.slip.finalized",
            SlipEvent::SlipCancelled(_) => "payroll.slip.cancelled",
            SlipEvent::PaymentRecorded(_) => "payroll.slip.payment_recorded",
            SlipEvent::PaymentReversed(_) => "payroll.slip.payment_reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SlipEvent::SlipDrafted(e) => e.occurred_at,
            SlipEvent::EarningsUpdated(e) => e.occurred_at,
            SlipEvent::SlipRecalculated(e) => e.occurred_at,
            SlipEvent::SlipFinalized(e) => e.occurred_at,
            SlipEvent::SlipCancelled(e) => e.occurred_at,
            SlipEvent::PaymentRecorded(e) => e.occurred_at,
            SlipEvent::PaymentReversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SalarySlip {
    type Command = SlipCommand;
    type Event = SlipEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SlipEvent::SlipDrafted(e) => {
                self.id = e.slip_id;
                self.tenant_id = Some(e.tenant_id);
                self.batch_id = e.batch_id;
                self.employee_id = Some(e.employee_id);
                self.period_start = Some(e.period_start);
                self.period_end = Some(e.period_end);
                self.earnings = e.earnings.clone();
                self.deductions = e.deductions.clone();
                self.gross_pay = e.gross_pay;
                self.total_deduction = e.total_deduction;
                self.net_pay = e.net_pay;
                self.journal_amount = 0;
                self.payment_status = PaymentStatus::Unpaid;
                self.state = SlipState::Draft;
                self.created = true;
            }
            SlipEvent::EarningsUpdated(e) => {
                self.earnings = e.earnings.clone();
                self.gross_pay = e.gross_pay;
                self.net_pay = e.net_pay;
            }
            SlipEvent::SlipRecalculated(e) => {
                self.earnings = e.result.earnings.clone();
                self.deductions = e.result.deductions.clone();
                self.gross_pay = e.result.gross_pay;
                self.total_deduction = e.result.total_deduction;
                self.net_pay = e.result.net_pay;
                self.tax = e.result.tax;
            }
            SlipEvent::SlipFinalized(_) => {
                self.state = SlipState::Finalized;
            }
            SlipEvent::SlipCancelled(_) => {
                self.state = SlipState::Cancelled;
            }
            SlipEvent::PaymentRecorded(e) => {
                self.journal_amount = e.journal_amount;
                self.payment_status = e.payment_status;
            }
            SlipEvent::PaymentReversed(e) => {
                self.journal_amount = e.journal_amount;
                self.payment_status = e.payment_status;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SlipCommand::DraftSlip(cmd) => self.handle_draft(cmd),
            SlipCommand::UpdateEarnings(cmd) => self.handle_update_earnings(cmd),
            SlipCommand::ApplyRecalculation(cmd) => self.handle_apply_recalc(cmd),
            SlipCommand::FinalizeSlip(cmd) => self.handle_finalize(cmd),
            SlipCommand::CancelSlip(cmd) => self.handle_cancel(cmd),
            SlipCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
            SlipCommand::ReversePayment(cmd) => self.handle_reverse_payment(cmd),
        }
    }
}

impl SalarySlip {
    fn handle_draft(&self, cmd: &DraftSlip) -> Result<Vec<SlipEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("slip already exists"));
        }
        if cmd.period_end < cmd.period_start {
            return Err(DomainError::validation("period end before period start"));
        }
        if let Some(c) = cmd
            .earnings
            .iter()
            .find(|c| c.kind != ComponentKind::Earning)
            .or_else(|| {
                cmd.deductions
                    .iter()
                    .find(|c| c.kind != ComponentKind::Deduction)
            })
        {
            return Err(DomainError::validation(format!(
                "component {} listed on the wrong side",
                c.component
            )));
        }

        let gross_pay = total_of(&cmd.earnings);
        let total_deduction = total_of(&cmd.deductions);

        Ok(vec![SlipEvent::SlipDrafted(SlipDrafted {
            tenant_id: cmd.tenant_id,
            slip_id: cmd.slip_id,
            batch_id: cmd.batch_id,
            employee_id: cmd.employee_id,
            period_start: cmd.period_start,
            period_end: cmd.period_end,
            earnings: cmd.earnings.clone(),
            deductions: cmd.deductions.clone(),
            gross_pay,
            total_deduction,
            net_pay: gross_pay.saturating_sub(total_deduction),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_earnings(&self, cmd: &UpdateEarnings) -> Result<Vec<SlipEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_slip_id(cmd.slip_id)?;
        self.ensure_draft("editing earnings")?;

        let gross_pay = total_of(&cmd.earnings);

        Ok(vec![SlipEvent::EarningsUpdated(EarningsUpdated {
            tenant_id: cmd.tenant_id,
            slip_id: cmd.slip_id,
            earnings: cmd.earnings.clone(),
            gross_pay,
            // Deductions are stale until the next recalculation pass.
            net_pay: gross_pay.saturating_sub(self.total_deduction),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_apply_recalc(&self, cmd: &ApplyRecalculation) -> Result<Vec<SlipEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_slip_id(cmd.slip_id)?;
        self.ensure_draft("recalculation")?;

        Ok(vec![SlipEvent::SlipRecalculated(SlipRecalculated {
            tenant_id: cmd.tenant_id,
            slip_id: cmd.slip_id,
            result: cmd.result.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_finalize(&self, cmd: &FinalizeSlip) -> Result<Vec<SlipEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_slip_id(cmd.slip_id)?;
        self.ensure_draft("finalization")?;

        Ok(vec![SlipEvent::SlipFinalized(SlipFinalized {
            tenant_id: cmd.tenant_id,
            slip_id: cmd.slip_id,
            net_pay: self.net_pay,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelSlip) -> Result<Vec<SlipEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_slip_id(cmd.slip_id)?;

        if self.state == SlipState::Cancelled {
            return Err(DomainError::conflict("slip is already cancelled"));
        }

        Ok(vec![SlipEvent::SlipCancelled(SlipCancelled {
            tenant_id: cmd.tenant_id,
            slip_id: cmd.slip_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_payment(&self, cmd: &RecordPayment) -> Result<Vec<SlipEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_slip_id(cmd.slip_id)?;

        if cmd.amount == 0 {
            return Err(DomainError::validation("payment amount must be positive"));
        }

        // No overpay guard: the settled amount may exceed net pay; status
        // saturates at Paid. Clamping here would make voucher cancellation
        // lose information.
        let journal_amount = self
            .journal_amount
            .checked_add(cmd.amount)
            .ok_or_else(|| DomainError::invariant("settled amount overflow"))?;

        Ok(vec![SlipEvent::PaymentRecorded(PaymentRecorded {
            tenant_id: cmd.tenant_id,
            slip_id: cmd.slip_id,
            amount: cmd.amount,
            journal_amount,
            payment_status: PaymentStatus::derive(journal_amount, self.net_pay),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse_payment(&self, cmd: &ReversePayment) -> Result<Vec<SlipEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_slip_id(cmd.slip_id)?;

        if cmd.amount == 0 {
            return Err(DomainError::validation("payment amount must be positive"));
        }

        // Floors at zero: reversing more than was settled is not an error,
        // repeated reversals of the same voucher just stay at zero.
        let journal_amount = self.journal_amount.saturating_sub(cmd.amount);

        Ok(vec![SlipEvent::PaymentReversed(PaymentReversed {
            tenant_id: cmd.tenant_id,
            slip_id: cmd.slip_id,
            amount: cmd.amount,
            journal_amount,
            payment_status: PaymentStatus::derive(journal_amount, self.net_pay),
            occurred_at: cmd.occurred_at,
        })])
    }
}
