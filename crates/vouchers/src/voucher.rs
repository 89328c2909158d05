use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use payforge_core::{Aggregate, AggregateId, AggregateRoot, DomainError, EmployeeId, TenantId};
use payforge_events::Event;
use payforge_payroll::settlement::PaymentLine;
use payforge_payroll::{PayrollBatchId, SlipId};

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

/// Account identifier + metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub code: String, // e.g. "2110"
    pub name: String, // e.g. "Payroll Payable"
    pub kind: AccountKind,
}

/// What a voucher line settles against, if anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineReference {
    /// The line pays (or accrues) a payroll batch.
    PayrollBatch { batch_id: PayrollBatchId },
    /// The line targets one slip directly.
    SalarySlip { slip_id: SlipId },
    /// Any other document kind; opaque to this layer.
    Other { doctype: String, name: String },
}

/// One line of a payment voucher (immutable once the voucher is created).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherLine {
    pub account: Account,
    pub reference: Option<LineReference>,
    /// Payee party, when the line concerns one employee.
    pub party: Option<EmployeeId>,
    /// Amounts in smallest currency unit; a line uses one side.
    pub debit: u64,
    pub credit: u64,
}

impl VoucherLine {
    /// Settlement view of this line, if it references a payroll batch.
    pub fn payroll_payment(&self) -> Option<PaymentLine> {
        match &self.reference {
            Some(LineReference::PayrollBatch { batch_id }) => Some(PaymentLine {
                batch_id: *batch_id,
                payee: self.party,
                debit: self.debit,
            }),
            _ => None,
        }
    }

    /// Batch this line accrues or settles, regardless of side.
    pub fn referenced_batch(&self) -> Option<PayrollBatchId> {
        match &self.reference {
            Some(LineReference::PayrollBatch { batch_id }) => Some(*batch_id),
            _ => None,
        }
    }
}

/// Settlement views of every payroll-batch line on a voucher.
pub fn payroll_payment_lines(lines: &[VoucherLine]) -> Vec<PaymentLine> {
    lines.iter().filter_map(|l| l.payroll_payment()).collect()
}

/// Voucher identifier (aggregate id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoucherId(pub AggregateId);

impl VoucherId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for VoucherId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Voucher lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherStatus {
    Draft,
    Submitted,
    Cancelled,
}

/// Aggregate root: PaymentVoucher (double-entry journal document).
///
/// The voucher holds its lines; postings to payroll slips are derived by
/// the settlement handler from the submit/cancel events, never stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentVoucher {
    id: VoucherId,
    tenant_id: Option<TenantId>,
    status: VoucherStatus,
    posting_date: Option<NaiveDate>,
    lines: Vec<VoucherLine>,
    version: u64,
    created: bool,
}

impl PaymentVoucher {
    /// Empty aggregate for rehydration.
    pub fn empty(id: VoucherId) -> Self {
        Self {
            id,
            tenant_id: None,
            status: VoucherStatus::Draft,
            posting_date: None,
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> VoucherId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn status(&self) -> VoucherStatus {
        self.status
    }

    pub fn posting_date(&self) -> Option<NaiveDate> {
        self.posting_date
    }

    pub fn lines(&self) -> &[VoucherLine] {
        &self.lines
    }
}

impl AggregateRoot for PaymentVoucher {
    type Id = VoucherId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateVoucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVoucher {
    pub tenant_id: TenantId,
    pub voucher_id: VoucherId,
    pub posting_date: NaiveDate,
    pub lines: Vec<VoucherLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitVoucher (post the journal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitVoucher {
    pub tenant_id: TenantId,
    pub voucher_id: VoucherId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelVoucher (reverse the posting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelVoucher {
    pub tenant_id: TenantId,
    pub voucher_id: VoucherId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoucherCommand {
    CreateVoucher(CreateVoucher),
    SubmitVoucher(SubmitVoucher),
    CancelVoucher(CancelVoucher),
}

/// Event: VoucherCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherCreated {
    pub tenant_id: TenantId,
    pub voucher_id: VoucherId,
    pub posting_date: NaiveDate,
    pub lines: Vec<VoucherLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VoucherSubmitted.
///
/// Carries the line snapshot so settlement and projections work from the
/// event alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherSubmitted {
    pub tenant_id: TenantId,
    pub voucher_id: VoucherId,
    pub posting_date: NaiveDate,
    pub lines: Vec<VoucherLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VoucherCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherCancelled {
    pub tenant_id: TenantId,
    pub voucher_id: VoucherId,
    pub posting_date: NaiveDate,
    pub lines: Vec<VoucherLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoucherEvent {
    VoucherCreated(VoucherCreated),
    VoucherSubmitted(VoucherSubmitted),
    VoucherCancelled(VoucherCancelled),
}

impl Event for VoucherEvent {
    fn event_type(&self) -> &'static str {
        match self {
            VoucherEvent::VoucherCreated(_) => "vouchers.voucher.created",
            VoucherEvent::VoucherSubmitted(_) => "vouchers.voucher.submitted",
            VoucherEvent::VoucherCancelled(_) => "vouchers.voucher.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            VoucherEvent::VoucherCreated(e) => e.occurred_at,
            VoucherEvent::VoucherSubmitted(e) => e.occurred_at,
            VoucherEvent::VoucherCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PaymentVoucher {
    type Command = VoucherCommand;
    type Event = VoucherEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            VoucherEvent::VoucherCreated(e) => {
                self.id = e.voucher_id;
                self.tenant_id = Some(e.tenant_id);
                self.posting_date = Some(e.posting_date);
                self.lines = e.lines.clone();
                self.status = VoucherStatus::Draft;
                self.created = true;
            }
            VoucherEvent::VoucherSubmitted(_) => {
                self.status = VoucherStatus::Submitted;
            }
            VoucherEvent::VoucherCancelled(_) => {
                self.status = VoucherStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            VoucherCommand::CreateVoucher(cmd) => self.handle_create(cmd),
            VoucherCommand::SubmitVoucher(cmd) => self.handle_submit(cmd),
            VoucherCommand::CancelVoucher(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl PaymentVoucher {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_voucher_id(&self, voucher_id: VoucherId) -> Result<(), DomainError> {
        if self.id != voucher_id {
            return Err(DomainError::invariant("voucher_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateVoucher) -> Result<Vec<VoucherEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("voucher already exists"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("voucher must have lines"));
        }

        for line in &cmd.lines {
            if line.debit > 0 && line.credit > 0 {
                return Err(DomainError::validation(
                    "voucher line cannot carry both debit and credit",
                ));
            }
            if line.debit == 0 && line.credit == 0 {
                return Err(DomainError::validation(
                    "voucher line must carry a debit or a credit",
                ));
            }
        }

        let mut debit_total: u128 = 0;
        let mut credit_total: u128 = 0;
        for line in &cmd.lines {
            debit_total += line.debit as u128;
            credit_total += line.credit as u128;
        }
        if debit_total != credit_total {
            return Err(DomainError::invariant("debits must equal credits"));
        }

        Ok(vec![VoucherEvent::VoucherCreated(VoucherCreated {
            tenant_id: cmd.tenant_id,
            voucher_id: cmd.voucher_id,
            posting_date: cmd.posting_date,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitVoucher) -> Result<Vec<VoucherEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_voucher_id(cmd.voucher_id)?;

        if self.status != VoucherStatus::Draft {
            return Err(DomainError::conflict("only draft vouchers can be submitted"));
        }

        Ok(vec![VoucherEvent::VoucherSubmitted(VoucherSubmitted {
            tenant_id: cmd.tenant_id,
            voucher_id: cmd.voucher_id,
            posting_date: self.posting_date.unwrap_or(cmd.occurred_at.date_naive()),
            lines: self.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelVoucher) -> Result<Vec<VoucherEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_voucher_id(cmd.voucher_id)?;

        if self.status != VoucherStatus::Submitted {
            return Err(DomainError::conflict(
                "only submitted vouchers can be cancelled",
            ));
        }

        Ok(vec![VoucherEvent::VoucherCancelled(VoucherCancelled {
            tenant_id: cmd.tenant_id,
            voucher_id: cmd.voucher_id,
            posting_date: self.posting_date.unwrap_or(cmd.occurred_at.date_naive()),
            lines: self.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
