//! `payforge-payroll` — salary slip domain: components, recalculation,
//! payment settlement.
//!
//! The slip aggregate owns the document lifecycle and the derived payment
//! fields; the recalculation engine re-derives tax-dependent deductions
//! through external formula/tax seams; the settlement module decides how a
//! posted payment voucher distributes across a batch's slips.

pub mod batch;
pub mod component;
pub mod recalc;
pub mod settlement;
pub mod slip;
pub mod status;
pub mod structure;
pub mod tax;
pub mod triggers;

pub use batch::PayrollBatchId;
pub use component::{ComponentCode, ComponentKind, ComponentRegistry, PayComponent};
pub use recalc::{RecalcEngine, RecalcFailurePolicy, RecalcResult};
pub use settlement::{PaymentLine, SettlementPlan, SettlementSkip};
pub use slip::{SalarySlip, SlipCommand, SlipEvent, SlipId, SlipState};
pub use status::PaymentStatus;
pub use structure::{ComponentOverrides, FormulaEngine, SalaryStructure};
pub use tax::{TaxBreakup, TaxEngine};
