//! `payforge-reports` — payables aging with payroll liabilities merged in.
//!
//! The host produces the regular accounts-payable rows; this crate turns
//! payroll liability read models into rows of the same shape and splices
//! them into the data set (with subtotal and grand-total handling).

pub mod aging;
pub mod payable;

pub use aging::AgingRanges;
pub use payable::{
    AgingRow, PayablesReportOptions, PayrollLiability, RowKind, extend_with_payroll,
};
