//! `payforge-vouchers` — payment voucher (accounting journal entry) domain.

pub mod voucher;

pub use voucher::{
    Account, AccountKind, CancelVoucher, CreateVoucher, LineReference, PaymentVoucher,
    SubmitVoucher, VoucherCommand, VoucherEvent, VoucherId, VoucherLine, VoucherStatus,
    payroll_payment_lines,
};
