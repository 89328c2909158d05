//! Projection implementations (read model builders).
//!
//! Projections consume voucher events off the bus and build query-optimized
//! read models. They are rebuildable from the event stream, tenant-isolated,
//! and idempotent under at-least-once delivery.

pub mod payroll_payable;

pub use payroll_payable::{PayrollPayableProjection, PayrollPayableProjectionError};
