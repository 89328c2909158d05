use serde::{Deserialize, Serialize};

/// Derived payment status of a salary slip.
///
/// Recomputed from `(journal_amount, net_pay)` on every settlement change;
/// never stored history, never consulted for its previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
}

impl PaymentStatus {
    /// Derive status from the amount settled so far against net pay.
    ///
    /// The `>=` branch is checked first, so a slip with `net_pay == 0` is
    /// `Paid` at `journal_amount == 0`. Zero-net-pay slips keep that exact
    /// behavior; whether they are expected inputs is the payroll module's
    /// business, not ours.
    pub fn derive(journal_amount: u64, net_pay: u64) -> Self {
        if journal_amount >= net_pay {
            PaymentStatus::Paid
        } else if journal_amount > 0 {
            PaymentStatus::PartiallyPaid
        } else {
            PaymentStatus::Unpaid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaid_below_any_positive_net_pay() {
        assert_eq!(PaymentStatus::derive(0, 1000), PaymentStatus::Unpaid);
    }

    #[test]
    fn partially_paid_between_zero_and_net_pay() {
        assert_eq!(PaymentStatus::derive(1, 1000), PaymentStatus::PartiallyPaid);
        assert_eq!(
            PaymentStatus::derive(999, 1000),
            PaymentStatus::PartiallyPaid
        );
    }

    #[test]
    fn paid_at_and_above_net_pay() {
        assert_eq!(PaymentStatus::derive(1000, 1000), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::derive(1001, 1000), PaymentStatus::Paid);
    }

    #[test]
    fn zero_net_pay_is_paid_even_at_zero() {
        // Boundary kept exactly as the payment hooks always behaved.
        assert_eq!(PaymentStatus::derive(0, 0), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::derive(5, 0), PaymentStatus::Paid);
    }
}
