//! Lifecycle trigger gates for automatic recalculation.
//!
//! Two document hooks want the engine: after a slip is inserted (payroll
//! runs create slips whose dependent deductions start stale) and before a
//! draft slip is saved (a manual earnings edit invalidates them). The gates
//! here decide *whether* to run; the hook layer owns *running* (under
//! [`RecalcFailurePolicy::LogAndContinue`](crate::recalc::RecalcFailurePolicy)).

use std::collections::HashMap;

use crate::component::ComponentCode;
use crate::slip::SalarySlip;

/// Earnings state captured before an edit, for change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarningsSnapshot {
    amounts: HashMap<ComponentCode, u64>,
    total: u64,
    gross_pay: u64,
}

impl EarningsSnapshot {
    pub fn of(slip: &SalarySlip) -> Self {
        let mut amounts = HashMap::new();
        let mut total = 0u64;
        for earning in slip.earnings() {
            amounts.insert(earning.component.clone(), earning.amount);
            total = total.saturating_add(earning.amount);
        }
        Self {
            amounts,
            total,
            gross_pay: slip.gross_pay(),
        }
    }

    /// Have the slip's earnings moved relative to this snapshot?
    ///
    /// Per-component amounts and the earnings total are the primary signal;
    /// a gross-pay change is the fallback (it can move without a component
    /// diff when rows are dropped from totals).
    pub fn earnings_changed(&self, slip: &SalarySlip) -> bool {
        let current = EarningsSnapshot::of(slip);
        current.amounts != self.amounts
            || current.total != self.total
            || current.gross_pay != self.gross_pay
    }
}

/// Gate for the after-insert hook.
///
/// Only draft slips that carry a dependent deduction and originate from a
/// payroll run qualify; one-off manual slips are left alone.
pub fn should_recalculate_after_insert(slip: &SalarySlip, dependent: &[ComponentCode]) -> bool {
    slip.is_draft() && slip.has_dependent_component(dependent) && slip.from_batch()
}

/// Gate for the before-save hook.
///
/// Only draft slips with a dependent deduction, and only when earnings
/// actually changed. With no snapshot available the change is assumed (the
/// safer direction: a redundant recalculation beats a stale deduction).
pub fn should_recalculate_before_save(
    slip: &SalarySlip,
    dependent: &[ComponentCode],
    previous: Option<&EarningsSnapshot>,
) -> bool {
    if !slip.is_draft() || !slip.has_dependent_component(dependent) {
        return false;
    }
    previous.is_none_or(|snapshot| snapshot.earnings_changed(slip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentKind, PayComponent};
    use crate::slip::{DraftSlip, FinalizeSlip, SlipCommand, SlipId, UpdateEarnings};
    use crate::PayrollBatchId;
    use chrono::{NaiveDate, Utc};
    use payforge_core::{AggregateId, EmployeeId, TenantId};
    use payforge_events::execute;

    const FUTA: &str = "IRS FUTA Employer Tax";

    fn dependent() -> Vec<ComponentCode> {
        vec![ComponentCode::new(FUTA)]
    }

    fn slip_with(batch: bool, with_dependent: bool) -> SalarySlip {
        let tenant_id = TenantId::new();
        let slip_id = SlipId::new(AggregateId::new());
        let mut slip = SalarySlip::empty(slip_id);

        let deductions = if with_dependent {
            vec![PayComponent::new(FUTA, ComponentKind::Deduction, 600)]
        } else {
            vec![PayComponent::new("Health", ComponentKind::Deduction, 600)]
        };

        execute(
            &mut slip,
            &SlipCommand::DraftSlip(DraftSlip {
                tenant_id,
                slip_id,
                batch_id: batch.then(|| PayrollBatchId::new(AggregateId::new())),
                employee_id: EmployeeId::new(),
                period_start: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
                period_end: NaiveDate::from_ymd_opt(2025, 7, 31).unwrap(),
                earnings: vec![PayComponent::new("Basic", ComponentKind::Earning, 10_000)],
                deductions,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        slip
    }

    #[test]
    fn after_insert_requires_batch_origin() {
        assert!(should_recalculate_after_insert(
            &slip_with(true, true),
            &dependent()
        ));
        assert!(!should_recalculate_after_insert(
            &slip_with(false, true),
            &dependent()
        ));
    }

    #[test]
    fn after_insert_requires_a_dependent_component() {
        assert!(!should_recalculate_after_insert(
            &slip_with(true, false),
            &dependent()
        ));
    }

    #[test]
    fn before_save_skips_unchanged_earnings() {
        let slip = slip_with(true, true);
        let snapshot = EarningsSnapshot::of(&slip);

        assert!(!should_recalculate_before_save(
            &slip,
            &dependent(),
            Some(&snapshot)
        ));
    }

    #[test]
    fn before_save_fires_on_changed_earnings() {
        let mut slip = slip_with(true, true);
        let snapshot = EarningsSnapshot::of(&slip);

        let tenant_id = slip.tenant_id().unwrap();
        let slip_id = slip.id_typed();
        execute(
            &mut slip,
            &SlipCommand::UpdateEarnings(UpdateEarnings {
                tenant_id,
                slip_id,
                earnings: vec![PayComponent::new("Basic", ComponentKind::Earning, 12_000)],
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert!(should_recalculate_before_save(
            &slip,
            &dependent(),
            Some(&snapshot)
        ));
    }

    #[test]
    fn before_save_assumes_changed_without_a_snapshot() {
        let slip = slip_with(true, true);
        assert!(should_recalculate_before_save(&slip, &dependent(), None));
    }

    #[test]
    fn finalized_slips_never_recalculate() {
        let mut slip = slip_with(true, true);
        let tenant_id = slip.tenant_id().unwrap();
        let slip_id = slip.id_typed();
        execute(
            &mut slip,
            &SlipCommand::FinalizeSlip(FinalizeSlip {
                tenant_id,
                slip_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert!(!should_recalculate_after_insert(&slip, &dependent()));
        assert!(!should_recalculate_before_save(&slip, &dependent(), None));
    }
}
