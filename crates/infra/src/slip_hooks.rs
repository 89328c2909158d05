//! Salary slip lifecycle hooks: automatic dependent-component
//! recalculation.
//!
//! Two hooks mirror the host's document events. After-insert covers slips
//! created by a payroll run; before-save covers manual earnings edits on a
//! draft. Both run under
//! [`RecalcFailurePolicy::LogAndContinue`]: a broken tax engine must not
//! block slip creation or saving. The user-invoked regeneration runs under
//! [`RecalcFailurePolicy::Propagate`] instead — someone asked for it and
//! gets the error.

use tracing::info;

use payforge_core::{DomainError, DomainResult, TenantId};
use payforge_events::execute;
use payforge_payroll::recalc::run_with_policy;
use payforge_payroll::slip::ApplyRecalculation;
use payforge_payroll::structure::ComponentOverrides;
use payforge_payroll::triggers::{
    EarningsSnapshot, should_recalculate_after_insert, should_recalculate_before_save,
};
use payforge_payroll::{
    RecalcEngine, RecalcFailurePolicy, SalarySlip, SalaryStructure, SlipCommand, SlipId,
};

use crate::documents::{SlipStore, SlipStoreError};

fn store_err(e: SlipStoreError) -> DomainError {
    DomainError::invariant(format!("slip store failure: {e}"))
}

/// Lifecycle hook runner over a slip store.
pub struct SlipLifecycleHooks<S: SlipStore> {
    store: S,
}

impl<S: SlipStore> SlipLifecycleHooks<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Hook: a slip document was inserted.
    ///
    /// Recalculates (and persists) when the slip is a draft from a payroll
    /// run carrying a dependent deduction. Returns whether it did; failures
    /// are logged, never raised.
    pub fn after_insert(
        &self,
        tenant_id: TenantId,
        slip_id: SlipId,
        engine: &RecalcEngine<'_>,
        structure: &SalaryStructure,
    ) -> bool {
        let ran = run_with_policy(
            RecalcFailurePolicy::LogAndContinue,
            "after_insert_recalc",
            || {
                let mut slip = self.store.get(tenant_id, slip_id).map_err(store_err)?;
                if !should_recalculate_after_insert(&slip, engine.dependent_components()) {
                    return Ok(false);
                }

                let result = engine.recalculate(&slip, structure, &ComponentOverrides::none())?;
                self.apply_and_save(tenant_id, &mut slip, result)?;
                info!(slip = %slip_id, trigger = "after_insert", "auto-recalculated dependent components");
                Ok(true)
            },
        );

        // LogAndContinue never surfaces the error.
        matches!(ran, Ok(Some(true)))
    }

    /// Hook: a draft slip is about to be saved.
    ///
    /// Recalculates in place when earnings moved against the snapshot; the
    /// host persists the document afterwards. Failures are logged, never
    /// raised.
    pub fn before_save(
        &self,
        slip: &mut SalarySlip,
        previous: Option<&EarningsSnapshot>,
        engine: &RecalcEngine<'_>,
        structure: &SalaryStructure,
    ) -> bool {
        if !should_recalculate_before_save(slip, engine.dependent_components(), previous) {
            return false;
        }

        let slip_id = slip.id_typed();
        let ran = run_with_policy(
            RecalcFailurePolicy::LogAndContinue,
            "before_save_recalc",
            || {
                let result = engine.recalculate(slip, structure, &ComponentOverrides::none())?;
                let tenant_id = slip
                    .tenant_id()
                    .ok_or_else(|| DomainError::invariant("slip has no tenant"))?;
                execute(
                    slip,
                    &SlipCommand::ApplyRecalculation(ApplyRecalculation {
                        tenant_id,
                        slip_id,
                        result,
                        occurred_at: chrono::Utc::now(),
                    }),
                )?;
                info!(slip = %slip_id, trigger = "before_save", "auto-recalculated dependent components");
                Ok(true)
            },
        );

        matches!(ran, Ok(Some(true)))
    }

    /// User-invoked full regeneration: rebuild the slip from its structure,
    /// keeping manual earnings. Errors propagate to the caller.
    pub fn regenerate(
        &self,
        tenant_id: TenantId,
        slip_id: SlipId,
        engine: &RecalcEngine<'_>,
        structure: &SalaryStructure,
    ) -> DomainResult<SalarySlip> {
        let mut slip = self.store.get(tenant_id, slip_id).map_err(store_err)?;
        if !slip.is_draft() {
            return Err(DomainError::validation(
                "regeneration is only allowed on draft slips",
            ));
        }

        let result = engine.regenerate(&slip, structure)?;
        self.apply_and_save(tenant_id, &mut slip, result)?;
        Ok(slip)
    }

    fn apply_and_save(
        &self,
        tenant_id: TenantId,
        slip: &mut SalarySlip,
        result: payforge_payroll::RecalcResult,
    ) -> DomainResult<()> {
        let slip_id = slip.id_typed();
        execute(
            slip,
            &SlipCommand::ApplyRecalculation(ApplyRecalculation {
                tenant_id,
                slip_id,
                result,
                occurred_at: chrono::Utc::now(),
            }),
        )?;
        self.store.save(tenant_id, slip).map_err(store_err)
    }
}
