//! Dependent-component recalculation.
//!
//! Some deductions (employer unemployment taxes, income tax) derive from
//! year-to-date taxable earnings; whenever a draft slip's earnings move,
//! those rows and the income-tax breakup are stale. The engine re-derives
//! them in a fixed sequence through the formula/tax seams and hands back a
//! [`RecalcResult`] for the aggregate to apply.
//!
//! Manual earning edits ride along as [`ComponentOverrides`]: an explicit
//! map passed into every formula evaluation, alive for exactly one pass.

use tracing::{error, info};

use payforge_core::DomainResult;

use crate::component::{ComponentCode, ComponentKind, ComponentRegistry, PayComponent};
use crate::slip::SalarySlip;
use crate::structure::{ComponentOverrides, EvalContext, FormulaEngine, SalaryStructure};
use crate::tax::{TaxEngine, TaxInputs};

pub use crate::slip::RecalcResult;

/// What a recalculation failure does to the surrounding operation.
///
/// Lifecycle hooks run with `LogAndContinue`: slip creation and saving must
/// not fail because a derived-field recalculation did. User-invoked
/// recalculation runs with `Propagate` so the caller sees the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecalcFailurePolicy {
    Propagate,
    LogAndContinue,
}

/// Run `op` under a failure policy.
///
/// Under `LogAndContinue` an error is logged and swallowed (`Ok(None)`);
/// under `Propagate` it is returned.
pub fn run_with_policy<T>(
    policy: RecalcFailurePolicy,
    op_name: &str,
    op: impl FnOnce() -> DomainResult<T>,
) -> DomainResult<Option<T>> {
    match op() {
        Ok(value) => Ok(Some(value)),
        Err(e) => match policy {
            RecalcFailurePolicy::Propagate => Err(e),
            RecalcFailurePolicy::LogAndContinue => {
                error!(operation = op_name, error = %e, "recalculation failed, continuing");
                Ok(None)
            }
        },
    }
}

/// Recalculation engine over the formula, tax, and component-master seams.
pub struct RecalcEngine<'a> {
    formula: &'a dyn FormulaEngine,
    tax: &'a dyn TaxEngine,
    registry: &'a dyn ComponentRegistry,
    /// Deduction components that must be re-derived when earnings move.
    dependent_components: Vec<ComponentCode>,
    periods_per_year: u32,
}

impl<'a> RecalcEngine<'a> {
    pub fn new(
        formula: &'a dyn FormulaEngine,
        tax: &'a dyn TaxEngine,
        registry: &'a dyn ComponentRegistry,
        dependent_components: Vec<ComponentCode>,
        periods_per_year: u32,
    ) -> Self {
        Self {
            formula,
            tax,
            registry,
            dependent_components,
            periods_per_year,
        }
    }

    pub fn dependent_components(&self) -> &[ComponentCode] {
        &self.dependent_components
    }

    /// Re-derive deductions and the tax breakup, keeping earnings as they
    /// stand on the slip (flag-refreshed from master data).
    pub fn recalculate(
        &self,
        slip: &SalarySlip,
        structure: &SalaryStructure,
        overrides: &ComponentOverrides,
    ) -> DomainResult<RecalcResult> {
        let earnings = self.refreshed(slip.earnings());
        self.derive(slip, structure, earnings, overrides)
    }

    /// Earnings with flags brought up to date from the component master.
    fn refreshed(&self, earnings: &[PayComponent]) -> Vec<PayComponent> {
        let mut refreshed = earnings.to_vec();
        for component in &mut refreshed {
            if let Some(flags) = self.registry.flags(&component.component) {
                component.refresh_from_master(flags);
            }
        }
        refreshed
    }

    /// Rebuild the whole slip from the structure, substituting the current
    /// manual earning amounts for their formula results.
    ///
    /// Feeding the edits back through evaluation (instead of layering a
    /// delta on top) is what avoids double-counting an override as both a
    /// structure amount and an addition.
    pub fn regenerate(
        &self,
        slip: &SalarySlip,
        structure: &SalaryStructure,
    ) -> DomainResult<RecalcResult> {
        let overrides: ComponentOverrides = slip
            .earnings()
            .iter()
            .filter(|c| c.amount > 0)
            .map(|c| (c.component.clone(), c.amount))
            .collect();

        let mut earnings = Vec::with_capacity(structure.earnings.len());
        let mut running_gross = 0u64;
        for rule in structure.rules(ComponentKind::Earning) {
            let ctx = EvalContext {
                gross_pay: running_gross,
            };
            let amount = self.formula.amount(rule, &ctx, &overrides)?;
            let default_amount = self.formula.amount(rule, &ctx, &ComponentOverrides::none())?;

            let mut component = PayComponent::new(rule.component.clone(), rule.kind, amount);
            component.default_amount = default_amount;
            if let Some(flags) = self.registry.flags(&rule.component) {
                component.refresh_from_master(flags);
            }
            if component.in_total() {
                running_gross = running_gross.saturating_add(amount);
            }
            earnings.push(component);
        }

        self.derive(slip, structure, earnings, &overrides)
    }

    /// Shared tail: deductions from the structure, tax-variable rows from
    /// the tax engine, totals, then the income-tax breakup.
    fn derive(
        &self,
        slip: &SalarySlip,
        structure: &SalaryStructure,
        earnings: Vec<PayComponent>,
        overrides: &ComponentOverrides,
    ) -> DomainResult<RecalcResult> {
        let gross_pay: u64 = earnings
            .iter()
            .filter(|c| c.in_total())
            .map(|c| c.amount)
            .sum();
        let ctx = EvalContext { gross_pay };

        let mut deductions = Vec::with_capacity(structure.deductions.len());
        for rule in structure.rules(ComponentKind::Deduction) {
            let amount = self.formula.amount(rule, &ctx, overrides)?;
            let mut component = PayComponent::new(rule.component.clone(), rule.kind, amount);
            if let Some(flags) = self.registry.flags(&rule.component) {
                component.refresh_from_master(flags);
            }
            deductions.push(component);
        }

        let inputs = TaxInputs {
            earnings: &earnings,
            gross_pay,
            periods_per_year: self.periods_per_year,
        };
        let annual_taxable = self.tax.taxable_earnings_for_year(&inputs)?;

        for deduction in &mut deductions {
            if !deduction.flags.variable_based_on_taxable_salary {
                continue;
            }
            if let Some(amount) =
                self.tax
                    .variable_tax_for_component(&deduction.component, annual_taxable, &inputs)?
            {
                deduction.amount = amount;
            }
        }

        self.log_transitions(slip, &deductions);

        let total_deduction: u64 = deductions
            .iter()
            .filter(|c| c.in_total())
            .map(|c| c.amount)
            .sum();

        let tax = self.tax.income_tax_breakup(annual_taxable, &inputs)?;

        Ok(RecalcResult {
            earnings,
            deductions,
            gross_pay,
            total_deduction,
            net_pay: gross_pay.saturating_sub(total_deduction),
            tax,
        })
    }

    fn log_transitions(&self, slip: &SalarySlip, new_deductions: &[PayComponent]) {
        for new in new_deductions {
            if !self.dependent_components.contains(&new.component) {
                continue;
            }
            let old_amount = slip
                .deductions()
                .iter()
                .find(|d| d.component == new.component)
                .map(|d| d.amount)
                .unwrap_or(0);
            if old_amount != new.amount {
                info!(
                    slip = %slip.id_typed(),
                    component = %new.component,
                    from = old_amount,
                    to = new.amount,
                    "recalculated dependent component"
                );
            }
        }
    }
}
