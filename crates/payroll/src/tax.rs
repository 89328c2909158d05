//! Income-tax seam.
//!
//! The actual tax math (slabs, exemptions, year projections) is the host
//! payroll module's. The recalculation engine only needs three answers from
//! it, in this order: annual taxable earnings, the recomputed amount for
//! each tax-variable deduction, and the period's income-tax breakup.

use serde::{Deserialize, Serialize};

use payforge_core::DomainResult;

use crate::component::{ComponentCode, PayComponent};

/// Income-tax breakup fields carried on a salary slip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxBreakup {
    pub ctc: u64,
    pub total_earnings: u64,
    pub non_taxable_earnings: u64,
    pub annual_taxable_amount: u64,
    pub income_tax_deducted_till_date: u64,
    pub total_income_tax: u64,
    pub current_month_income_tax: u64,
    pub future_income_tax_deductions: u64,
}

/// View of the slip the tax engine computes from.
#[derive(Debug, Clone, Copy)]
pub struct TaxInputs<'a> {
    pub earnings: &'a [PayComponent],
    pub gross_pay: u64,
    /// Periods in the payroll year (annualization factor).
    pub periods_per_year: u32,
}

/// Tax computation seam (host payroll module).
pub trait TaxEngine: Send + Sync {
    /// Projected taxable earnings for the payroll year.
    fn taxable_earnings_for_year(&self, inputs: &TaxInputs<'_>) -> DomainResult<u64>;

    /// Recomputed amount for a deduction flagged as tax-variable.
    ///
    /// `None` means the engine has no opinion for this component and the
    /// existing amount stands.
    fn variable_tax_for_component(
        &self,
        component: &ComponentCode,
        annual_taxable: u64,
        inputs: &TaxInputs<'_>,
    ) -> DomainResult<Option<u64>>;

    /// Income-tax breakup for the period.
    fn income_tax_breakup(
        &self,
        annual_taxable: u64,
        inputs: &TaxInputs<'_>,
    ) -> DomainResult<TaxBreakup>;
}

/// Flat-rate engine for tests/dev: one rate over annualized taxable
/// earnings, spread evenly across periods.
#[derive(Debug, Clone)]
pub struct FlatRateTaxEngine {
    /// Tax rate in basis points.
    pub rate_bps: u32,
}

impl FlatRateTaxEngine {
    pub fn new(rate_bps: u32) -> Self {
        Self { rate_bps }
    }

    fn annual_tax(&self, annual_taxable: u64) -> u64 {
        ((annual_taxable as u128 * self.rate_bps as u128) / 10_000) as u64
    }
}

impl TaxEngine for FlatRateTaxEngine {
    fn taxable_earnings_for_year(&self, inputs: &TaxInputs<'_>) -> DomainResult<u64> {
        let taxable_period: u64 = inputs
            .earnings
            .iter()
            .filter(|c| c.flags.is_tax_applicable)
            .map(|c| c.amount)
            .sum();
        Ok(taxable_period * inputs.periods_per_year as u64)
    }

    fn variable_tax_for_component(
        &self,
        _component: &ComponentCode,
        annual_taxable: u64,
        inputs: &TaxInputs<'_>,
    ) -> DomainResult<Option<u64>> {
        let periods = inputs.periods_per_year.max(1) as u64;
        Ok(Some(self.annual_tax(annual_taxable) / periods))
    }

    fn income_tax_breakup(
        &self,
        annual_taxable: u64,
        inputs: &TaxInputs<'_>,
    ) -> DomainResult<TaxBreakup> {
        let periods = inputs.periods_per_year.max(1) as u64;
        let total_income_tax = self.annual_tax(annual_taxable);
        let current = total_income_tax / periods;
        let total_earnings: u64 = inputs.earnings.iter().map(|c| c.amount).sum();

        Ok(TaxBreakup {
            ctc: total_earnings * periods,
            total_earnings,
            non_taxable_earnings: inputs
                .earnings
                .iter()
                .filter(|c| !c.flags.is_tax_applicable)
                .map(|c| c.amount)
                .sum(),
            annual_taxable_amount: annual_taxable,
            income_tax_deducted_till_date: 0,
            total_income_tax,
            current_month_income_tax: current,
            future_income_tax_deductions: total_income_tax.saturating_sub(current),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentFlags, ComponentKind};

    fn earning(code: &str, amount: u64, taxable: bool) -> PayComponent {
        let mut c = PayComponent::new(code, ComponentKind::Earning, amount);
        c.flags = ComponentFlags {
            is_tax_applicable: taxable,
            ..ComponentFlags::default()
        };
        c
    }

    #[test]
    fn year_projection_skips_non_taxable_earnings() {
        let earnings = vec![earning("Basic", 100_000, true), earning("Meal", 5_000, false)];
        let inputs = TaxInputs {
            earnings: &earnings,
            gross_pay: 105_000,
            periods_per_year: 12,
        };

        let engine = FlatRateTaxEngine::new(1000);
        assert_eq!(
            engine.taxable_earnings_for_year(&inputs).unwrap(),
            1_200_000
        );
    }

    #[test]
    fn breakup_splits_annual_tax_across_periods() {
        let earnings = vec![earning("Basic", 100_000, true)];
        let inputs = TaxInputs {
            earnings: &earnings,
            gross_pay: 100_000,
            periods_per_year: 12,
        };

        let engine = FlatRateTaxEngine::new(1000);
        let annual = engine.taxable_earnings_for_year(&inputs).unwrap();
        let breakup = engine.income_tax_breakup(annual, &inputs).unwrap();

        assert_eq!(breakup.total_income_tax, 120_000);
        assert_eq!(breakup.current_month_income_tax, 10_000);
        assert_eq!(breakup.future_income_tax_deductions, 110_000);
        assert_eq!(breakup.annual_taxable_amount, 1_200_000);
    }
}
