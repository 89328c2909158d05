//! Salary structure rules and the formula evaluation seam.
//!
//! Real formula evaluation (conditions, expression language) belongs to the
//! host payroll module. This layer only sequences evaluations, so the seam
//! is a trait taking an explicit override map: a manual amount substitutes
//! the formula result for that component during one evaluation pass, scoped
//! to the call stack by being a plain parameter. Nothing is patched and
//! nothing needs restoring on any exit path.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use payforge_core::{DomainError, DomainResult};

use crate::component::{ComponentCode, ComponentKind};

/// How a structure rule derives its amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum AmountBasis {
    /// Flat amount per period.
    Fixed { amount: u64 },
    /// Share of gross pay, in basis points (e.g. 620 = 6.2%).
    PercentOfGross { basis_points: u32 },
}

/// One component rule in a salary structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRule {
    pub component: ComponentCode,
    pub kind: ComponentKind,
    pub basis: AmountBasis,
}

/// A salary structure: the rule set slips are generated from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SalaryStructure {
    pub earnings: Vec<ComponentRule>,
    pub deductions: Vec<ComponentRule>,
}

impl SalaryStructure {
    pub fn rules(&self, kind: ComponentKind) -> &[ComponentRule] {
        match kind {
            ComponentKind::Earning => &self.earnings,
            ComponentKind::Deduction => &self.deductions,
        }
    }
}

/// Manual amounts that substitute formula results for one evaluation pass.
///
/// Built from user-edited rows; consulted by every [`FormulaEngine`] before
/// it evaluates a rule. Passing this explicitly is what keeps manual edits
/// from surviving past the pass they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentOverrides {
    amounts: HashMap<ComponentCode, u64>,
}

impl ComponentOverrides {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn set(&mut self, component: impl Into<ComponentCode>, amount: u64) {
        self.amounts.insert(component.into(), amount);
    }

    pub fn get(&self, component: &ComponentCode) -> Option<u64> {
        self.amounts.get(component).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }
}

impl FromIterator<(ComponentCode, u64)> for ComponentOverrides {
    fn from_iter<T: IntoIterator<Item = (ComponentCode, u64)>>(iter: T) -> Self {
        Self {
            amounts: iter.into_iter().collect(),
        }
    }
}

/// Inputs a formula may consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvalContext {
    /// Gross pay accumulated so far in the pass (earnings evaluated first).
    pub gross_pay: u64,
}

/// Formula evaluation seam.
///
/// Implementations must consult `overrides` before evaluating: a manual
/// amount wins for its component, everything else follows the rule.
pub trait FormulaEngine: Send + Sync {
    fn amount(
        &self,
        rule: &ComponentRule,
        ctx: &EvalContext,
        overrides: &ComponentOverrides,
    ) -> DomainResult<u64>;
}

/// Rule-table evaluator: enough for structures expressed as fixed amounts
/// and gross-pay percentages. Hosts with a richer expression language plug
/// in their own [`FormulaEngine`].
#[derive(Debug, Default)]
pub struct StructureFormula;

impl FormulaEngine for StructureFormula {
    fn amount(
        &self,
        rule: &ComponentRule,
        ctx: &EvalContext,
        overrides: &ComponentOverrides,
    ) -> DomainResult<u64> {
        if let Some(manual) = overrides.get(&rule.component) {
            return Ok(manual);
        }

        match rule.basis {
            AmountBasis::Fixed { amount } => Ok(amount),
            AmountBasis::PercentOfGross { basis_points } => {
                let product = (ctx.gross_pay as u128)
                    .checked_mul(basis_points as u128)
                    .ok_or_else(|| DomainError::invariant("component amount overflow"))?;
                Ok((product / 10_000) as u64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(component: &str, kind: ComponentKind, amount: u64) -> ComponentRule {
        ComponentRule {
            component: ComponentCode::new(component),
            kind,
            basis: AmountBasis::Fixed { amount },
        }
    }

    #[test]
    fn fixed_rule_evaluates_to_its_amount() {
        let rule = fixed("Basic", ComponentKind::Earning, 500_000);
        let amount = StructureFormula
            .amount(&rule, &EvalContext::default(), &ComponentOverrides::none())
            .unwrap();
        assert_eq!(amount, 500_000);
    }

    #[test]
    fn percent_rule_uses_running_gross() {
        let rule = ComponentRule {
            component: ComponentCode::new("FUTA"),
            kind: ComponentKind::Deduction,
            basis: AmountBasis::PercentOfGross { basis_points: 600 },
        };
        let ctx = EvalContext {
            gross_pay: 1_000_000,
        };
        let amount = StructureFormula
            .amount(&rule, &ctx, &ComponentOverrides::none())
            .unwrap();
        assert_eq!(amount, 60_000);
    }

    #[test]
    fn override_beats_the_rule_for_its_component_only() {
        let basic = fixed("Basic", ComponentKind::Earning, 500_000);
        let hra = fixed("HRA", ComponentKind::Earning, 200_000);

        let mut overrides = ComponentOverrides::none();
        overrides.set("Basic", 475_000);

        let ctx = EvalContext::default();
        assert_eq!(
            StructureFormula.amount(&basic, &ctx, &overrides).unwrap(),
            475_000
        );
        assert_eq!(
            StructureFormula.amount(&hra, &ctx, &overrides).unwrap(),
            200_000
        );
    }

    #[test]
    fn overrides_do_not_leak_between_passes() {
        let basic = fixed("Basic", ComponentKind::Earning, 500_000);

        let mut overrides = ComponentOverrides::none();
        overrides.set("Basic", 475_000);
        let ctx = EvalContext::default();

        let with = StructureFormula.amount(&basic, &ctx, &overrides).unwrap();
        let without = StructureFormula
            .amount(&basic, &ctx, &ComponentOverrides::none())
            .unwrap();

        assert_eq!(with, 475_000);
        assert_eq!(without, 500_000);
    }
}
