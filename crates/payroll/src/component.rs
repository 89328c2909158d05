use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Registry key of a salary component (e.g. "Basic", "IRS FUTA Employer Tax").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentCode(String);

impl ComponentCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ComponentCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Which side of the slip a component sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Earning,
    Deduction,
}

/// Behavior flags mirrored from the component master data.
///
/// These drive recalculation: `variable_based_on_taxable_salary` marks a
/// deduction as tax-derived, `deduct_full_tax_on_selected_payroll_date`
/// changes how additional amounts are taxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComponentFlags {
    pub is_tax_applicable: bool,
    pub deduct_full_tax_on_selected_payroll_date: bool,
    pub is_flexible_benefit: bool,
    pub depends_on_payment_days: bool,
    pub do_not_include_in_total: bool,
    pub variable_based_on_taxable_salary: bool,
}

/// One earning or deduction row on a salary slip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayComponent {
    pub component: ComponentCode,
    pub kind: ComponentKind,
    /// Current amount in smallest currency unit (e.g., cents).
    pub amount: u64,
    /// Amount the salary structure would assign without manual edits.
    pub default_amount: u64,
    /// Portion granted on top of the structure (ad-hoc salary).
    pub additional_amount: u64,
    pub flags: ComponentFlags,
}

impl PayComponent {
    pub fn new(component: impl Into<ComponentCode>, kind: ComponentKind, amount: u64) -> Self {
        Self {
            component: component.into(),
            kind,
            amount,
            default_amount: amount,
            additional_amount: 0,
            flags: ComponentFlags::default(),
        }
    }

    /// Counts toward slip totals unless the master data excludes it.
    pub fn in_total(&self) -> bool {
        !self.flags.do_not_include_in_total
    }

    /// Refresh flags from master data, and reclassify the amount as
    /// additional salary when the full-tax flag is set and the structure
    /// contributed nothing (ad-hoc grant, taxed in full on payout).
    pub fn refresh_from_master(&mut self, flags: ComponentFlags) {
        self.flags = flags;

        if flags.deduct_full_tax_on_selected_payroll_date && self.amount > 0 {
            if self.default_amount == 0 {
                self.additional_amount = self.amount;
            } else {
                self.additional_amount = 0;
            }
        }
    }
}

/// Component master data lookup (host-owned reference data).
pub trait ComponentRegistry: Send + Sync {
    fn flags(&self, component: &ComponentCode) -> Option<ComponentFlags>;
}

/// In-memory registry for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryComponentRegistry {
    inner: RwLock<HashMap<ComponentCode, ComponentFlags>>,
}

impl InMemoryComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, component: impl Into<ComponentCode>, flags: ComponentFlags) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(component.into(), flags);
        }
    }
}

impl ComponentRegistry for InMemoryComponentRegistry {
    fn flags(&self, component: &ComponentCode) -> Option<ComponentFlags> {
        let map = self.inner.read().ok()?;
        map.get(component).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_marks_ad_hoc_grant_as_additional() {
        let mut c = PayComponent::new("Bonus", ComponentKind::Earning, 500);
        c.default_amount = 0;

        c.refresh_from_master(ComponentFlags {
            deduct_full_tax_on_selected_payroll_date: true,
            is_tax_applicable: true,
            ..ComponentFlags::default()
        });

        assert_eq!(c.additional_amount, 500);
    }

    #[test]
    fn refresh_keeps_structure_amount_as_regular() {
        let mut c = PayComponent::new("Basic", ComponentKind::Earning, 1000);

        c.refresh_from_master(ComponentFlags {
            deduct_full_tax_on_selected_payroll_date: true,
            is_tax_applicable: true,
            ..ComponentFlags::default()
        });

        // Structure contributed the amount; nothing is "additional".
        assert_eq!(c.additional_amount, 0);
    }

    #[test]
    fn registry_returns_inserted_flags() {
        let registry = InMemoryComponentRegistry::new();
        registry.insert(
            "Income Tax",
            ComponentFlags {
                variable_based_on_taxable_salary: true,
                ..ComponentFlags::default()
            },
        );

        let flags = registry.flags(&ComponentCode::new("Income Tax")).unwrap();
        assert!(flags.variable_based_on_taxable_salary);
        assert!(!flags.is_tax_applicable);
    }
}
