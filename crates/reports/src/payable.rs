use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use payforge_payroll::PayrollBatchId;

use crate::aging::{AgingRanges, age_in_days};

/// What a data-set row represents.
///
/// Rows carry typed numbers only; bolding subtotals and similar presentation
/// belongs to whoever renders the data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    /// A regular payable row produced by the host report.
    Base,
    /// A payroll batch liability row added by this layer.
    Payroll,
    /// Subtotal over the inserted payroll rows.
    PayrollSubtotal,
    /// Blank spacer between groups.
    Spacer,
    /// The report's grand-total row.
    GrandTotal,
}

/// One row of the payables aging data set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingRow {
    pub kind: RowKind,
    pub party: Option<String>,
    pub account: Option<String>,
    pub voucher_no: Option<String>,
    pub posting_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub invoiced: u64,
    pub paid: u64,
    pub outstanding: i64,
    /// Days outstanding, floored at 0 for display.
    pub age: i64,
    /// Outstanding amount placed in its aging bucket.
    pub ranges: [i64; 5],
}

impl AgingRow {
    fn spacer() -> Self {
        Self {
            kind: RowKind::Spacer,
            party: None,
            account: None,
            voucher_no: None,
            posting_date: None,
            due_date: None,
            invoiced: 0,
            paid: 0,
            outstanding: 0,
            age: 0,
            ranges: [0; 5],
        }
    }
}

/// Per-batch payroll liability read model (built by the payable projection).
///
/// `invoiced` accumulates submitted voucher credits referencing the batch
/// (what is owed), `paid` accumulates submitted debits (what was settled);
/// cancellation reverses both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollLiability {
    pub batch_id: PayrollBatchId,
    pub account: String,
    pub posting_date: NaiveDate,
    pub invoiced: u64,
    pub paid: u64,
}

impl PayrollLiability {
    pub fn outstanding(&self) -> i64 {
        self.invoiced as i64 - self.paid as i64
    }
}

/// Options for extending the payables data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayablesReportOptions {
    pub report_date: NaiveDate,
    pub ranges: AgingRanges,
    pub include_payroll_payable: bool,
    pub group_by_party: bool,
}

/// Turn a liability into an aging row; `None` when nothing is outstanding.
fn liability_row(
    liability: &PayrollLiability,
    report_date: NaiveDate,
    ranges: &AgingRanges,
) -> Option<AgingRow> {
    let outstanding = liability.outstanding();
    if outstanding == 0 {
        return None;
    }

    let age = age_in_days(liability.posting_date, report_date);
    let mut buckets = [0i64; 5];
    // Bucketed by raw age; the displayed age is floored at zero.
    buckets[ranges.bucket(age)] = outstanding;

    Some(AgingRow {
        kind: RowKind::Payroll,
        party: Some(liability.batch_id.to_string()),
        account: Some(liability.account.clone()),
        voucher_no: Some(liability.batch_id.to_string()),
        posting_date: Some(liability.posting_date),
        due_date: Some(liability.posting_date),
        invoiced: liability.invoiced,
        paid: liability.paid,
        outstanding,
        age: age.max(0),
        ranges: buckets,
    })
}

/// Subtotal row over a set of payroll rows.
fn payroll_subtotal(rows: &[AgingRow]) -> AgingRow {
    let mut subtotal = AgingRow {
        kind: RowKind::PayrollSubtotal,
        party: Some("Payroll Entries".to_string()),
        account: None,
        voucher_no: None,
        posting_date: None,
        due_date: None,
        invoiced: 0,
        paid: 0,
        outstanding: 0,
        age: 0,
        ranges: [0; 5],
    };
    for row in rows {
        subtotal.invoiced += row.invoiced;
        subtotal.paid += row.paid;
        subtotal.outstanding += row.outstanding;
        for (acc, r) in subtotal.ranges.iter_mut().zip(row.ranges.iter()) {
            *acc += *r;
        }
    }
    subtotal
}

/// Merge payroll liabilities into the host's payable rows.
///
/// Payroll rows are inserted ahead of the grand-total row (appended when
/// there is none); with `group_by_party` they get spacer rows and a
/// subtotal, mirroring how the base report spaces its party groups. The
/// grand-total row, when present, is updated to include the payroll
/// amounts.
pub fn extend_with_payroll(
    base: Vec<AgingRow>,
    liabilities: &[PayrollLiability],
    opts: &PayablesReportOptions,
) -> Vec<AgingRow> {
    if !opts.include_payroll_payable {
        return base;
    }

    let payroll_rows: Vec<AgingRow> = liabilities
        .iter()
        .filter_map(|l| liability_row(l, opts.report_date, &opts.ranges))
        .collect();
    if payroll_rows.is_empty() {
        return base;
    }

    let mut data = base;
    let mut insert_index = data
        .iter()
        .position(|row| row.kind == RowKind::GrandTotal)
        .unwrap_or(data.len());

    if opts.group_by_party {
        if insert_index > 0 {
            data.insert(insert_index, AgingRow::spacer());
            insert_index += 1;
        }

        let subtotal = payroll_subtotal(&payroll_rows);
        for row in payroll_rows {
            data.insert(insert_index, row);
            insert_index += 1;
        }
        data.insert(insert_index, subtotal);
        insert_index += 1;

        if insert_index < data.len() {
            data.insert(insert_index, AgingRow::spacer());
        }
    } else {
        for row in payroll_rows {
            data.insert(insert_index, row);
            insert_index += 1;
        }
    }

    update_grand_total(&mut data);
    data
}

/// Fold the payroll amounts into the grand-total row, if the set has one.
fn update_grand_total(data: &mut [AgingRow]) {
    let mut invoiced = 0u64;
    let mut paid = 0u64;
    let mut outstanding = 0i64;
    let mut ranges = [0i64; 5];

    for row in data.iter() {
        if row.kind == RowKind::Payroll {
            invoiced += row.invoiced;
            paid += row.paid;
            outstanding += row.outstanding;
            for (acc, r) in ranges.iter_mut().zip(row.ranges.iter()) {
                *acc += *r;
            }
        }
    }

    if let Some(total) = data.iter_mut().find(|row| row.kind == RowKind::GrandTotal) {
        total.invoiced += invoiced;
        total.paid += paid;
        total.outstanding += outstanding;
        for (acc, r) in total.ranges.iter_mut().zip(ranges.iter()) {
            *acc += *r;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payforge_core::AggregateId;
    use proptest::prelude::*;

    fn report_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 31).unwrap()
    }

    fn opts(group_by_party: bool) -> PayablesReportOptions {
        PayablesReportOptions {
            report_date: report_date(),
            ranges: AgingRanges::default(),
            include_payroll_payable: true,
            group_by_party,
        }
    }

    fn liability(days_old: i64, invoiced: u64, paid: u64) -> PayrollLiability {
        PayrollLiability {
            batch_id: PayrollBatchId::new(AggregateId::new()),
            account: "2110 - Payroll Payable".to_string(),
            posting_date: report_date() - chrono::Duration::days(days_old),
            invoiced,
            paid,
        }
    }

    fn base_row(outstanding: i64) -> AgingRow {
        AgingRow {
            kind: RowKind::Base,
            party: Some("ACME Supplies".to_string()),
            account: Some("2100 - Accounts Payable".to_string()),
            voucher_no: Some("PI-0001".to_string()),
            posting_date: Some(report_date()),
            due_date: Some(report_date()),
            invoiced: outstanding.max(0) as u64,
            paid: 0,
            outstanding,
            age: 0,
            ranges: [outstanding, 0, 0, 0, 0],
        }
    }

    fn total_row(outstanding: i64) -> AgingRow {
        AgingRow {
            kind: RowKind::GrandTotal,
            party: Some("Total".to_string()),
            account: None,
            voucher_no: None,
            posting_date: None,
            due_date: None,
            invoiced: outstanding.max(0) as u64,
            paid: 0,
            outstanding,
            age: 0,
            ranges: [outstanding, 0, 0, 0, 0],
        }
    }

    #[test]
    fn settled_batches_are_dropped() {
        let rows = extend_with_payroll(vec![], &[liability(10, 5000, 5000)], &opts(false));
        assert!(rows.is_empty());
    }

    #[test]
    fn disabled_flag_leaves_base_untouched() {
        let base = vec![base_row(100), total_row(100)];
        let mut o = opts(false);
        o.include_payroll_payable = false;

        let rows = extend_with_payroll(base.clone(), &[liability(10, 5000, 0)], &o);
        assert_eq!(rows, base);
    }

    #[test]
    fn payroll_rows_land_before_the_total_row() {
        let base = vec![base_row(100), total_row(100)];
        let rows = extend_with_payroll(base, &[liability(10, 5000, 2000)], &opts(false));

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].kind, RowKind::Base);
        assert_eq!(rows[1].kind, RowKind::Payroll);
        assert_eq!(rows[1].outstanding, 3000);
        assert_eq!(rows[2].kind, RowKind::GrandTotal);
    }

    #[test]
    fn grand_total_absorbs_payroll_amounts() {
        let base = vec![base_row(100), total_row(100)];
        let rows = extend_with_payroll(base, &[liability(10, 5000, 2000)], &opts(false));

        let total = rows.last().unwrap();
        assert_eq!(total.outstanding, 3100);
        assert_eq!(total.invoiced, 5100);
        assert_eq!(total.paid, 2000);
        assert_eq!(total.ranges[0], 3100);
    }

    #[test]
    fn grouping_adds_spacers_and_a_subtotal() {
        let base = vec![base_row(100), total_row(100)];
        let rows = extend_with_payroll(
            base,
            &[liability(10, 5000, 2000), liability(45, 800, 0)],
            &opts(true),
        );

        let kinds: Vec<RowKind> = rows.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RowKind::Base,
                RowKind::Spacer,
                RowKind::Payroll,
                RowKind::Payroll,
                RowKind::PayrollSubtotal,
                RowKind::Spacer,
                RowKind::GrandTotal,
            ]
        );

        let subtotal = rows
            .iter()
            .find(|r| r.kind == RowKind::PayrollSubtotal)
            .unwrap();
        assert_eq!(subtotal.outstanding, 3800);
        assert_eq!(subtotal.ranges[0], 3000);
        assert_eq!(subtotal.ranges[1], 800);
    }

    #[test]
    fn grouping_without_base_rows_skips_the_leading_spacer() {
        let rows = extend_with_payroll(vec![], &[liability(10, 5000, 0)], &opts(true));

        let kinds: Vec<RowKind> = rows.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![RowKind::Payroll, RowKind::PayrollSubtotal]
        );
    }

    #[test]
    fn overpaid_batches_report_negative_outstanding() {
        let rows = extend_with_payroll(vec![], &[liability(10, 2000, 2500)], &opts(false));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].outstanding, -500);
        assert_eq!(rows[0].ranges[0], -500);
    }

    #[test]
    fn bucket_placement_follows_age() {
        let rows = extend_with_payroll(
            vec![],
            &[
                liability(15, 100, 0),
                liability(45, 200, 0),
                liability(75, 300, 0),
                liability(100, 400, 0),
                liability(200, 500, 0),
            ],
            &opts(false),
        );

        for (i, row) in rows.iter().enumerate() {
            let expected: i64 = (i as i64 + 1) * 100;
            assert_eq!(row.ranges[i], expected);
            assert_eq!(row.ranges.iter().sum::<i64>(), expected);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// The subtotal row always equals the sum of the payroll rows, and
        /// every surviving row's outstanding is bucketed exactly once.
        #[test]
        fn subtotal_matches_inserted_rows(
            liabilities in prop::collection::vec(
                (0i64..400, 0u64..100_000, 0u64..100_000),
                0..8
            )
        ) {
            let ls: Vec<PayrollLiability> = liabilities
                .iter()
                .map(|(age, invoiced, paid)| liability(*age, *invoiced, *paid))
                .collect();

            let rows = extend_with_payroll(vec![total_row(0)], &ls, &opts(true));

            let payroll: Vec<&AgingRow> =
                rows.iter().filter(|r| r.kind == RowKind::Payroll).collect();
            for row in &payroll {
                prop_assert_eq!(row.ranges.iter().sum::<i64>(), row.outstanding);
            }

            if let Some(subtotal) =
                rows.iter().find(|r| r.kind == RowKind::PayrollSubtotal)
            {
                let expected: i64 = payroll.iter().map(|r| r.outstanding).sum();
                prop_assert_eq!(subtotal.outstanding, expected);
            } else {
                prop_assert!(payroll.is_empty());
            }
        }
    }
}
