use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Aging range boundaries in days.
///
/// Four ascending bounds split outstanding amounts into five buckets:
/// `0..=b0`, `b0+1..=b1`, `b1+1..=b2`, `b2+1..=b3`, and `b3+1..`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingRanges {
    bounds: [i64; 4],
}

impl Default for AgingRanges {
    fn default() -> Self {
        Self {
            bounds: [30, 60, 90, 120],
        }
    }
}

impl AgingRanges {
    pub fn new(bounds: [i64; 4]) -> Self {
        Self { bounds }
    }

    /// Bucket index (0..=4) for an age in days.
    ///
    /// Negative ages (not yet due) land in the first bucket, matching how
    /// the payable report has always grouped them.
    pub fn bucket(&self, age: i64) -> usize {
        self.bounds.iter().position(|b| age <= *b).unwrap_or(4)
    }
}

/// Age in days of a liability at the report date.
pub fn age_in_days(posting_date: NaiveDate, report_date: NaiveDate) -> i64 {
    (report_date - posting_date).num_days()
}
