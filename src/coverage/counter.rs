//! Missed/covered counter, the atomic weighted coverage unit

use serde::{Deserialize, Serialize};
use std::fmt;

/// A JaCoCo counter: how many items of one kind were missed and covered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub missed: u64,
    pub covered: u64,
}

impl Counter {
    pub fn new(missed: u64, covered: u64) -> Self {
        Self { missed, covered }
    }

    /// Coverage percentage rounded to two decimals, `0.0` without any weight
    pub fn coverage(&self) -> f64 {
        weighted_coverage(self)
    }

    /// Add another counter (or a raw `(missed, covered)` pair) to this one
    pub fn append(&mut self, other: impl Into<Counter>) -> &mut Self {
        let other = other.into();
        self.missed += other.missed;
        self.covered += other.covered;
        self
    }

    /// True when nothing was measured at all
    pub fn is_zero_weight(&self) -> bool {
        self.missed == 0 && self.covered == 0
    }

    pub fn total(&self) -> u64 {
        self.missed + self.covered
    }
}

impl From<(u64, u64)> for Counter {
    fn from((missed, covered): (u64, u64)) -> Self {
        Self { missed, covered }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Missed: {}, Covered: {}", self.missed, self.covered)
    }
}

/// Percentage of covered items, weighted by the counter totals.
///
/// Every reached value in the crate goes through this function, except the
/// report-level changed files average which is a plain mean of per-file
/// percentages (see `evaluator::mean_of_per_file_percentages`).
pub fn weighted_coverage(counter: &Counter) -> f64 {
    if counter.is_zero_weight() {
        return 0.0;
    }

    round2(counter.covered as f64 / counter.total() as f64 * 100.0)
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Render a percentage the way it appears in comments and violations:
/// whole numbers keep one decimal (`40.0`), others print as-is (`66.67`).
pub fn format_percentage(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_formula() {
        assert_eq!(Counter::new(5, 10).coverage(), 66.67);
        assert_eq!(Counter::new(0, 10).coverage(), 100.0);
        assert_eq!(Counter::new(10, 0).coverage(), 0.0);
        assert_eq!(Counter::new(1, 2).coverage(), 66.67);
        assert_eq!(Counter::new(1, 9).coverage(), 90.0);
    }

    #[test]
    fn test_zero_weight_has_zero_coverage() {
        let counter = Counter::default();
        assert!(counter.is_zero_weight());
        assert_eq!(counter.coverage(), 0.0);
    }

    #[test]
    fn test_append_counter_and_pair() {
        let mut counter = Counter::new(1, 2);
        counter.append(Counter::new(3, 4)).append((5, 6));
        assert_eq!(counter, Counter::new(9, 12));
    }

    #[test]
    fn test_append_is_order_independent() {
        let mut left = Counter::new(2, 3);
        left.append(Counter::new(4, 5));

        let mut right = Counter::new(4, 5);
        right.append(Counter::new(2, 3));

        assert_eq!(left, right);
        assert_eq!(left, Counter::new(6, 8));
    }

    #[test]
    fn test_display() {
        assert_eq!(Counter::new(3, 7).to_string(), "Missed: 3, Covered: 7");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(40.0), "40.0");
        assert_eq!(format_percentage(66.67), "66.67");
        assert_eq!(format_percentage(0.0), "0.0");
        assert_eq!(format_percentage(100.0), "100.0");
        assert_eq!(format_percentage(-1.5), "-1.5");
    }
}
