//! Evaluation record of one report or one module

use indexmap::IndexMap;
use serde::Serialize;

use crate::coverage::{Counter, ModuleAssignment};
use crate::module::Thresholds;

/// Result of evaluating one report file or one module.
///
/// The counters keep the raw weights so that module and global totals can be
/// recomputed from them; the `*_reached` values are what gets compared and shown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedReportCoverage {
    pub name: String,
    pub module: ModuleAssignment,

    pub overall_passed: bool,
    pub overall_coverage_reached: f64,
    pub overall_coverage_threshold: f64,
    pub overall_coverage: Counter,

    pub avg_changed_files_passed: bool,
    pub avg_changed_files_coverage_reached: f64,
    pub avg_changed_files_coverage: Counter,

    pub changed_files_passed: IndexMap<String, bool>,
    pub changed_files_threshold: f64,
    pub changed_files_coverage_reached: IndexMap<String, f64>,

    pub per_changed_file_threshold: f64,
}

impl EvaluatedReportCoverage {
    pub fn new(name: impl Into<String>, module: ModuleAssignment) -> Self {
        Self {
            name: name.into(),
            module,
            overall_passed: true,
            overall_coverage_reached: 0.0,
            overall_coverage_threshold: 0.0,
            overall_coverage: Counter::default(),
            avg_changed_files_passed: true,
            avg_changed_files_coverage_reached: 0.0,
            avg_changed_files_coverage: Counter::default(),
            changed_files_passed: IndexMap::new(),
            changed_files_threshold: 0.0,
            changed_files_coverage_reached: IndexMap::new(),
            per_changed_file_threshold: 0.0,
        }
    }

    pub fn set_thresholds(&mut self, thresholds: &Thresholds) {
        self.overall_coverage_threshold = thresholds.overall;
        self.changed_files_threshold = thresholds.changed_files_average;
        self.per_changed_file_threshold = thresholds.per_changed_file;
    }

    /// Fold another record's weights and per-file results into this one.
    /// Per-file entries of `other` replace entries with the same path.
    pub fn merge(&mut self, other: &EvaluatedReportCoverage) {
        self.overall_coverage.append(other.overall_coverage);
        self.avg_changed_files_coverage
            .append(other.avg_changed_files_coverage);
        self.changed_files_passed.extend(
            other
                .changed_files_passed
                .iter()
                .map(|(path, passed)| (path.clone(), *passed)),
        );
        self.changed_files_coverage_reached.extend(
            other
                .changed_files_coverage_reached
                .iter()
                .map(|(path, reached)| (path.clone(), *reached)),
        );
    }

    pub fn has_changed_files(&self) -> bool {
        !self.changed_files_coverage_reached.is_empty()
    }

    /// Changed files below the per-file threshold, with their reached value
    pub fn failed_changed_files(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.changed_files_passed
            .iter()
            .filter(|(_, passed)| !**passed)
            .map(|(path, _)| {
                let reached = self
                    .changed_files_coverage_reached
                    .get(path)
                    .copied()
                    .unwrap_or(0.0);
                (path.as_str(), reached)
            })
    }
}
