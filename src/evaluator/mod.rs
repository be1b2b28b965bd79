//! Coverage evaluation
//!
//! Aggregates the weighted counters of all reports into report, module and
//! global results, resolves which thresholds apply to each of them, and
//! collects the violations that decide the outcome of the run.

mod evaluated;

pub use evaluated::*;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::coverage::{
    format_percentage, round2, weighted_coverage, Counter, MetricKind, ModuleAssignment,
    ReportFileCoverage,
};
use crate::module::{Module, Thresholds};

/// The three threshold levels a run can fail on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdLevel {
    Overall,
    ChangedFilesAverage,
    PerChangedFile,
}

impl ThresholdLevel {
    pub const ALL: [ThresholdLevel; 3] = [
        ThresholdLevel::Overall,
        ThresholdLevel::ChangedFilesAverage,
        ThresholdLevel::PerChangedFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdLevel::Overall => "overall",
            ThresholdLevel::ChangedFilesAverage => "changed-files-average",
            ThresholdLevel::PerChangedFile => "per-changed-file",
        }
    }
}

impl fmt::Display for ThresholdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "overall" => Ok(ThresholdLevel::Overall),
            "changed-files-average" => Ok(ThresholdLevel::ChangedFilesAverage),
            "per-changed-file" => Ok(ThresholdLevel::PerChangedFile),
            _ => anyhow::bail!(
                "Unsupported threshold level: {}. Supported: overall, changed-files-average, per-changed-file",
                s
            ),
        }
    }
}

/// Whether every evaluated entity reached each kind of threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReachedThresholds {
    pub overall: bool,
    pub changed_files_average: bool,
    pub per_changed_file: bool,
}

impl Default for ReachedThresholds {
    fn default() -> Self {
        Self {
            overall: true,
            changed_files_average: true,
            per_changed_file: true,
        }
    }
}

impl ReachedThresholds {
    pub fn reached(&self, level: ThresholdLevel) -> bool {
        match level {
            ThresholdLevel::Overall => self.overall,
            ThresholdLevel::ChangedFilesAverage => self.changed_files_average,
            ThresholdLevel::PerChangedFile => self.per_changed_file,
        }
    }

    /// True when any of the given levels was not reached
    pub fn any_failed(&self, levels: &[ThresholdLevel]) -> bool {
        levels.iter().any(|level| !self.reached(*level))
    }
}

/// Simple mean of already rounded per-file percentages, rounded again.
///
/// Used for the changed files average of a single report: every changed file
/// counts the same, whatever its size. Modules and the global total use
/// `weighted_coverage` on the summed counters instead.
pub fn mean_of_per_file_percentages(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));

    if count == 0 {
        return 0.0;
    }

    round2(sum / count as f64)
}

/// Evaluates all reports of one run against the configured thresholds.
///
/// Build it with [`CoverageEvaluator::new`], call [`CoverageEvaluator::evaluate`]
/// once, then read the public result fields.
#[derive(Debug)]
pub struct CoverageEvaluator {
    reports: Vec<ReportFileCoverage>,
    global_thresholds: Thresholds,
    modules: IndexMap<String, Module>,
    metric: MetricKind,
    skip_unchanged: bool,

    pub total_coverage_overall: f64,
    pub total_coverage_overall_passed: bool,
    pub total_coverage_changed_files: f64,
    pub total_coverage_changed_files_passed: bool,

    pub evaluated_reports_coverage: IndexMap<String, EvaluatedReportCoverage>,
    pub evaluated_modules_coverage: IndexMap<String, EvaluatedReportCoverage>,

    pub violations: Vec<String>,
    pub reached: ReachedThresholds,
}

impl CoverageEvaluator {
    pub fn new(
        reports: Vec<ReportFileCoverage>,
        global_thresholds: Thresholds,
        modules: IndexMap<String, Module>,
        metric: MetricKind,
        skip_unchanged: bool,
    ) -> Self {
        Self {
            reports,
            global_thresholds,
            modules,
            metric,
            skip_unchanged,
            total_coverage_overall: 0.0,
            total_coverage_overall_passed: false,
            total_coverage_changed_files: 0.0,
            total_coverage_changed_files_passed: false,
            evaluated_reports_coverage: IndexMap::new(),
            evaluated_modules_coverage: IndexMap::new(),
            violations: Vec::new(),
            reached: ReachedThresholds::default(),
        }
    }

    pub fn metric(&self) -> MetricKind {
        self.metric
    }

    pub fn global_thresholds(&self) -> &Thresholds {
        &self.global_thresholds
    }

    /// Number of changed files over all input reports
    pub fn changed_files_count(&self) -> usize {
        self.reports.iter().map(|r| r.changed_files_count()).sum()
    }

    pub fn evaluate(&mut self) {
        let mut global_overall = Counter::default();
        let mut global_changed_files = Counter::default();

        let mut evaluated_reports = Vec::with_capacity(self.reports.len());
        for report in &self.reports {
            let evaluated = self.evaluate_report(report);
            global_overall.append(evaluated.overall_coverage);
            global_changed_files.append(evaluated.avg_changed_files_coverage);
            evaluated_reports.push(evaluated);
        }

        for evaluated in evaluated_reports {
            let name = evaluated.name.clone();
            if self
                .evaluated_reports_coverage
                .insert(name.clone(), evaluated)
                .is_some()
            {
                warn!("Duplicate report name '{}', keeping the last report", name);
            }
        }

        if !self.modules.is_empty() {
            let evaluated_modules: Vec<_> = self
                .modules
                .keys()
                .map(|name| self.evaluate_module(name))
                .collect();

            for evaluated in evaluated_modules {
                self.evaluated_modules_coverage
                    .insert(evaluated.name.clone(), evaluated);
            }
        }

        self.total_coverage_overall = weighted_coverage(&global_overall);
        self.total_coverage_changed_files = weighted_coverage(&global_changed_files);
        self.total_coverage_overall_passed =
            self.total_coverage_overall >= self.global_thresholds.overall;
        self.total_coverage_changed_files_passed = self.changed_files_count() == 0
            || self.total_coverage_changed_files >= self.global_thresholds.changed_files_average;

        let (violations, reached) = self.review_violations();
        self.violations = violations;
        self.reached = reached;

        info!(
            "Evaluated {} report(s) and {} module(s): overall {}%, changed files {}%, {} violation(s)",
            self.evaluated_reports_coverage.len(),
            self.evaluated_modules_coverage.len(),
            format_percentage(self.total_coverage_overall),
            format_percentage(self.total_coverage_changed_files),
            self.violations.len()
        );
    }

    /// Thresholds of the assigned module, or the global ones
    pub fn thresholds_for(&self, module: &ModuleAssignment) -> Thresholds {
        module
            .name()
            .and_then(|name| self.modules.get(name))
            .map(|m| m.thresholds)
            .unwrap_or(self.global_thresholds)
    }

    fn evaluate_report(&self, report: &ReportFileCoverage) -> EvaluatedReportCoverage {
        let mut evaluated = EvaluatedReportCoverage::new(&report.name, report.module.clone());

        let overall = *report.overall_coverage.counter(self.metric);
        evaluated.overall_coverage.append(overall);
        evaluated.overall_coverage_reached = overall.coverage();

        for (path, file_coverage) in &report.changed_files_coverage {
            let counter = *file_coverage.counter(self.metric);
            evaluated.avg_changed_files_coverage.append(counter);
            evaluated
                .changed_files_coverage_reached
                .insert(path.clone(), counter.coverage());
        }

        let thresholds = self.thresholds_for(&evaluated.module);
        let average = mean_of_per_file_percentages(
            evaluated.changed_files_coverage_reached.values().copied(),
        );
        apply_thresholds(&mut evaluated, &thresholds, average);

        let per_changed_file: Vec<(String, bool)> = evaluated
            .changed_files_coverage_reached
            .iter()
            .map(|(path, reached)| (path.clone(), *reached >= thresholds.per_changed_file))
            .collect();
        evaluated.changed_files_passed.extend(per_changed_file);

        debug!(
            "Report '{}' ({}): overall {}% passed={}, changed files {}% passed={}",
            evaluated.name,
            evaluated.module,
            format_percentage(evaluated.overall_coverage_reached),
            evaluated.overall_passed,
            format_percentage(evaluated.avg_changed_files_coverage_reached),
            evaluated.avg_changed_files_passed
        );

        evaluated
    }

    fn evaluate_module(&self, name: &str) -> EvaluatedReportCoverage {
        let assignment = ModuleAssignment::Matched(name.to_string());
        let mut evaluated = EvaluatedReportCoverage::new(name, assignment.clone());

        for report in self.evaluated_reports_coverage.values() {
            if report.module == assignment {
                evaluated.merge(report);
            }
        }

        evaluated.overall_coverage_reached = weighted_coverage(&evaluated.overall_coverage);

        let thresholds = self.thresholds_for(&assignment);
        let average = weighted_coverage(&evaluated.avg_changed_files_coverage);
        apply_thresholds(&mut evaluated, &thresholds, average);

        debug!(
            "Module '{}': overall {}% passed={}, changed files {}% passed={}",
            name,
            format_percentage(evaluated.overall_coverage_reached),
            evaluated.overall_passed,
            format_percentage(evaluated.avg_changed_files_coverage_reached),
            evaluated.avg_changed_files_passed
        );

        evaluated
    }

    fn review_violations(&self) -> (Vec<String>, ReachedThresholds) {
        let mut violations = Vec::new();
        let mut reached = ReachedThresholds::default();

        if self.skip_unchanged && self.changed_files_count() == 0 {
            info!("No changed files, skipping threshold review");
            return (violations, reached);
        }

        if !self.total_coverage_overall_passed {
            violations.push(format!(
                "Global overall coverage {} is below the threshold {}.",
                format_percentage(self.total_coverage_overall),
                format_percentage(self.global_thresholds.overall)
            ));
            reached.overall = false;
        }
        if !self.total_coverage_changed_files_passed {
            violations.push(format!(
                "Global changed files coverage {} is below the threshold {}.",
                format_percentage(self.total_coverage_changed_files),
                format_percentage(self.global_thresholds.changed_files_average)
            ));
            reached.changed_files_average = false;
        }

        for (name, module) in &self.evaluated_modules_coverage {
            if self.skip_unchanged && !module.has_changed_files() {
                continue;
            }
            review_entity("Module", name, module, &mut violations, &mut reached);
        }

        for (name, report) in &self.evaluated_reports_coverage {
            if self.skip_unchanged && !report.has_changed_files() {
                continue;
            }
            review_entity("Report", name, report, &mut violations, &mut reached);

            for (path, file_reached) in report.failed_changed_files() {
                violations.push(format!(
                    "Report '{}' changed file '{}' coverage {} is below the threshold {}.",
                    name,
                    path,
                    format_percentage(file_reached),
                    format_percentage(report.per_changed_file_threshold)
                ));
                reached.per_changed_file = false;
            }
        }

        (violations, reached)
    }
}

/// Record thresholds and decide overall/average pass, with a vacuous pass for zero weight
fn apply_thresholds(
    evaluated: &mut EvaluatedReportCoverage,
    thresholds: &Thresholds,
    changed_files_average: f64,
) {
    evaluated.set_thresholds(thresholds);

    if evaluated.overall_coverage.is_zero_weight() {
        evaluated.overall_coverage_reached = 0.0;
        evaluated.overall_passed = true;
    } else {
        evaluated.overall_passed = evaluated.overall_coverage_reached >= thresholds.overall;
    }

    if evaluated.avg_changed_files_coverage.is_zero_weight() {
        evaluated.avg_changed_files_coverage_reached = 0.0;
        evaluated.avg_changed_files_passed = true;
    } else {
        evaluated.avg_changed_files_coverage_reached = changed_files_average;
        evaluated.avg_changed_files_passed =
            changed_files_average >= thresholds.changed_files_average;
    }
}

fn review_entity(
    scope: &str,
    name: &str,
    evaluated: &EvaluatedReportCoverage,
    violations: &mut Vec<String>,
    reached: &mut ReachedThresholds,
) {
    if !evaluated.overall_passed {
        violations.push(format!(
            "{} '{}' overall coverage {} is below the threshold {}.",
            scope,
            name,
            format_percentage(evaluated.overall_coverage_reached),
            format_percentage(evaluated.overall_coverage_threshold)
        ));
        reached.overall = false;
    }
    if !evaluated.avg_changed_files_passed {
        violations.push(format!(
            "{} '{}' changed files coverage {} is below the threshold {}.",
            scope,
            name,
            format_percentage(evaluated.avg_changed_files_coverage_reached),
            format_percentage(evaluated.changed_files_threshold)
        ));
        reached.changed_files_average = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::Coverage;
    use crate::module::ThresholdOverrides;

    fn instruction(missed: u64, covered: u64) -> Coverage {
        Coverage {
            instruction: Counter::new(missed, covered),
            ..Default::default()
        }
    }

    fn report(name: &str, overall: Coverage, changed: &[(&str, Coverage)]) -> ReportFileCoverage {
        let changed_files = changed
            .iter()
            .map(|(path, coverage)| (path.to_string(), *coverage))
            .collect();
        ReportFileCoverage::new(format!("{}/jacoco.xml", name), name, overall, changed_files)
    }

    fn sample_report() -> ReportFileCoverage {
        report(
            "Sample Report Name",
            Coverage {
                instruction: Counter::new(5, 10),
                branch: Counter::new(3, 7),
                line: Counter::new(2, 8),
                complexity: Counter::new(1, 9),
                method: Counter::new(4, 6),
                class: Counter::new(0, 5),
            },
            &[(
                "com/example/Example.java",
                Coverage {
                    instruction: Counter::new(1, 9),
                    line: Counter::new(2, 8),
                    ..Default::default()
                },
            )],
        )
    }

    fn evaluator(reports: Vec<ReportFileCoverage>, thresholds: Thresholds) -> CoverageEvaluator {
        CoverageEvaluator::new(reports, thresholds, IndexMap::new(), MetricKind::Instruction, false)
    }

    fn module(name: &str, overrides: ThresholdOverrides, global: &Thresholds) -> (String, Module) {
        (name.to_string(), Module::new(name, name, &overrides, global))
    }

    #[test]
    fn test_end_to_end_passing() {
        let mut evaluator = evaluator(vec![sample_report()], Thresholds::new(50.0, 50.0, 0.0));
        evaluator.evaluate();

        assert_eq!(evaluator.total_coverage_overall, 66.67);
        assert_eq!(evaluator.total_coverage_changed_files, 90.0);
        assert!(evaluator.total_coverage_overall_passed);
        assert!(evaluator.total_coverage_changed_files_passed);
        assert!(evaluator.violations.is_empty());
        assert_eq!(evaluator.reached, ReachedThresholds::default());
    }

    #[test]
    fn test_end_to_end_failing() {
        let mut evaluator = evaluator(vec![sample_report()], Thresholds::new(70.0, 95.0, 0.0));
        evaluator.evaluate();

        assert!(!evaluator.total_coverage_overall_passed);
        assert!(!evaluator.total_coverage_changed_files_passed);
        let overall = "Global overall coverage 66.67 is below the threshold 70.0.";
        let changed = "Global changed files coverage 90.0 is below the threshold 95.0.";
        assert!(evaluator.violations.iter().any(|v| v == overall));
        assert!(evaluator.violations.iter().any(|v| v == changed));
        assert!(!evaluator.reached.overall);
        assert!(!evaluator.reached.changed_files_average);
        assert!(evaluator.reached.per_changed_file);
    }

    #[test]
    fn test_report_violations_use_report_name() {
        let mut evaluator = evaluator(vec![sample_report()], Thresholds::new(70.0, 95.0, 95.0));
        evaluator.evaluate();

        let prefix = "Report 'Sample Report Name'";
        assert_eq!(
            evaluator.violations,
            vec![
                "Global overall coverage 66.67 is below the threshold 70.0.".to_string(),
                "Global changed files coverage 90.0 is below the threshold 95.0.".to_string(),
                format!("{} overall coverage 66.67 is below the threshold 70.0.", prefix),
                format!("{} changed files coverage 90.0 is below the threshold 95.0.", prefix),
                format!(
                    "{} changed file 'com/example/Example.java' coverage 90.0 is below the threshold 95.0.",
                    prefix
                ),
            ]
        );
        assert!(!evaluator.reached.per_changed_file);
    }

    #[test]
    fn test_selected_metric_is_used() {
        let mut evaluator = CoverageEvaluator::new(
            vec![sample_report()],
            Thresholds::new(75.0, 0.0, 0.0),
            IndexMap::new(),
            MetricKind::Line,
            false,
        );
        evaluator.evaluate();

        assert_eq!(evaluator.metric(), MetricKind::Line);
        assert_eq!(evaluator.total_coverage_overall, 80.0);
        assert!(evaluator.total_coverage_overall_passed);
        assert_eq!(evaluator.total_coverage_changed_files, 80.0);
    }

    #[test]
    fn test_zero_weight_is_vacuous_pass() {
        let empty = report("empty", Coverage::default(), &[]);
        let mut evaluator = evaluator(vec![empty], Thresholds::new(100.0, 100.0, 100.0));
        evaluator.evaluate();

        let evaluated = &evaluator.evaluated_reports_coverage["empty"];
        assert!(evaluated.overall_passed);
        assert_eq!(evaluated.overall_coverage_reached, 0.0);
        assert!(evaluated.avg_changed_files_passed);
        assert_eq!(evaluated.avg_changed_files_coverage_reached, 0.0);
    }

    #[test]
    fn test_no_changed_files_is_vacuous_global_pass() {
        let no_changes = report("a", instruction(1, 9), &[]);
        let mut evaluator = evaluator(vec![no_changes], Thresholds::new(50.0, 80.0, 80.0));
        evaluator.evaluate();

        assert_eq!(evaluator.changed_files_count(), 0);
        assert_eq!(evaluator.total_coverage_changed_files, 0.0);
        assert!(evaluator.total_coverage_changed_files_passed);
        assert!(evaluator.violations.is_empty());
    }

    #[test]
    fn test_report_average_is_mean_of_percentages() {
        let unequal = report(
            "a",
            instruction(0, 10),
            &[("Small.java", instruction(0, 1)), ("Large.java", instruction(10_000, 0))],
        );
        let mut evaluator = evaluator(vec![unequal], Thresholds::default());
        evaluator.evaluate();

        let evaluated = &evaluator.evaluated_reports_coverage["a"];
        assert_eq!(evaluated.avg_changed_files_coverage_reached, 50.0);
        assert_eq!(evaluated.avg_changed_files_coverage, Counter::new(10_000, 1));
        assert_eq!(evaluator.total_coverage_changed_files, 0.01);
    }

    #[test]
    fn test_mean_of_per_file_percentages() {
        assert_eq!(mean_of_per_file_percentages([100.0, 0.0]), 50.0);
        assert_eq!(mean_of_per_file_percentages([66.67, 33.33, 50.0]), 50.0);
        assert_eq!(mean_of_per_file_percentages([10.0, 10.0, 10.01]), 10.0);
        assert_eq!(mean_of_per_file_percentages(Vec::<f64>::new()), 0.0);
    }

    #[test]
    fn test_per_changed_file_threshold() {
        let mixed = report(
            "a",
            instruction(0, 10),
            &[("Good.java", instruction(1, 9)), ("Bad.java", instruction(9, 1))],
        );
        let mut evaluator = evaluator(vec![mixed], Thresholds::new(0.0, 0.0, 50.0));
        evaluator.evaluate();

        let evaluated = &evaluator.evaluated_reports_coverage["a"];
        assert!(evaluated.changed_files_passed["Good.java"]);
        assert!(!evaluated.changed_files_passed["Bad.java"]);
        assert_eq!(evaluated.per_changed_file_threshold, 50.0);
        assert_eq!(
            evaluator.violations,
            vec!["Report 'a' changed file 'Bad.java' coverage 10.0 is below the threshold 50.0."]
        );
        assert!(evaluator.reached.overall);
        assert!(evaluator.reached.changed_files_average);
        assert!(!evaluator.reached.per_changed_file);
    }

    #[test]
    fn test_zero_weight_changed_file_fails_per_file_threshold() {
        let untouched = report(
            "a",
            instruction(0, 10),
            &[("Real.java", instruction(0, 10)), ("Empty.java", Coverage::default())],
        );
        let mut evaluator = evaluator(vec![untouched], Thresholds::new(0.0, 0.0, 80.0));
        evaluator.evaluate();

        let evaluated = &evaluator.evaluated_reports_coverage["a"];
        assert_eq!(evaluated.changed_files_coverage_reached["Empty.java"], 0.0);
        assert!(evaluated.changed_files_passed["Real.java"]);
        assert!(!evaluated.changed_files_passed["Empty.java"]);
        assert_eq!(evaluated.avg_changed_files_coverage_reached, 50.0);
        assert_eq!(
            evaluator.violations,
            vec!["Report 'a' changed file 'Empty.java' coverage 0.0 is below the threshold 80.0."]
        );
        assert!(!evaluator.reached.per_changed_file);
    }

    #[test]
    fn test_thresholds_for_module_and_global() {
        let global = Thresholds::new(80.0, 70.0, 60.0);
        let modules: IndexMap<_, _> = [module(
            "core",
            ThresholdOverrides {
                overall: Some(40.0),
                ..Default::default()
            },
            &global,
        )]
        .into_iter()
        .collect();
        let evaluator =
            CoverageEvaluator::new(Vec::new(), global, modules, MetricKind::Instruction, false);

        assert_eq!(
            evaluator.thresholds_for(&ModuleAssignment::Matched("core".into())),
            Thresholds::new(40.0, 70.0, 60.0)
        );
        assert_eq!(
            evaluator.thresholds_for(&ModuleAssignment::Matched("missing".into())),
            global
        );
        assert_eq!(evaluator.thresholds_for(&ModuleAssignment::Unmatched), global);
    }

    #[test]
    fn test_module_aggregation_is_weighted() {
        let global = Thresholds::new(50.0, 50.0, 0.0);
        let modules: IndexMap<_, _> = [
            module("core", ThresholdOverrides::default(), &global),
            module(
                "web",
                ThresholdOverrides {
                    overall: Some(90.0),
                    ..Default::default()
                },
                &global,
            ),
        ]
        .into_iter()
        .collect();

        let reports = vec![
            report("core-a", instruction(1, 3), &[("core/A.java", instruction(0, 1))])
                .with_module(ModuleAssignment::Matched("core".into())),
            report("core-b", instruction(3, 1), &[("core/B.java", instruction(99, 1))])
                .with_module(ModuleAssignment::Matched("core".into())),
            report("web", instruction(2, 8), &[])
                .with_module(ModuleAssignment::Matched("web".into())),
            report("orphan", instruction(10, 0), &[]),
        ];

        let mut evaluator =
            CoverageEvaluator::new(reports, global, modules, MetricKind::Instruction, false);
        evaluator.evaluate();

        let names: Vec<_> = evaluator.evaluated_modules_coverage.keys().cloned().collect();
        assert_eq!(names, vec!["core", "web"]);

        let core = &evaluator.evaluated_modules_coverage["core"];
        assert_eq!(core.overall_coverage, Counter::new(4, 4));
        assert_eq!(core.overall_coverage_reached, 50.0);
        assert!(core.overall_passed);
        assert_eq!(core.avg_changed_files_coverage, Counter::new(99, 2));
        assert_eq!(core.avg_changed_files_coverage_reached, 1.98);
        assert!(!core.avg_changed_files_passed);
        assert_eq!(core.changed_files_coverage_reached.len(), 2);

        // the per-report mean of the same files would have been 50.5
        assert_eq!(
            evaluator.evaluated_reports_coverage["core-b"].avg_changed_files_coverage_reached,
            1.0
        );

        let web = &evaluator.evaluated_modules_coverage["web"];
        assert_eq!(web.overall_coverage_reached, 80.0);
        assert_eq!(web.overall_coverage_threshold, 90.0);
        assert!(!web.overall_passed);

        let web_overall = "Module 'web' overall coverage 80.0 is below the threshold 90.0.";
        let core_changed = "Module 'core' changed files coverage 1.98 is below the threshold 50.0.";
        assert!(evaluator.violations.iter().any(|v| v == web_overall));
        assert!(evaluator.violations.iter().any(|v| v == core_changed));
    }

    #[test]
    fn test_unmatched_reports_are_not_grouped() {
        let global = Thresholds::new(50.0, 0.0, 0.0);
        let modules: IndexMap<_, _> =
            [module("core", ThresholdOverrides::default(), &global)].into_iter().collect();

        let reports = vec![
            report("first", instruction(10, 0), &[]),
            report("second", instruction(0, 10), &[]),
        ];

        let mut evaluator =
            CoverageEvaluator::new(reports, global, modules, MetricKind::Instruction, false);
        evaluator.evaluate();

        assert_eq!(evaluator.evaluated_modules_coverage.len(), 1);
        assert!(!evaluator.evaluated_modules_coverage.contains_key("Unknown"));
        assert!(!evaluator.evaluated_reports_coverage["first"].overall_passed);
        assert!(evaluator.evaluated_reports_coverage["second"].overall_passed);
    }

    #[test]
    fn test_report_uses_module_thresholds() {
        let global = Thresholds::new(90.0, 90.0, 90.0);
        let modules: IndexMap<_, _> = [module(
            "core",
            ThresholdOverrides {
                overall: Some(10.0),
                changed_files_average: Some(10.0),
                per_changed_file: Some(10.0),
            },
            &global,
        )]
        .into_iter()
        .collect();

        let reports = vec![report("core", instruction(5, 5), &[("core/A.java", instruction(5, 5))])
            .with_module(ModuleAssignment::Matched("core".into()))];

        let mut evaluator =
            CoverageEvaluator::new(reports, global, modules, MetricKind::Instruction, false);
        evaluator.evaluate();

        let evaluated = &evaluator.evaluated_reports_coverage["core"];
        assert_eq!(evaluated.overall_coverage_threshold, 10.0);
        assert!(evaluated.overall_passed);
        assert!(evaluated.changed_files_passed["core/A.java"]);

        // the global totals still use the global thresholds
        assert!(!evaluator.total_coverage_overall_passed);
        assert_eq!(
            evaluator.violations,
            vec![
                "Global overall coverage 50.0 is below the threshold 90.0.",
                "Global changed files coverage 50.0 is below the threshold 90.0.",
            ]
        );
    }

    #[test]
    fn test_skip_unchanged_without_changes_skips_everything() {
        let reports = vec![report("a", instruction(9, 1), &[])];
        let mut evaluator = CoverageEvaluator::new(
            reports,
            Thresholds::new(80.0, 80.0, 80.0),
            IndexMap::new(),
            MetricKind::Instruction,
            true,
        );
        evaluator.evaluate();

        assert!(!evaluator.total_coverage_overall_passed);
        assert!(evaluator.violations.is_empty());
        assert!(evaluator.reached.overall);
    }

    #[test]
    fn test_skip_unchanged_skips_reports_without_changes() {
        let reports = vec![
            report("unchanged", instruction(9, 1), &[]),
            report("changed", instruction(1, 9), &[("B.java", instruction(1, 9))]),
        ];
        let mut evaluator = CoverageEvaluator::new(
            reports,
            Thresholds::new(50.0, 50.0, 50.0),
            IndexMap::new(),
            MetricKind::Instruction,
            true,
        );
        evaluator.evaluate();

        assert_eq!(evaluator.total_coverage_overall, 50.0);
        assert!(evaluator.violations.is_empty());
    }

    #[test]
    fn test_skip_unchanged_skips_modules_without_changes() {
        let global = Thresholds::new(50.0, 0.0, 0.0);
        let modules: IndexMap<_, _> = [
            module("core", ThresholdOverrides::default(), &global),
            module(
                "web",
                ThresholdOverrides {
                    overall: Some(90.0),
                    ..Default::default()
                },
                &global,
            ),
        ]
        .into_iter()
        .collect();
        let reports = || {
            vec![
                report("core", instruction(1, 9), &[("core/A.java", instruction(0, 10))])
                    .with_module(ModuleAssignment::Matched("core".into())),
                report("web", instruction(5, 5), &[])
                    .with_module(ModuleAssignment::Matched("web".into())),
            ]
        };

        let mut skipping = CoverageEvaluator::new(
            reports(),
            global,
            modules.clone(),
            MetricKind::Instruction,
            true,
        );
        skipping.evaluate();

        assert!(!skipping.evaluated_modules_coverage["web"].overall_passed);
        assert!(skipping.violations.is_empty());
        assert!(skipping.reached.overall);

        let mut reviewing =
            CoverageEvaluator::new(reports(), global, modules, MetricKind::Instruction, false);
        reviewing.evaluate();

        assert_eq!(
            reviewing.violations,
            vec![
                "Module 'web' overall coverage 50.0 is below the threshold 90.0.",
                "Report 'web' overall coverage 50.0 is below the threshold 90.0.",
            ]
        );
        assert!(!reviewing.reached.overall);
    }

    #[test]
    fn test_module_without_reports_is_vacuous_pass() {
        let global = Thresholds::new(80.0, 80.0, 80.0);
        let modules: IndexMap<_, _> = [
            module("core", ThresholdOverrides::default(), &global),
            module("empty", ThresholdOverrides::default(), &global),
        ]
        .into_iter()
        .collect();
        let reports = vec![report("core", instruction(1, 9), &[("core/A.java", instruction(1, 9))])
            .with_module(ModuleAssignment::Matched("core".into()))];

        let mut evaluator =
            CoverageEvaluator::new(reports, global, modules, MetricKind::Instruction, false);
        evaluator.evaluate();

        let empty = &evaluator.evaluated_modules_coverage["empty"];
        assert!(empty.overall_coverage.is_zero_weight());
        assert_eq!(empty.overall_coverage_reached, 0.0);
        assert!(empty.overall_passed);
        assert!(empty.avg_changed_files_passed);
        assert!(!empty.has_changed_files());
        assert!(evaluator.violations.is_empty());
    }

    #[test]
    fn test_duplicate_report_names_keep_last() {
        let reports = vec![
            report("same", instruction(10, 0), &[]),
            report("same", instruction(0, 10), &[]),
        ];
        let mut evaluator = evaluator(reports, Thresholds::new(50.0, 0.0, 0.0));
        evaluator.evaluate();

        assert_eq!(evaluator.evaluated_reports_coverage.len(), 1);
        assert_eq!(
            evaluator.evaluated_reports_coverage["same"].overall_coverage_reached,
            100.0
        );
        // both reports still count toward the global total
        assert_eq!(evaluator.total_coverage_overall, 50.0);
    }

    #[test]
    fn test_report_order_is_input_order() {
        let reports = vec![
            report("zeta", instruction(0, 1), &[]),
            report("alpha", instruction(0, 1), &[]),
        ];
        let mut evaluator = evaluator(reports, Thresholds::default());
        evaluator.evaluate();

        let names: Vec<_> = evaluator.evaluated_reports_coverage.keys().cloned().collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_new_evaluator_is_not_evaluated() {
        let evaluator = evaluator(vec![sample_report()], Thresholds::default());
        assert_eq!(evaluator.total_coverage_overall, 0.0);
        assert!(!evaluator.total_coverage_overall_passed);
        assert!(evaluator.evaluated_reports_coverage.is_empty());
        assert_eq!(evaluator.changed_files_count(), 1);
    }

    #[test]
    fn test_threshold_levels() {
        assert_eq!(
            "changed-files-average".parse::<ThresholdLevel>().unwrap(),
            ThresholdLevel::ChangedFilesAverage
        );
        assert!("everything".parse::<ThresholdLevel>().is_err());

        let reached = ReachedThresholds {
            overall: true,
            changed_files_average: false,
            per_changed_file: true,
        };
        assert!(reached.any_failed(&ThresholdLevel::ALL));
        assert!(!reached.any_failed(&[ThresholdLevel::Overall, ThresholdLevel::PerChangedFile]));
        assert!(!reached.any_failed(&[]));
    }
}
