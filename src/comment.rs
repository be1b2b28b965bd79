//! Markdown rendering of the pull request comment

use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::config::CommentLevel;
use crate::coverage::{format_percentage, round2, MetricKind};
use crate::evaluator::{CoverageEvaluator, EvaluatedReportCoverage};

pub const NO_CHANGED_FILES: &str = "No changed file in reports.";

/// Presentation settings of the comment
#[derive(Debug, Clone)]
pub struct CommentOptions {
    pub title: String,
    pub metric: MetricKind,
    pub comment_level: CommentLevel,
    pub skip_unchanged: bool,
    pub pass_symbol: String,
    pub fail_symbol: String,
    pub repository: String,
    pub pr_number: Option<u64>,
}

pub struct CommentRenderer<'a> {
    evaluator: &'a CoverageEvaluator,
    baseline: Option<&'a CoverageEvaluator>,
    options: &'a CommentOptions,
}

impl<'a> CommentRenderer<'a> {
    pub fn new(
        evaluator: &'a CoverageEvaluator,
        baseline: Option<&'a CoverageEvaluator>,
        options: &'a CommentOptions,
    ) -> Self {
        Self {
            evaluator,
            baseline,
            options,
        }
    }

    /// First line of the comment, used to find it again on later runs
    pub fn title(&self) -> String {
        format!("**{}**", self.options.title)
    }

    pub fn render(&self) -> String {
        let mut body = self.title();
        body.push_str("\n\n");
        body.push_str(&self.summary_table());

        if self.options.comment_level == CommentLevel::Full {
            if !self.evaluator.evaluated_modules_coverage.is_empty() {
                body.push_str("\n\n");
                body.push_str(&self.modules_table());
            }

            body.push_str("\n\n");
            body.push_str(&self.reports_table());

            body.push_str("\n\n");
            body.push_str(&self.changed_files_table());
        }

        body
    }

    fn status(&self, passed: bool) -> &str {
        if passed {
            &self.options.pass_symbol
        } else {
            &self.options.fail_symbol
        }
    }

    fn summary_table(&self) -> String {
        let evaluator = self.evaluator;
        let thresholds = evaluator.global_thresholds();
        let metric = self.options.metric;

        match self.baseline {
            None => format!(
                "| Metric ({}) | Coverage | Threshold | Status |\n\
                 |----------------------|----------|-----------|--------|\n\
                 | **Overall**       | {} | {} | {} |\n\
                 | **Changed Files** | {} | {} | {} |",
                metric,
                percent(evaluator.total_coverage_overall),
                percent(thresholds.overall),
                self.status(evaluator.total_coverage_overall_passed),
                percent(evaluator.total_coverage_changed_files),
                percent(thresholds.changed_files_average),
                self.status(evaluator.total_coverage_changed_files_passed),
            ),
            Some(baseline) => format!(
                "| Metric ({}) | Coverage | Threshold | Δ Coverage | Status |\n\
                 |-------------------|-----|-----|-----|----|\n\
                 | **Overall**       | {} | {} | {} | {} |\n\
                 | **Changed Files** | {} | {} | {} | {} |",
                metric,
                percent(evaluator.total_coverage_overall),
                percent(thresholds.overall),
                delta(evaluator.total_coverage_overall, baseline.total_coverage_overall),
                self.status(evaluator.total_coverage_overall_passed),
                percent(evaluator.total_coverage_changed_files),
                percent(thresholds.changed_files_average),
                delta(
                    evaluator.total_coverage_changed_files,
                    baseline.total_coverage_changed_files
                ),
                self.status(evaluator.total_coverage_changed_files_passed),
            ),
        }
    }

    fn modules_table(&self) -> String {
        let baseline = self.baseline.map(|b| &b.evaluated_modules_coverage);
        self.entity_table("Module", &self.evaluator.evaluated_modules_coverage, baseline)
    }

    fn reports_table(&self) -> String {
        let baseline = self.baseline.map(|b| &b.evaluated_reports_coverage);
        self.entity_table("Report", &self.evaluator.evaluated_reports_coverage, baseline)
    }

    fn entity_table(
        &self,
        label: &str,
        entries: &IndexMap<String, EvaluatedReportCoverage>,
        baseline: Option<&IndexMap<String, EvaluatedReportCoverage>>,
    ) -> String {
        let mut table = match baseline {
            None => format!(
                "| {} | Coverage (O/Ch) | Threshold (O/Ch) | Status (O/Ch) |\n\
                 |--------|----------|-----------|--------|",
                label
            ),
            Some(_) => format!(
                "| {} | Coverage (O/Ch) | Threshold (O/Ch) | Δ Coverage (O/Ch) | Status (O/Ch) |\n\
                 |--------|----------|-----------|------------|--------|",
                label
            ),
        };

        let mut names: Vec<&String> = entries.keys().collect();
        names.sort();

        let mut rows = 0;
        for name in names {
            let entry = &entries[name];
            if self.options.skip_unchanged && !entry.has_changed_files() {
                continue;
            }
            rows += 1;

            let coverage = format!(
                "{} / {}",
                percent(entry.overall_coverage_reached),
                percent(entry.avg_changed_files_coverage_reached)
            );
            let threshold = format!(
                "{} / {}",
                percent(entry.overall_coverage_threshold),
                percent(entry.changed_files_threshold)
            );
            let status = format!(
                "{}/{}",
                self.status(entry.overall_passed),
                self.status(entry.avg_changed_files_passed)
            );

            match baseline {
                None => table.push_str(&format!(
                    "\n| `{}` | {} | {} | {} |",
                    name, coverage, threshold, status
                )),
                Some(baseline) => {
                    let (overall, changed) = match baseline.get(name) {
                        Some(base) => (
                            delta(entry.overall_coverage_reached, base.overall_coverage_reached),
                            delta(
                                entry.avg_changed_files_coverage_reached,
                                base.avg_changed_files_coverage_reached,
                            ),
                        ),
                        None => (delta(0.0, 0.0), delta(0.0, 0.0)),
                    };
                    table.push_str(&format!(
                        "\n| `{}` | {} | {} | {} / {} | {} |",
                        name, coverage, threshold, overall, changed, status
                    ));
                }
            }
        }

        if rows == 0 {
            table.push_str("\n\n");
            table.push_str(NO_CHANGED_FILES);
        }

        table
    }

    fn changed_files_table(&self) -> String {
        let mut table = match self.baseline {
            None => "| File Path | Coverage | Threshold | Status |\n\
                     |-----------|----------|-----------|--------|"
                .to_string(),
            Some(_) => "| File Path | Coverage | Threshold | Δ Coverage | Status |\n\
                        |-----------|----------|-----------|------------|--------|"
                .to_string(),
        };

        let mut rows: Vec<String> = Vec::new();
        for (report_name, report) in &self.evaluator.evaluated_reports_coverage {
            for (path, reached) in &report.changed_files_coverage_reached {
                let link = format!("[{}]({})", file_name(path), self.diff_link(path));
                let threshold = percent(report.per_changed_file_threshold);
                let passed = report.changed_files_passed.get(path).copied().unwrap_or(true);
                let status = self.status(passed);

                let row = match self.baseline {
                    None => format!(
                        "\n| {} | {} | {} | {} |",
                        link,
                        percent(*reached),
                        threshold,
                        status
                    ),
                    Some(baseline) => {
                        let base = baseline
                            .evaluated_reports_coverage
                            .get(report_name)
                            .and_then(|r| r.changed_files_coverage_reached.get(path))
                            .copied()
                            .unwrap_or(*reached);
                        format!(
                            "\n| {} | {} | {} | {} | {} |",
                            link,
                            percent(*reached),
                            threshold,
                            delta(*reached, base),
                            status
                        )
                    }
                };
                rows.push(row);
            }
        }

        if rows.is_empty() {
            table.push_str("\n\n");
            table.push_str(NO_CHANGED_FILES);
        } else {
            rows.sort();
            table.push_str(&rows.concat());
        }

        table
    }

    fn diff_link(&self, path: &str) -> String {
        let pr = self
            .options
            .pr_number
            .map(|n| n.to_string())
            .unwrap_or_default();
        format!(
            "https://github.com/{}/pull/{}/files#diff-{}",
            self.options.repository,
            pr,
            file_hash(path)
        )
    }
}

fn percent(value: f64) -> String {
    format!("{}%", format_percentage(value))
}

/// Signed difference to the baseline, `+` only for a real increase
fn delta(current: f64, baseline: f64) -> String {
    let diff = current - baseline;
    // adding 0.0 turns a rounded -0.0 into 0.0
    let rounded = round2(diff) + 0.0;
    let sign = if diff > 0.001 { "+" } else { "" };
    format!("{}{}%", sign, format_percentage(rounded))
}

/// Anchor GitHub uses for a file in the pull request diff view
pub fn file_hash(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hex::encode(hasher.finalize())
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}
