//! GitHub Actions outputs and run outcome

use anyhow::{Context, Result};
use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::coverage::format_percentage;
use crate::evaluator::{CoverageEvaluator, ReachedThresholds, ThresholdLevel};

pub const DEFAULT_OUTPUT_FILE: &str = "default_output.txt";

/// Appends `name=value` records to the Actions output file
pub struct ActionOutput {
    path: PathBuf,
}

impl ActionOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$GITHUB_OUTPUT`, or `default_output.txt` outside of Actions
    pub fn from_env() -> Self {
        let path = env::var("GITHUB_OUTPUT")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open output file {}", self.path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write output file {}", self.path.display()))
    }

    pub fn set_output(&self, name: &str, value: &str) -> Result<()> {
        self.append(&format!("{}={}\n", name, value))
    }

    /// Multiline value in heredoc form
    pub fn set_output_text(&self, name: &str, value: &str) -> Result<()> {
        self.append(&format!("{}<<EOF\n{}\nEOF\n", name, value))
    }

    /// Write every coverage output of an evaluated run
    pub fn write_evaluation(&self, evaluator: &CoverageEvaluator) -> Result<()> {
        self.set_output("coverage-overall", &format_percentage(evaluator.total_coverage_overall))?;
        self.set_output(
            "coverage-changed-files",
            &format_percentage(evaluator.total_coverage_changed_files),
        )?;
        self.set_output(
            "coverage-overall-passed",
            bool_output(evaluator.total_coverage_overall_passed),
        )?;
        self.set_output(
            "coverage-changed-files-passed",
            bool_output(evaluator.total_coverage_changed_files_passed),
        )?;

        let reports = serde_json::to_string(&evaluator.evaluated_reports_coverage)
            .context("Failed to serialize reports coverage")?;
        self.set_output_text("reports-coverage", &reports)?;

        let modules = serde_json::to_string(&evaluator.evaluated_modules_coverage)
            .context("Failed to serialize modules coverage")?;
        self.set_output_text("modules-coverage", &modules)?;

        self.set_output_text("violations", &evaluator.violations.join("\n"))
    }
}

fn bool_output(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// `::error::` workflow commands, one per message
pub fn error_annotations(messages: &[String]) -> Vec<String> {
    messages
        .iter()
        .map(|message| format!("::error::{}", message))
        .collect()
}

/// Whether any level listed in `fail_on` was not reached
pub fn should_fail(reached: &ReachedThresholds, fail_on: &[ThresholdLevel]) -> bool {
    reached.any_failed(fail_on)
}
