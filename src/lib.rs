//! JaCoCo Report - coverage gate for pull requests
//!
//! A library for evaluating JaCoCo XML coverage reports with:
//! - Report discovery from glob patterns
//! - Overall and changed files coverage per report, module and in total
//! - Global, per-module and per-file thresholds with violation messages
//! - Markdown pull request comment with optional baseline deltas
//! - GitHub Actions outputs and pull request comment publishing

pub mod action;
pub mod comment;
pub mod config;
pub mod coverage;
pub mod evaluator;
pub mod git;
pub mod github;
pub mod module;
pub mod scanner;

pub use comment::{CommentOptions, CommentRenderer};
pub use config::{FileConfig, InputArgs, Inputs};
pub use coverage::{
    Counter, Coverage, JacocoParser, MetricKind, ModuleAssignment, ReportFileCoverage,
};
pub use evaluator::{CoverageEvaluator, EvaluatedReportCoverage, ReachedThresholds, ThresholdLevel};
pub use module::{Module, Thresholds};
pub use scanner::ReportScanner;
