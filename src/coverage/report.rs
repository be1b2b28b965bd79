//! Coverage of one parsed input report

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

use super::Coverage;

/// Label used in comments and outputs for reports outside every configured module
pub const UNMATCHED_MODULE_LABEL: &str = "Unknown";

/// Which configured module a report belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ModuleAssignment {
    Matched(String),
    #[default]
    Unmatched,
}

impl ModuleAssignment {
    pub fn name(&self) -> Option<&str> {
        match self {
            ModuleAssignment::Matched(name) => Some(name),
            ModuleAssignment::Unmatched => None,
        }
    }

    pub fn label(&self) -> &str {
        self.name().unwrap_or(UNMATCHED_MODULE_LABEL)
    }
}

impl fmt::Display for ModuleAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ModuleAssignment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Coverage data of one JaCoCo XML file.
///
/// `changed_files_coverage` only holds the files changed in the pull request,
/// keyed by their repository path.
#[derive(Debug, Clone)]
pub struct ReportFileCoverage {
    pub path: PathBuf,
    pub name: String,
    pub module: ModuleAssignment,
    pub overall_coverage: Coverage,
    pub changed_files_coverage: IndexMap<String, Coverage>,
}

impl ReportFileCoverage {
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        overall_coverage: Coverage,
        changed_files_coverage: IndexMap<String, Coverage>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            module: ModuleAssignment::Unmatched,
            overall_coverage,
            changed_files_coverage,
        }
    }

    pub fn with_module(mut self, module: ModuleAssignment) -> Self {
        self.module = module;
        self
    }

    pub fn changed_files_count(&self) -> usize {
        self.changed_files_coverage.len()
    }
}
