//! Modules: named groups of reports under a root path, with their own thresholds

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::coverage::ModuleAssignment;

/// Minimum coverage percentages for the three evaluated levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub overall: f64,
    pub changed_files_average: f64,
    pub per_changed_file: f64,
}

impl Thresholds {
    pub fn new(overall: f64, changed_files_average: f64, per_changed_file: f64) -> Self {
        Self {
            overall,
            changed_files_average,
            per_changed_file,
        }
    }
}

/// Per-module threshold overrides; `None` inherits the global value
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ThresholdOverrides {
    #[serde(default)]
    pub overall: Option<f64>,
    #[serde(default)]
    pub changed_files_average: Option<f64>,
    #[serde(default)]
    pub per_changed_file: Option<f64>,
}

impl ThresholdOverrides {
    pub fn resolve(&self, global: &Thresholds) -> Thresholds {
        Thresholds {
            overall: self.overall.unwrap_or(global.overall),
            changed_files_average: self
                .changed_files_average
                .unwrap_or(global.changed_files_average),
            per_changed_file: self.per_changed_file.unwrap_or(global.per_changed_file),
        }
    }
}

/// A configured module with its thresholds already resolved
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub root_path: String,
    pub thresholds: Thresholds,
}

impl Module {
    pub fn new(
        name: impl Into<String>,
        root_path: impl Into<String>,
        overrides: &ThresholdOverrides,
        global: &Thresholds,
    ) -> Self {
        Self {
            name: name.into(),
            root_path: root_path.into(),
            thresholds: overrides.resolve(global),
        }
    }

    pub fn min_coverage_overall(&self) -> f64 {
        self.thresholds.overall
    }

    pub fn min_coverage_changed_files(&self) -> f64 {
        self.thresholds.changed_files_average
    }

    pub fn min_coverage_per_changed_file(&self) -> f64 {
        self.thresholds.per_changed_file
    }

    /// Whether a path lies under this module's root directory
    pub fn contains(&self, path: &str) -> bool {
        let root = self.root_path.trim_matches('/');
        let normalized = format!("/{}", path.replace('\\', "/").trim_start_matches('/'));
        normalized.contains(&format!("/{}/", root))
    }
}

/// Find the first configured module whose root directory appears in the report path
pub fn detect_module(report_path: &Path, modules: &IndexMap<String, Module>) -> ModuleAssignment {
    let path = report_path.to_string_lossy();

    for (name, module) in modules {
        if module.contains(&path) {
            debug!("Report {} belongs to module '{}'", path, name);
            return ModuleAssignment::Matched(name.clone());
        }
    }

    if !modules.is_empty() {
        warn!("No module detected for report {}", path);
    }
    ModuleAssignment::Unmatched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modules() -> IndexMap<String, Module> {
        let global = Thresholds::new(80.0, 70.0, 60.0);
        let mut modules = IndexMap::new();
        modules.insert(
            "core".to_string(),
            Module::new("core", "core", &ThresholdOverrides::default(), &global),
        );
        modules.insert(
            "web".to_string(),
            Module::new(
                "web",
                "apps/web",
                &ThresholdOverrides {
                    overall: Some(50.0),
                    ..Default::default()
                },
                &global,
            ),
        );
        modules
    }

    #[test]
    fn test_overrides_fall_back_to_global() {
        let modules = modules();
        assert_eq!(modules["core"].thresholds, Thresholds::new(80.0, 70.0, 60.0));

        let web = &modules["web"];
        assert_eq!(web.min_coverage_overall(), 50.0);
        assert_eq!(web.min_coverage_changed_files(), 70.0);
        assert_eq!(web.min_coverage_per_changed_file(), 60.0);
    }

    #[test]
    fn test_detect_module() {
        let modules = modules();

        assert_eq!(
            detect_module(Path::new("/repo/core/target/site/jacoco/jacoco.xml"), &modules),
            ModuleAssignment::Matched("core".to_string())
        );
        assert_eq!(
            detect_module(Path::new("/repo/apps/web/build/jacoco.xml"), &modules),
            ModuleAssignment::Matched("web".to_string())
        );
        assert_eq!(
            detect_module(Path::new("/repo/other/jacoco.xml"), &modules),
            ModuleAssignment::Unmatched
        );
    }

    #[test]
    fn test_root_must_be_a_whole_directory() {
        let modules = modules();
        assert_eq!(
            detect_module(Path::new("/repo/core-utils/jacoco.xml"), &modules),
            ModuleAssignment::Unmatched
        );
    }

    #[test]
    fn test_relative_paths_match() {
        let modules = modules();
        assert!(modules["core"].contains("core/src/main/java/Foo.java"));
        assert!(!modules["core"].contains("web/src/main/java/Foo.java"));
    }

    #[test]
    fn test_no_modules_is_unmatched() {
        assert_eq!(
            detect_module(Path::new("/repo/core/jacoco.xml"), &IndexMap::new()),
            ModuleAssignment::Unmatched
        );
    }
}
