//! Discovery of JaCoCo XML reports from glob patterns

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

pub struct ReportScanner {
    root_dir: PathBuf,
    paths: Vec<String>,
    exclude_paths: Vec<String>,
}

impl ReportScanner {
    /// Patterns are resolved against `root_dir` unless they are absolute
    pub fn new(root_dir: impl Into<PathBuf>, paths: &[String], exclude_paths: &[String]) -> Self {
        Self {
            root_dir: root_dir.into(),
            paths: paths.to_vec(),
            exclude_paths: exclude_paths.to_vec(),
        }
    }

    /// Sorted, de-duplicated paths of the matching `.xml` files
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        let mut reports = BTreeSet::new();

        for pattern in &self.paths {
            for path in self.expand(pattern)? {
                if path.is_file() && has_xml_extension(&path) {
                    debug!("Found report {}", path.display());
                    reports.insert(path);
                }
            }
        }

        let excludes = self
            .exclude_paths
            .iter()
            .map(|pattern| self.exclude_pattern(pattern))
            .collect::<Result<Vec<_>>>()?;
        reports.retain(|path| {
            let excluded = excludes
                .iter()
                .find(|pattern| pattern.matches_path_with(path, MATCH_OPTIONS));
            if let Some(pattern) = excluded {
                debug!("Excluded report {} by {}", path.display(), pattern);
            }
            excluded.is_none()
        });

        Ok(reports.into_iter().collect())
    }

    fn absolute_pattern(&self, pattern: &str) -> String {
        let pattern = recursive_files(pattern);
        if Path::new(&pattern).is_absolute() {
            pattern
        } else {
            let root = Pattern::escape(&self.root_dir.to_string_lossy());
            Path::new(&root).join(pattern).to_string_lossy().to_string()
        }
    }

    fn expand(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let paths = glob::glob_with(&self.absolute_pattern(pattern), MATCH_OPTIONS)
            .with_context(|| format!("Invalid glob pattern: {}", pattern))?;

        Ok(paths.filter_map(|p| p.ok()).collect())
    }

    fn exclude_pattern(&self, pattern: &str) -> Result<Pattern> {
        Pattern::new(&self.absolute_pattern(pattern))
            .with_context(|| format!("Invalid exclude pattern: {}", pattern))
    }
}

/// A trailing `**` only yields directories in glob; extend it to the files below
fn recursive_files(pattern: &str) -> String {
    if pattern == "**" || pattern.ends_with("/**") {
        format!("{}/*", pattern)
    } else {
        pattern.to_string()
    }
}

fn has_xml_extension(path: &Path) -> bool {
    path.extension().map(|ext| ext == "xml").unwrap_or(false)
}
