use anyhow::{Context, Result};
use clap::Args;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::coverage::MetricKind;
use crate::evaluator::ThresholdLevel;
use crate::module::{Module, ThresholdOverrides, Thresholds};

pub const CONFIG_FILE: &str = "jacoco-report.toml";
pub const DEFAULT_TITLE: &str = "JaCoCo Coverage Report";
pub const DEFAULT_GLOBAL_THRESHOLDS: &str = "0.0*0.0*0.0";
pub const DEFAULT_PASS_SYMBOL: &str = "✅";
pub const DEFAULT_FAIL_SYMBOL: &str = "❌";

/// How much detail the pull request comment carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentLevel {
    Minimal,
    #[default]
    Full,
}

impl fmt::Display for CommentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentLevel::Minimal => f.write_str("minimal"),
            CommentLevel::Full => f.write_str("full"),
        }
    }
}

impl FromStr for CommentLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "minimal" => Ok(CommentLevel::Minimal),
            "full" => Ok(CommentLevel::Full),
            _ => anyhow::bail!("'comment-level' must be one of: minimal, full (got '{}')", s),
        }
    }
}

/// Action inputs as received from the command line or `INPUT_*` variables.
///
/// Every value is kept raw here; [`Inputs::resolve`] parses and validates them.
#[derive(Debug, Clone, Default, Args)]
pub struct InputArgs {
    /// GitHub token used to read the pull request and post the comment
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Report globs, one per line
    #[arg(long, env = "INPUT_PATHS")]
    pub paths: Option<String>,

    /// Globs of reports to ignore, one per line
    #[arg(long, env = "INPUT_EXCLUDE_PATHS")]
    pub exclude_paths: Option<String>,

    /// Globs of baseline reports to compare against, one per line
    #[arg(long, env = "INPUT_BASELINE_PATHS")]
    pub baseline_paths: Option<String>,

    /// Thresholds as `overall*changed_files_average*per_changed_file`
    #[arg(long, env = "INPUT_GLOBAL_THRESHOLDS")]
    pub global_thresholds: Option<String>,

    /// Comment title, also used to find a previous comment
    #[arg(long, env = "INPUT_TITLE")]
    pub title: Option<String>,

    #[arg(long, env = "INPUT_PR_NUMBER")]
    pub pr_number: Option<String>,

    /// instruction, branch, line, complexity, method or class
    #[arg(long, env = "INPUT_METRIC")]
    pub metric: Option<String>,

    /// minimal or full
    #[arg(long, env = "INPUT_COMMENT_LEVEL")]
    pub comment_level: Option<String>,

    /// `name:path` entries separated by commas or new lines
    #[arg(long, env = "INPUT_MODULES")]
    pub modules: Option<String>,

    /// `name:overall*changed_files_average*per_changed_file` entries
    #[arg(long, env = "INPUT_MODULES_THRESHOLDS")]
    pub modules_thresholds: Option<String>,

    #[arg(long, env = "INPUT_SKIP_UNCHANGED")]
    pub skip_unchanged: Option<String>,

    #[arg(long, env = "INPUT_UPDATE_COMMENT")]
    pub update_comment: Option<String>,

    #[arg(long, env = "INPUT_PASS_SYMBOL")]
    pub pass_symbol: Option<String>,

    #[arg(long, env = "INPUT_FAIL_SYMBOL")]
    pub fail_symbol: Option<String>,

    /// true, false, or a list of overall, changed-files-average, per-changed-file
    #[arg(long, env = "INPUT_FAIL_ON_THRESHOLD")]
    pub fail_on_threshold: Option<String>,

    #[arg(long, env = "INPUT_DEBUG")]
    pub debug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModuleConfig {
    pub path: String,
    #[serde(default)]
    pub overall: Option<f64>,
    #[serde(default)]
    pub changed_files_average: Option<f64>,
    #[serde(default)]
    pub per_changed_file: Option<f64>,
}

impl ModuleConfig {
    fn overrides(&self) -> ThresholdOverrides {
        ThresholdOverrides {
            overall: self.overall,
            changed_files_average: self.changed_files_average,
            per_changed_file: self.per_changed_file,
        }
    }
}

/// `fail-on-threshold` in the TOML file: a boolean or a list of levels
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FailOnConfig {
    All(bool),
    Levels(Vec<ThresholdLevel>),
}

/// Optional `jacoco-report.toml` configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileConfig {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(default)]
    pub baseline_paths: Vec<String>,
    #[serde(default)]
    pub thresholds: Option<ThresholdOverrides>,
    #[serde(default)]
    pub metric: Option<MetricKind>,
    #[serde(default)]
    pub comment_level: Option<CommentLevel>,
    #[serde(default)]
    pub skip_unchanged: Option<bool>,
    #[serde(default)]
    pub update_comment: Option<bool>,
    #[serde(default)]
    pub pass_symbol: Option<String>,
    #[serde(default)]
    pub fail_symbol: Option<String>,
    #[serde(default)]
    pub fail_on_threshold: Option<FailOnConfig>,
    #[serde(default)]
    pub debug: Option<bool>,
    #[serde(default)]
    pub modules: IndexMap<String, ModuleConfig>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load the given file, or `jacoco-report.toml` when it exists
    pub fn discover(explicit: Option<&Path>) -> Result<Option<Self>> {
        match explicit {
            Some(path) => Self::load(path).map(Some),
            None => {
                let default = Path::new(CONFIG_FILE);
                if default.is_file() {
                    info!("Using configuration from {}", CONFIG_FILE);
                    Self::load(default).map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }
}

/// Validated inputs of one run
#[derive(Debug, Clone)]
pub struct Inputs {
    pub token: Option<String>,
    pub paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub baseline_paths: Vec<String>,
    pub global_thresholds: Thresholds,
    pub title: String,
    pub pr_number: Option<u64>,
    pub metric: MetricKind,
    pub comment_level: CommentLevel,
    pub modules: IndexMap<String, Module>,
    pub skip_unchanged: bool,
    pub update_comment: bool,
    pub pass_symbol: String,
    pub fail_symbol: String,
    pub fail_on_threshold: Vec<ThresholdLevel>,
    pub debug: bool,
}

impl Inputs {
    /// Merge command line/environment values over the file configuration and
    /// validate the result. All problems are reported together.
    pub fn resolve(args: &InputArgs, file: Option<FileConfig>) -> Result<Self> {
        let file = file.unwrap_or_default();
        let mut errors: Vec<String> = Vec::new();

        let paths = match non_empty(&args.paths) {
            Some(raw) => parse_paths(raw),
            None => file.paths.clone(),
        };
        if paths.is_empty() {
            errors.push("'paths' must be a non-empty list of strings.".to_string());
        }

        let exclude_paths = non_empty(&args.exclude_paths)
            .map(parse_paths)
            .unwrap_or_else(|| file.exclude_paths.clone());
        let baseline_paths = non_empty(&args.baseline_paths)
            .map(parse_paths)
            .unwrap_or_else(|| file.baseline_paths.clone());

        let global_thresholds = match non_empty(&args.global_thresholds) {
            Some(raw) => collect(&mut errors, parse_global_thresholds(raw)),
            None => match &file.thresholds {
                Some(overrides) => {
                    let thresholds = overrides.resolve(&Thresholds::default());
                    collect(&mut errors, validate_thresholds("global-thresholds", &thresholds))
                        .map(|_| thresholds)
                }
                None => Some(Thresholds::default()),
            },
        }
        .unwrap_or_default();

        let title = non_empty(&args.title)
            .map(str::to_string)
            .or_else(|| file.title.clone().filter(|t| !t.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let pr_number = non_empty(&args.pr_number).and_then(|raw| {
            collect(
                &mut errors,
                raw.parse::<u64>()
                    .map_err(|_| anyhow::anyhow!("'pr-number' must be a positive integer.")),
            )
        });

        let metric = match non_empty(&args.metric) {
            Some(raw) => collect(&mut errors, raw.parse::<MetricKind>()),
            None => Some(file.metric.unwrap_or_default()),
        }
        .unwrap_or_default();

        let comment_level = match non_empty(&args.comment_level) {
            Some(raw) => collect(&mut errors, raw.parse::<CommentLevel>()),
            None => Some(file.comment_level.unwrap_or_default()),
        }
        .unwrap_or_default();

        let skip_unchanged = resolve_bool(
            &mut errors,
            "skip-unchanged",
            &args.skip_unchanged,
            file.skip_unchanged,
            false,
        );
        let update_comment = resolve_bool(
            &mut errors,
            "update-comment",
            &args.update_comment,
            file.update_comment,
            true,
        );
        let debug = resolve_bool(&mut errors, "debug", &args.debug, file.debug, false);

        let pass_symbol = resolve_symbol(
            &mut errors,
            "pass-symbol",
            &args.pass_symbol,
            &file.pass_symbol,
            DEFAULT_PASS_SYMBOL,
        );
        let fail_symbol = resolve_symbol(
            &mut errors,
            "fail-symbol",
            &args.fail_symbol,
            &file.fail_symbol,
            DEFAULT_FAIL_SYMBOL,
        );

        let fail_on_threshold = match non_empty(&args.fail_on_threshold) {
            Some(raw) => collect(&mut errors, parse_fail_on_threshold(raw)).unwrap_or_default(),
            None => match &file.fail_on_threshold {
                Some(FailOnConfig::All(true)) | None => ThresholdLevel::ALL.to_vec(),
                Some(FailOnConfig::All(false)) => Vec::new(),
                Some(FailOnConfig::Levels(levels)) => levels.clone(),
            },
        };

        // Module roots from the arguments replace the file's modules as a whole.
        let (roots, mut overrides) = match non_empty(&args.modules) {
            Some(raw) => (
                collect(&mut errors, parse_modules(raw)).unwrap_or_default(),
                IndexMap::new(),
            ),
            None => {
                let mut roots = IndexMap::new();
                let mut overrides = IndexMap::new();
                for (name, module) in &file.modules {
                    if let Err(e) = validate_module_entry(name, &module.path) {
                        errors.push(e.to_string());
                    }
                    roots.insert(name.clone(), module.path.clone());
                    overrides.insert(name.clone(), module.overrides());
                }
                (roots, overrides)
            }
        };

        if let Some(raw) = non_empty(&args.modules_thresholds) {
            if let Some(parsed) = collect(&mut errors, parse_modules_thresholds(raw)) {
                overrides.extend(parsed);
            }
        }

        for (name, module_overrides) in &overrides {
            if !roots.contains_key(name) {
                errors.push(format!(
                    "Thresholds are defined for module '{}' which is not in 'modules'.",
                    name
                ));
                continue;
            }
            let resolved = module_overrides.resolve(&global_thresholds);
            let label = format!("module '{}' thresholds", name);
            if let Err(e) = validate_thresholds(&label, &resolved) {
                errors.push(e.to_string());
            }
        }

        if !errors.is_empty() {
            anyhow::bail!("Invalid inputs:\n  - {}", errors.join("\n  - "));
        }

        let modules = build_modules(&roots, &overrides, &global_thresholds);

        Ok(Self {
            token: non_empty(&args.token).map(str::to_string),
            paths,
            exclude_paths,
            baseline_paths,
            global_thresholds,
            title,
            pr_number,
            metric,
            comment_level,
            modules,
            skip_unchanged,
            update_comment,
            pass_symbol,
            fail_symbol,
            fail_on_threshold,
            debug,
        })
    }

    /// Log the effective inputs of the run
    pub fn log(&self) {
        info!("Paths: {:?}", self.paths);
        info!("Exclude paths: {:?}", self.exclude_paths);
        info!("Baseline paths: {:?}", self.baseline_paths);
        info!(
            "Global thresholds: overall={}, changed_files_average={}, per_changed_file={}",
            self.global_thresholds.overall,
            self.global_thresholds.changed_files_average,
            self.global_thresholds.per_changed_file
        );
        for module in self.modules.values() {
            info!(
                "Module '{}' at '{}': overall={}, changed_files_average={}, per_changed_file={}",
                module.name,
                module.root_path,
                module.min_coverage_overall(),
                module.min_coverage_changed_files(),
                module.min_coverage_per_changed_file()
            );
        }
        info!(
            "Metric: {}, comment level: {}, skip unchanged: {}, update comment: {}, fail on: {:?}",
            self.metric,
            self.comment_level,
            self.skip_unchanged,
            self.update_comment,
            self.fail_on_threshold
        );
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn collect<T>(errors: &mut Vec<String>, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(e.to_string());
            None
        }
    }
}

fn resolve_bool(
    errors: &mut Vec<String>,
    name: &str,
    arg: &Option<String>,
    file: Option<bool>,
    default: bool,
) -> bool {
    match non_empty(arg) {
        Some(raw) => collect(errors, parse_bool(name, raw)).unwrap_or(default),
        None => file.unwrap_or(default),
    }
}

fn resolve_symbol(
    errors: &mut Vec<String>,
    name: &str,
    arg: &Option<String>,
    file: &Option<String>,
    default: &str,
) -> String {
    let symbol = arg
        .clone()
        .or_else(|| file.clone())
        .unwrap_or_else(|| default.to_string());

    if symbol.trim().is_empty() {
        errors.push(format!("'{}' must be a non-empty string.", name));
    }
    symbol
}

pub fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => anyhow::bail!("'{}' must be a boolean (true or false), got '{}'.", name, raw),
    }
}

/// Strip a trailing `# comment` and surrounding whitespace
pub fn clean_from_comment(input: &str) -> &str {
    input.split('#').next().unwrap_or_default().trim()
}

/// One path or glob per line, comments and blank lines dropped
pub fn parse_paths(raw: &str) -> Vec<String> {
    raw.lines()
        .map(clean_from_comment)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Entries separated by commas, or by new lines when there is no comma
fn split_entries(raw: &str) -> Vec<String> {
    let raw = raw.replace(": ", ":");
    let separator = if raw.contains(',') { ',' } else { '\n' };
    raw.split(separator)
        .map(clean_from_comment)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_threshold_value(label: &str, raw: &str) -> Result<f64> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| anyhow::anyhow!("'{}' value '{}' must be a number.", label, raw.trim()))?;
    check_range(label, value)?;
    Ok(value)
}

fn check_range(label: &str, value: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        anyhow::bail!("'{}' value {} must be between 0 and 100.", label, value);
    }
    Ok(())
}

fn validate_thresholds(label: &str, thresholds: &Thresholds) -> Result<()> {
    check_range(&format!("{} overall", label), thresholds.overall)?;
    check_range(
        &format!("{} changed files average", label),
        thresholds.changed_files_average,
    )?;
    check_range(&format!("{} per changed file", label), thresholds.per_changed_file)
}

/// Parse `overall*changed_files_average*per_changed_file`.
/// A value with only two parts gets a `0.0` per-file threshold.
pub fn parse_global_thresholds(raw: &str) -> Result<Thresholds> {
    let mut cleaned = clean_from_comment(raw).to_string();

    match cleaned.matches('*').count() {
        0 => anyhow::bail!(
            "'global-thresholds' must be in the format 'overall*changed_files_average*per_changed_file'."
        ),
        1 => {
            warn!(
                "'global-thresholds' has two parts, using 0.0 for the per changed file threshold"
            );
            cleaned.push_str("*0.0");
        }
        2 => {}
        _ => anyhow::bail!("'global-thresholds' must have at most three parts."),
    }

    let parts: Vec<&str> = cleaned.split('*').collect();
    Ok(Thresholds::new(
        parse_threshold_value("global-thresholds overall", parts[0])?,
        parse_threshold_value("global-thresholds changed files average", parts[1])?,
        parse_threshold_value("global-thresholds per changed file", parts[2])?,
    ))
}

fn is_valid_module_text(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '/' | '\\' | '-'))
}

fn validate_module_entry(name: &str, path: &str) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!("Module with path '{}' must have a non-empty name.", path);
    }
    if path.is_empty() {
        anyhow::bail!("Module '{}' must have a non-empty path.", name);
    }
    if !is_valid_module_text(name) {
        anyhow::bail!("Module name '{}' must be alphanumeric with allowed (/\\-_ ).", name);
    }
    if !is_valid_module_text(path) {
        anyhow::bail!("Module path '{}' must be alphanumeric with allowed (/\\-_ ).", path);
    }
    Ok(())
}

/// Parse `name:path` entries into module roots
pub fn parse_modules(raw: &str) -> Result<IndexMap<String, String>> {
    let mut modules = IndexMap::new();
    let mut errors = Vec::new();

    for entry in split_entries(raw) {
        let parts: Vec<&str> = entry.split(':').collect();
        if parts.len() != 2 {
            errors.push(format!(
                "Module '{}' must be in the format 'module:module_path'.",
                entry
            ));
            continue;
        }

        let (name, path) = (parts[0].trim(), parts[1].trim());
        match validate_module_entry(name, path) {
            Ok(()) => {
                modules.insert(name.to_string(), path.to_string());
            }
            Err(e) => errors.push(e.to_string()),
        }
    }

    if !errors.is_empty() {
        anyhow::bail!(errors.join("\n  - "));
    }
    Ok(modules)
}

/// Parse `name:overall*changed_files_average*per_changed_file` entries; empty parts inherit
pub fn parse_modules_thresholds(raw: &str) -> Result<IndexMap<String, ThresholdOverrides>> {
    let mut result = IndexMap::new();
    let mut errors = Vec::new();

    for entry in split_entries(raw) {
        let Some((name, values)) = entry.split_once(':') else {
            errors.push(format!(
                "Module threshold '{}' must be in the format 'module:overall*changed_files_average*per_changed_file'.",
                entry
            ));
            continue;
        };
        let (name, values) = (name.trim(), values.trim());

        if name.is_empty() {
            errors.push(format!("Module threshold '{}' must have a non-empty name.", values));
            continue;
        }
        if values.matches('*').count() != 2 {
            errors.push(format!(
                "Module threshold '{}' must contain two '*' to split overall, changed files average and per changed file thresholds.",
                values
            ));
            continue;
        }

        let mut parsed = [None; 3];
        let mut valid = true;
        for (slot, part) in parsed.iter_mut().zip(values.split('*')) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match part.parse::<f64>() {
                Ok(value) => *slot = Some(value),
                Err(_) => {
                    errors.push(format!(
                        "Module threshold '{}' value '{}' must be a number or empty.",
                        name, part
                    ));
                    valid = false;
                }
            }
        }

        if valid {
            result.insert(
                name.to_string(),
                ThresholdOverrides {
                    overall: parsed[0],
                    changed_files_average: parsed[1],
                    per_changed_file: parsed[2],
                },
            );
        }
    }

    if !errors.is_empty() {
        anyhow::bail!(errors.join("\n  - "));
    }
    Ok(result)
}

/// `true` = every level, `false` = none, else a list of levels
pub fn parse_fail_on_threshold(raw: &str) -> Result<Vec<ThresholdLevel>> {
    let value = raw.trim().to_lowercase();

    match value.as_str() {
        "true" => return Ok(ThresholdLevel::ALL.to_vec()),
        "false" => return Ok(Vec::new()),
        _ => {}
    }

    let items: Vec<&str> = value
        .lines()
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect();

    let invalid: Vec<&str> = items
        .iter()
        .copied()
        .filter(|item| item.parse::<ThresholdLevel>().is_err())
        .collect();
    if !invalid.is_empty() {
        anyhow::bail!("Unsupported threshold levels: {}", invalid.join(", "));
    }

    items.iter().map(|item| item.parse()).collect()
}

/// Resolve every module's thresholds against the global ones
pub fn build_modules(
    roots: &IndexMap<String, String>,
    overrides: &IndexMap<String, ThresholdOverrides>,
    global: &Thresholds,
) -> IndexMap<String, Module> {
    roots
        .iter()
        .map(|(name, root)| {
            let module_overrides = overrides.get(name).copied().unwrap_or_default();
            (name.clone(), Module::new(name, root, &module_overrides, global))
        })
        .collect()
}
