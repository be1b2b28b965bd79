//! JaCoCo XML report parser

use anyhow::{Context, Result};
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::Path;
use tracing::{debug, error, warn};

use super::{Counter, Coverage, MetricKind, ModuleAssignment, ReportFileCoverage};
use crate::module::{detect_module, Module};

/// Parses JaCoCo reports, keeping per-file coverage only for changed files
pub struct JacocoParser<'a> {
    changed_files: &'a [String],
    modules: &'a IndexMap<String, Module>,
}

impl<'a> JacocoParser<'a> {
    pub fn new(changed_files: &'a [String], modules: &'a IndexMap<String, Module>) -> Self {
        Self {
            changed_files,
            modules,
        }
    }

    /// Parse a JaCoCo XML file
    pub fn parse(&self, path: &Path) -> Result<ReportFileCoverage> {
        debug!("Parsing JaCoCo report {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read JaCoCo report {}", path.display()))?;
        self.parse_str(&content, path)
    }

    /// Parse JaCoCo XML content; `path` is used for the module and as fallback name
    pub fn parse_str(&self, content: &str, path: &Path) -> Result<ReportFileCoverage> {
        let module = if self.modules.is_empty() {
            ModuleAssignment::Unmatched
        } else {
            detect_module(path, self.modules)
        };

        let mut reader = Reader::from_str(content);
        reader.trim_text(true);

        let mut report_name: Option<String> = None;
        let mut overall = Coverage::default();
        let mut changed_files: IndexMap<String, Coverage> = IndexMap::new();

        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut package = String::new();
        let mut source_file: Option<(String, Coverage)> = None;

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    match e.name().as_ref() {
                        b"report" if stack.is_empty() => {
                            report_name = attribute(e, b"name");
                        }
                        b"package" => {
                            package = attribute(e, b"name").unwrap_or_default();
                        }
                        b"sourcefile" => {
                            let name = attribute(e, b"name").unwrap_or_default();
                            source_file = Some((name, Coverage::default()));
                        }
                        b"counter" => {
                            self.record_counter(e, &stack, &mut overall, &mut source_file, path);
                        }
                        _ => {}
                    }
                    stack.push(e.name().as_ref().to_vec());
                }
                Ok(Event::Empty(ref e)) => {
                    if e.name().as_ref() == b"counter" {
                        self.record_counter(e, &stack, &mut overall, &mut source_file, path);
                    }
                }
                Ok(Event::End(ref e)) => {
                    stack.pop();
                    match e.name().as_ref() {
                        b"sourcefile" => {
                            if let Some((name, coverage)) = source_file.take() {
                                let key = format!("{}/{}", package, name);
                                for changed in self.matching_changed_files(&key, &module) {
                                    debug!("File '{}' is in the list of changed files", changed);
                                    changed_files.insert(changed.clone(), coverage);
                                }
                            }
                        }
                        b"package" => package.clear(),
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(anyhow::anyhow!(
                        "Error parsing JaCoCo XML {} at position {}: {}",
                        path.display(),
                        reader.buffer_position(),
                        e
                    ))
                }
                _ => {}
            }
            buf.clear();
        }

        let name = report_name.unwrap_or_else(|| {
            error!("Missing name attribute in JaCoCo report {}", path.display());
            path.display().to_string()
        });

        debug!(
            "Report '{}': {} changed file(s), {}",
            name,
            changed_files.len(),
            overall
        );

        Ok(ReportFileCoverage::new(path, name, overall, changed_files).with_module(module))
    }

    /// Route a `<counter>` to the report totals or the current source file
    fn record_counter(
        &self,
        e: &BytesStart,
        stack: &[Vec<u8>],
        overall: &mut Coverage,
        source_file: &mut Option<(String, Coverage)>,
        path: &Path,
    ) {
        let target = match stack.last().map(|parent| parent.as_slice()) {
            Some(b"report") if stack.len() == 1 => overall,
            Some(b"sourcefile") => match source_file.as_mut() {
                Some((_, coverage)) => coverage,
                None => return,
            },
            _ => return,
        };

        if let Some((kind, counter)) = read_counter(e, path) {
            *target.counter_mut(kind) = counter;
        }
    }

    /// Changed files whose path is `key` or ends with `/key`
    fn matching_changed_files(&self, key: &str, module: &ModuleAssignment) -> Vec<&'a String> {
        let suffix = format!("/{}", key);
        let matches: Vec<&'a String> = self
            .changed_files
            .iter()
            .filter(|changed| changed.as_str() == key || changed.ends_with(&suffix))
            .collect();

        if matches.len() < 2 {
            return matches;
        }

        let Some(module) = module.name().and_then(|name| self.modules.get(name)) else {
            return matches;
        };

        let in_module: Vec<&'a String> = matches
            .iter()
            .copied()
            .filter(|changed| module.contains(changed))
            .collect();

        if in_module.is_empty() {
            matches
        } else {
            in_module
        }
    }
}

fn attribute(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

fn read_counter(e: &BytesStart, path: &Path) -> Option<(MetricKind, Counter)> {
    let mut kind = None;
    let mut counter = Counter::default();

    for attr in e.attributes().filter_map(|a| a.ok()) {
        match attr.key.as_ref() {
            b"type" => kind = MetricKind::from_jacoco_type(&attr.value),
            b"missed" => counter.missed = parse_count(&attr.value, "missed", path),
            b"covered" => counter.covered = parse_count(&attr.value, "covered", path),
            _ => {}
        }
    }

    kind.map(|kind| (kind, counter))
}

fn parse_count(value: &[u8], field: &str, path: &Path) -> u64 {
    let value = String::from_utf8_lossy(value);
    value.trim().parse::<u64>().unwrap_or_else(|_| {
        warn!(
            "Invalid {} value '{}' in JaCoCo report {}, zero will be used",
            field,
            value,
            path.display()
        );
        0
    })
}
