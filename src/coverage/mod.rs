//! Coverage module
//!
//! Provides:
//! - Missed/covered counters and the percentage formula
//! - Per-metric coverage of a report or file
//! - JaCoCo XML parsing into report coverage

mod counter;
mod jacoco;
mod report;

pub use counter::*;
pub use jacoco::*;
pub use report::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::error;

/// JaCoCo counter kinds that can be compared against thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    #[default]
    Instruction,
    Branch,
    Line,
    Complexity,
    Method,
    Class,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Instruction,
        MetricKind::Branch,
        MetricKind::Line,
        MetricKind::Complexity,
        MetricKind::Method,
        MetricKind::Class,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Instruction => "instruction",
            MetricKind::Branch => "branch",
            MetricKind::Line => "line",
            MetricKind::Complexity => "complexity",
            MetricKind::Method => "method",
            MetricKind::Class => "class",
        }
    }

    /// Value of the `type` attribute of a JaCoCo `<counter>` element
    pub fn from_jacoco_type(value: &[u8]) -> Option<Self> {
        match value {
            b"INSTRUCTION" => Some(MetricKind::Instruction),
            b"BRANCH" => Some(MetricKind::Branch),
            b"LINE" => Some(MetricKind::Line),
            b"COMPLEXITY" => Some(MetricKind::Complexity),
            b"METHOD" => Some(MetricKind::Method),
            b"CLASS" => Some(MetricKind::Class),
            _ => None,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "instruction" => Ok(MetricKind::Instruction),
            "branch" => Ok(MetricKind::Branch),
            "line" => Ok(MetricKind::Line),
            "complexity" => Ok(MetricKind::Complexity),
            "method" => Ok(MetricKind::Method),
            "class" => Ok(MetricKind::Class),
            _ => anyhow::bail!(
                "Unknown metric: {}. Supported: instruction, branch, line, complexity, method, class",
                s
            ),
        }
    }
}

/// The six JaCoCo counters of a report, package or source file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub instruction: Counter,
    pub branch: Counter,
    pub line: Counter,
    pub complexity: Counter,
    pub method: Counter,
    pub class: Counter,
}

impl Coverage {
    pub fn counter(&self, kind: MetricKind) -> &Counter {
        match kind {
            MetricKind::Instruction => &self.instruction,
            MetricKind::Branch => &self.branch,
            MetricKind::Line => &self.line,
            MetricKind::Complexity => &self.complexity,
            MetricKind::Method => &self.method,
            MetricKind::Class => &self.class,
        }
    }

    pub fn counter_mut(&mut self, kind: MetricKind) -> &mut Counter {
        match kind {
            MetricKind::Instruction => &mut self.instruction,
            MetricKind::Branch => &mut self.branch,
            MetricKind::Line => &mut self.line,
            MetricKind::Complexity => &mut self.complexity,
            MetricKind::Method => &mut self.method,
            MetricKind::Class => &mut self.class,
        }
    }

    /// Coverage percentage for a metric given by name.
    /// An unknown name is logged and reads as `0.0`.
    pub fn coverage_by_metric(&self, metric: &str) -> f64 {
        match metric.parse::<MetricKind>() {
            Ok(kind) => self.counter(kind).coverage(),
            Err(_) => {
                error!("Unknown metric type: {}", metric);
                Counter::default().coverage()
            }
        }
    }

    /// `(missed, covered)` for a metric given by name.
    /// An unknown name is logged and reads as `(0, 0)`.
    pub fn values_by_metric(&self, metric: &str) -> (u64, u64) {
        match metric.parse::<MetricKind>() {
            Ok(kind) => {
                let counter = self.counter(kind);
                (counter.missed, counter.covered)
            }
            Err(_) => {
                error!("Unknown metric type: {}", metric);
                (0, 0)
            }
        }
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Instruction: {}, Branch: {}, Line: {}, Complexity: {}, Method: {}, Class: {}",
            self.instruction, self.branch, self.line, self.complexity, self.method, self.class
        )
    }
}
