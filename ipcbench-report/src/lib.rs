#![warn(missing_docs)]
//! ipcbench report - result records and output rendering
//!
//! Two output forms:
//! - human: one line per probe, latency scaled to nanoseconds and bandwidth
//!   to GiByte/sec
//! - json: a mapping keyed by probe name with unscaled `average`, `stddev`
//!   and `unit` fields (`"sec"` or `"Byte/sec"`)

mod render;

pub use render::{render_human, render_json};

use ipcbench_core::BenchmarkResult;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable terminal output.
    Human,
    /// Machine-readable JSON.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// Natural unit of a probe's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Seconds per single operation (latency probes).
    Seconds,
    /// Bytes per second (bandwidth probes).
    BytesPerSec,
}

impl Unit {
    /// The unscaled unit name used in structured output.
    pub fn name(self) -> &'static str {
        match self {
            Unit::Seconds => "sec",
            Unit::BytesPerSec => "Byte/sec",
        }
    }
}

/// One probe's reported outcome, keyed by its canonical name.
#[derive(Debug, Clone)]
pub struct ProbeRecord {
    /// Canonical probe name (e.g. `latency_getpid`).
    pub name: String,
    /// Natural unit of the result.
    pub unit: Unit,
    /// The result, or the failure message for probes that failed inside an
    /// aggregate run.
    pub outcome: Result<BenchmarkResult, String>,
}

impl ProbeRecord {
    /// Record a successful probe.
    pub fn ok(name: impl Into<String>, unit: Unit, result: BenchmarkResult) -> Self {
        Self {
            name: name.into(),
            unit,
            outcome: Ok(result),
        }
    }

    /// Record a failed probe.
    pub fn failed(name: impl Into<String>, unit: Unit, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit,
            outcome: Err(message.into()),
        }
    }
}
