//! The report data model handed to renderers.
//!
//! Every field is always populated. Unset values use `"N/A"`, zero or
//! `false` so renderers never need to handle a missing key.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::format::{format_bytes, format_duration};
use super::metrics::SummaryMetrics;
use crate::config::Technique;
use crate::tuning::AutoTuneSession;

/// Placeholder for values that are not available.
pub const NOT_AVAILABLE: &str = "N/A";

/// The options a run was started with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub mode: String,
    pub platform: String,
    pub auto_tune: bool,
    /// Search iterations per file, `"N/A"` without auto-tuning.
    pub iterations: String,
    /// Preset document the run started from.
    pub base_config: String,
    /// Techniques enabled by the base configuration.
    pub techniques: Vec<Technique>,
}

/// An input source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub path: String,
    pub size: u64,
    pub size_formatted: String,
    /// Upper-case extension without the dot, e.g. `CPP`.
    pub file_type: String,
}

impl InputFile {
    pub fn new(path: &Path, size: u64) -> Self {
        let file_type = path
            .extension()
            .map(|e| e.to_string_lossy().to_uppercase())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        Self {
            path: path.display().to_string(),
            size,
            size_formatted: format_bytes(size),
            file_type,
        }
    }
}

/// A produced output binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub path: String,
    /// Size in bytes, 0 if the file does not exist.
    pub size: u64,
    pub size_formatted: String,
    pub exists: bool,
}

impl OutputFile {
    /// `size` is `None` when the file was not produced.
    pub fn new(path: &Path, size: Option<u64>) -> Self {
        Self {
            path: path.display().to_string(),
            size: size.unwrap_or(0),
            size_formatted: size.map_or_else(|| NOT_AVAILABLE.to_string(), format_bytes),
            exists: size.is_some(),
        }
    }
}

/// Search outcome for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTuneSummary {
    pub input: String,
    pub trials: usize,
    pub best_iteration: u32,
    /// Two decimals.
    pub best_score: String,
}

/// Auto-tune section of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoTuneSummary {
    pub iterations_per_file: u32,
    /// Search trials run across all files, confirmation runs excluded.
    pub trials_run: usize,
    /// Highest best score across files, two decimals.
    pub best_score: String,
    pub files: Vec<FileTuneSummary>,
}

impl AutoTuneSummary {
    /// Summarises completed per-file searches.
    pub fn from_sessions<'a>(
        iterations_per_file: u32,
        sessions: impl IntoIterator<Item = &'a AutoTuneSession>,
    ) -> Self {
        let mut files = Vec::new();
        let mut trials_run = 0;
        let mut best: Option<f64> = None;

        for session in sessions {
            trials_run += session.trials().len();
            let (best_iteration, best_score) = match session.best() {
                Some(b) => (b.iteration, Some(b.score)),
                None => (0, None),
            };
            if let Some(score) = best_score {
                best = Some(best.map_or(score, |current| current.max(score)));
            }
            files.push(FileTuneSummary {
                input: session.input().display().to_string(),
                trials: session.trials().len(),
                best_iteration,
                best_score: best_score.map_or_else(|| NOT_AVAILABLE.to_string(), |s| format!("{:.2}", s)),
            });
        }

        Self {
            iterations_per_file,
            trials_run,
            best_score: best.map_or_else(|| NOT_AVAILABLE.to_string(), |s| format!("{:.2}", s)),
            files,
        }
    }
}

/// Identity and timing of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Everything a renderer needs to describe one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportModel {
    pub session_id: String,
    /// RFC 3339 start time.
    pub timestamp: String,
    pub version: String,
    pub configuration: ConfigSummary,
    pub inputs: Vec<InputFile>,
    pub outputs: Vec<OutputFile>,
    pub total_input_size: u64,
    pub total_input_formatted: String,
    pub total_output_size: u64,
    pub total_output_formatted: String,
    /// Aggregate size increase in percent, two decimals.
    pub size_increase: String,
    pub metrics: SummaryMetrics,
    pub duration: String,
    pub duration_ms: u64,
    pub files_processed: usize,
    pub warnings: u32,
    pub status: String,
    pub auto_tune: Option<AutoTuneSummary>,
}

/// Builds the report model. Performs no I/O.
pub fn assemble(
    session: SessionInfo,
    configuration: ConfigSummary,
    inputs: Vec<InputFile>,
    outputs: Vec<OutputFile>,
    metrics: SummaryMetrics,
    auto_tune: Option<AutoTuneSummary>,
) -> ReportModel {
    let total_input_size: u64 = inputs.iter().map(|f| f.size).sum();
    let total_output_size: u64 = outputs.iter().map(|f| f.size).sum();

    ReportModel {
        session_id: session.session_id,
        timestamp: session.started_at.to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        configuration,
        files_processed: inputs.len(),
        inputs,
        outputs,
        total_input_size,
        total_input_formatted: format_bytes(total_input_size),
        total_output_size,
        total_output_formatted: format_bytes(total_output_size),
        size_increase: aggregate_size_increase(total_input_size, total_output_size),
        metrics,
        duration: format_duration(session.duration),
        duration_ms: u64::try_from(session.duration.as_millis()).unwrap_or(u64::MAX),
        warnings: 0,
        status: "Success".to_string(),
        auto_tune,
    }
}

/// `(output - input) / input * 100` with two decimals; `"0"` for empty input.
fn aggregate_size_increase(total_input: u64, total_output: u64) -> String {
    if total_input == 0 {
        return "0".to_string();
    }
    let increase = (total_output as f64 - total_input as f64) / total_input as f64 * 100.0;
    format!("{:.2}", increase)
}
