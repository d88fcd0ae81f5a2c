//! Statistics produced by one obfuscation trial.

use serde::{Deserialize, Serialize};

/// Baseline security score when the engine reports none.
pub const DEFAULT_SECURITY_SCORE: u8 = 70;
/// Baseline reverse-engineering difficulty score when the engine reports none.
pub const DEFAULT_RE_DIFFICULTY_SCORE: u8 = 75;
/// Baseline resilience score when the engine reports none.
pub const DEFAULT_RESILIENCE_SCORE: u8 = 68;

/// Result of one (input file, configuration) trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialStatistics {
    /// Size of the input source file in bytes.
    pub input_size: u64,
    /// Size of the produced artifact in bytes (0 if it was not produced).
    pub output_size: u64,
    /// `(output - input) / input * 100`, rounded to two decimals.
    /// `None` when the input is empty.
    pub size_increase: Option<f64>,
    /// Transformation counts.
    pub transformations: TransformationCounts,
    /// Security metrics.
    pub metrics: SecurityMetrics,
    /// Whether a structured sidecar report contributed to these numbers.
    pub sidecar_applied: bool,
}

impl Default for TrialStatistics {
    fn default() -> Self {
        Self {
            input_size: 0,
            output_size: 0,
            size_increase: None,
            transformations: TransformationCounts::default(),
            metrics: SecurityMetrics::default(),
            sidecar_applied: false,
        }
    }
}

impl TrialStatistics {
    /// Records input and output sizes and derives the size increase.
    pub fn with_sizes(mut self, input_size: u64, output_size: u64) -> Self {
        self.input_size = input_size;
        self.output_size = output_size;
        self.size_increase = size_increase_percent(input_size, output_size);
        self
    }

    /// Applies a structured sidecar report on top of these statistics.
    ///
    /// Shallow merge: every field present in the sidecar replaces the current
    /// value; absent fields keep it. `sidecar_applied` is only set when the
    /// report carried a `metrics` or `transformations` section.
    pub fn merge_sidecar(&mut self, report: &SidecarReport) {
        if let Some(metrics) = &report.metrics {
            if let Some(v) = metrics.security_score {
                self.metrics.security_score = clamp_score(v);
            }
            if let Some(v) = metrics.re_difficulty_score {
                self.metrics.re_difficulty_score = clamp_score(v);
            }
            if let Some(v) = metrics.resilience_score {
                self.metrics.resilience_score = clamp_score(v);
            }
        }
        if let Some(counts) = &report.transformations {
            if let Some(v) = counts.string_obfuscations {
                self.transformations.string_obfuscations = to_count(v);
            }
            if let Some(v) = counts.fake_functions {
                self.transformations.fake_functions = to_count(v);
            }
            if let Some(v) = counts.bogus_code_lines {
                self.transformations.bogus_code_lines = to_count(v);
            }
            if let Some(v) = counts.cycles {
                self.transformations.cycles = to_count(v);
            }
        }
        if report.metrics.is_some() || report.transformations.is_some() {
            self.sidecar_applied = true;
        }
    }
}

/// Counts of transformations applied by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationCounts {
    pub string_obfuscations: u64,
    pub fake_functions: u64,
    pub bogus_code_lines: u64,
    /// Cycles actually applied.
    pub cycles: u64,
}

impl Default for TransformationCounts {
    fn default() -> Self {
        Self {
            string_obfuscations: 0,
            fake_functions: 0,
            bogus_code_lines: 0,
            cycles: 1,
        }
    }
}

/// Security scores, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityMetrics {
    pub security_score: u8,
    pub re_difficulty_score: u8,
    pub resilience_score: u8,
}

impl Default for SecurityMetrics {
    fn default() -> Self {
        Self {
            security_score: DEFAULT_SECURITY_SCORE,
            re_difficulty_score: DEFAULT_RE_DIFFICULTY_SCORE,
            resilience_score: DEFAULT_RESILIENCE_SCORE,
        }
    }
}

/// Machine-readable report written by the engine next to its output.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SidecarReport {
    #[serde(default)]
    pub metrics: Option<SidecarMetrics>,
    #[serde(default)]
    pub transformations: Option<SidecarTransformations>,
}

/// `metrics` record of a sidecar report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarMetrics {
    #[serde(default, alias = "security_score")]
    pub security_score: Option<f64>,
    #[serde(default, alias = "re_difficulty_score")]
    pub re_difficulty_score: Option<f64>,
    #[serde(default, alias = "resilience_score")]
    pub resilience_score: Option<f64>,
}

/// `transformations` record of a sidecar report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarTransformations {
    #[serde(default, alias = "string_obfuscations")]
    pub string_obfuscations: Option<f64>,
    #[serde(default, alias = "fake_functions")]
    pub fake_functions: Option<f64>,
    #[serde(default, alias = "bogus_code_lines")]
    pub bogus_code_lines: Option<f64>,
    #[serde(default)]
    pub cycles: Option<f64>,
}

/// Percentage growth from `input_size` to `output_size`, two decimals.
pub fn size_increase_percent(input_size: u64, output_size: u64) -> Option<f64> {
    if input_size == 0 {
        return None;
    }
    let raw = (output_size as f64 - input_size as f64) / input_size as f64 * 100.0;
    Some((raw * 100.0).round() / 100.0)
}

pub(crate) fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).floor() as u8
}

fn to_count(value: f64) -> u64 {
    if value.is_nan() {
        return 0;
    }
    value.max(0.0).floor() as u64
}
