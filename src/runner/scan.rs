//! Best-effort extraction of statistics from the engine's free-text output.
//!
//! This is a fallback only. The phrases matched here are whatever the engine
//! happens to print in verbose mode, so counts may be missed or misattributed.
//! A structured sidecar report, when present, overrides these values.

use std::sync::OnceLock;

use regex::Regex;

use super::result::{clamp_score, SecurityMetrics, TransformationCounts};

/// Which statistic a scan rule feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    StringObfuscations,
    FakeFunctions,
    BogusCodeLines,
    Cycles,
    SecurityScore,
    ReDifficultyScore,
}

/// How a line's phrases must appear.
#[derive(Debug, Clone, Copy)]
enum Match {
    All(&'static [&'static str]),
    Any(&'static [&'static str]),
}

impl Match {
    fn matches(&self, line: &str) -> bool {
        match self {
            Match::All(needles) => needles.iter().all(|n| line.contains(n)),
            Match::Any(needles) => needles.iter().any(|n| line.contains(n)),
        }
    }
}

/// Phrase rules, applied to each lowercased line in order. One line may feed
/// several targets.
const RULES: &[(Match, Target)] = &[
    (Match::All(&["string", "obfuscated"]), Target::StringObfuscations),
    (Match::Any(&["fake function", "dummy function"]), Target::FakeFunctions),
    (Match::Any(&["bogus", "opaque"]), Target::BogusCodeLines),
    (Match::Any(&["cycle", "iteration"]), Target::Cycles),
    (Match::Any(&["security score", "security:"]), Target::SecurityScore),
    (Match::Any(&["re difficulty", "difficulty:"]), Target::ReDifficultyScore),
];

/// First run of digits in `line`, saturating at `u64::MAX`.
fn first_integer(line: &str) -> Option<u64> {
    static INTEGER: OnceLock<Regex> = OnceLock::new();
    let re = INTEGER.get_or_init(|| Regex::new(r"\d+").expect("Invalid integer regex"));
    // A digit run only fails to parse on overflow.
    re.find(line)
        .map(|m| m.as_str().parse().unwrap_or(u64::MAX))
}

/// Statistics recovered from engine output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScannedOutput {
    pub transformations: TransformationCounts,
    pub metrics: SecurityMetrics,
}

/// Scans engine output line by line.
///
/// Transformation counts accumulate across lines; cycles and scores take the
/// last value seen. Lines without an integer are ignored.
pub fn scan_output(output: &str) -> ScannedOutput {
    let mut scanned = ScannedOutput::default();

    for line in output.lines() {
        let lower = line.to_lowercase();
        let Some(value) = first_integer(&lower) else {
            continue;
        };
        for (rule, target) in RULES {
            if !rule.matches(&lower) {
                continue;
            }
            let counts = &mut scanned.transformations;
            match target {
                Target::StringObfuscations => {
                    counts.string_obfuscations = counts.string_obfuscations.saturating_add(value)
                }
                Target::FakeFunctions => {
                    counts.fake_functions = counts.fake_functions.saturating_add(value)
                }
                Target::BogusCodeLines => {
                    counts.bogus_code_lines = counts.bogus_code_lines.saturating_add(value)
                }
                Target::Cycles => counts.cycles = value,
                Target::SecurityScore => {
                    scanned.metrics.security_score = clamp_score(value as f64)
                }
                Target::ReDifficultyScore => {
                    scanned.metrics.re_difficulty_score = clamp_score(value as f64)
                }
            }
        }
    }

    scanned
}
