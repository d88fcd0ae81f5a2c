//! Cross-file aggregation of final trial statistics.

use serde::{Deserialize, Serialize};

use crate::config::Mode;
use crate::error::{Result, TunerError};
use crate::runner::TrialStatistics;
use crate::tuning::fitness;

/// Summary of a run's final statistics across all input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    /// Number of files aggregated.
    pub files: usize,
    pub string_obfuscations: u64,
    pub fake_functions: u64,
    pub bogus_code_lines: u64,
    /// Highest cycle count seen on any file.
    pub max_cycles: u64,
    /// Mean security score, floored.
    pub security_score: u8,
    /// Mean reverse-engineering difficulty score, floored.
    pub re_difficulty_score: u8,
    /// Floor of the mean of the two averaged scores above.
    pub resilience_score: u8,
    /// Mean per-file fitness, floored.
    pub fitness_score: u32,
}

/// Aggregates per-file statistics.
///
/// Counts are summed, scores are averaged and floored, and cycles take the
/// maximum. Fails with [`TunerError::EmptyResultSet`] on an empty slice.
pub fn aggregate(stats: &[TrialStatistics], mode: Mode) -> Result<SummaryMetrics> {
    if stats.is_empty() {
        return Err(TunerError::EmptyResultSet);
    }
    let count = stats.len() as u64;

    let mut summary = SummaryMetrics {
        files: stats.len(),
        string_obfuscations: 0,
        fake_functions: 0,
        bogus_code_lines: 0,
        max_cycles: 0,
        security_score: 0,
        re_difficulty_score: 0,
        resilience_score: 0,
        fitness_score: 0,
    };
    let mut security_total = 0u64;
    let mut re_total = 0u64;
    let mut fitness_total = 0.0;

    for s in stats {
        let t = &s.transformations;
        summary.string_obfuscations = summary.string_obfuscations.saturating_add(t.string_obfuscations);
        summary.fake_functions = summary.fake_functions.saturating_add(t.fake_functions);
        summary.bogus_code_lines = summary.bogus_code_lines.saturating_add(t.bogus_code_lines);
        summary.max_cycles = summary.max_cycles.max(t.cycles);
        security_total += u64::from(s.metrics.security_score);
        re_total += u64::from(s.metrics.re_difficulty_score);
        fitness_total += fitness::score(s, mode);
    }

    // Means of 0..=100 values stay in range.
    summary.security_score = (security_total / count) as u8;
    summary.re_difficulty_score = (re_total / count) as u8;
    summary.resilience_score =
        ((u16::from(summary.security_score) + u16::from(summary.re_difficulty_score)) / 2) as u8;
    summary.fitness_score = (fitness_total / count as f64).floor() as u32;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(security: u8, re: u8, cycles: u64, strings: u64) -> TrialStatistics {
        let mut s = TrialStatistics::default();
        s.metrics.security_score = security;
        s.metrics.re_difficulty_score = re;
        s.transformations.cycles = cycles;
        s.transformations.string_obfuscations = strings;
        s
    }

    #[test]
    fn test_empty_is_error() {
        assert!(matches!(
            aggregate(&[], Mode::Normal),
            Err(TunerError::EmptyResultSet)
        ));
    }

    #[test]
    fn test_single_file_returns_own_scores() {
        let summary = aggregate(&[stats(83, 77, 4, 12)], Mode::Normal).unwrap();
        assert_eq!(summary.security_score, 83);
        assert_eq!(summary.re_difficulty_score, 77);
        assert_eq!(summary.resilience_score, 80);
        assert_eq!(summary.max_cycles, 4);
        assert_eq!(summary.string_obfuscations, 12);
        // 83*0.4 + 50*0.2 + 75*0.4 = 73.2
        assert_eq!(summary.fitness_score, 73);
    }

    #[test]
    fn test_multiple_files() {
        let summary = aggregate(
            &[stats(80, 70, 3, 5), stats(71, 75, 7, 6), stats(90, 80, 5, 0)],
            Mode::Security,
        )
        .unwrap();
        assert_eq!(summary.files, 3);
        assert_eq!(summary.string_obfuscations, 11);
        assert_eq!(summary.max_cycles, 7);
        // (80 + 71 + 90) / 3 = 80.33
        assert_eq!(summary.security_score, 80);
        // (70 + 75 + 80) / 3 = 75
        assert_eq!(summary.re_difficulty_score, 75);
        assert_eq!(summary.resilience_score, 77);
    }

    #[test]
    fn test_fitness_is_mean_across_files() {
        // Normal mode: 0.4*s + 10 + 30, so 76.4 and 48.0
        let summary = aggregate(&[stats(91, 75, 1, 0), stats(20, 75, 1, 0)], Mode::Normal).unwrap();
        assert_eq!(summary.fitness_score, 62);
    }
}
