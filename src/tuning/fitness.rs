//! Multi-objective fitness scoring of trial statistics.
//!
//! The score is a weighted sum of a security, a size and a performance
//! component. It only ranks trials against each other within one search and
//! is not normalised to any fixed scale.

use serde::{Deserialize, Serialize};

use crate::config::Mode;
use crate::runner::TrialStatistics;

/// Size component used when no size increase could be computed.
pub const SIZE_SCORE_UNKNOWN: f64 = 50.0;

/// Performance component. Obfuscated binaries are not executed, so this is a
/// fixed value rather than a measurement.
pub const PERFORMANCE_PLACEHOLDER: f64 = 75.0;

/// Objective weights for one mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessWeights {
    pub security: f64,
    pub size: f64,
    pub performance: f64,
}

impl FitnessWeights {
    /// The fixed weight table for `mode`.
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Security => Self {
                security: 0.6,
                size: 0.1,
                performance: 0.3,
            },
            Mode::Size => Self {
                security: 0.4,
                size: 0.4,
                performance: 0.2,
            },
            Mode::Normal => Self {
                security: 0.4,
                size: 0.2,
                performance: 0.4,
            },
        }
    }
}

/// The three objective components of a score, before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessComponents {
    pub security: f64,
    pub size: f64,
    pub performance: f64,
}

impl FitnessComponents {
    /// Extracts the components from a trial's statistics.
    pub fn from_stats(stats: &TrialStatistics) -> Self {
        let size = stats
            .size_increase
            .map_or(SIZE_SCORE_UNKNOWN, |increase| (100.0 - increase).max(0.0));
        Self {
            security: f64::from(stats.metrics.security_score),
            size,
            performance: PERFORMANCE_PLACEHOLDER,
        }
    }

    /// Weighted sum of the components.
    pub fn weighted(&self, weights: &FitnessWeights) -> f64 {
        self.security * weights.security
            + self.size * weights.size
            + self.performance * weights.performance
    }
}

/// Scores one trial's statistics under `mode`.
pub fn score(stats: &TrialStatistics, mode: Mode) -> f64 {
    FitnessComponents::from_stats(stats).weighted(&FitnessWeights::for_mode(mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(security: u8, size_increase: Option<f64>) -> TrialStatistics {
        let mut stats = TrialStatistics::default();
        stats.metrics.security_score = security;
        stats.size_increase = size_increase;
        stats
    }

    #[test]
    fn test_security_mode_example() {
        let value = score(&stats(80, Some(20.0)), Mode::Security);
        assert!((value - 78.5).abs() < 1e-9, "got {}", value);
    }

    #[test]
    fn test_size_component() {
        assert_eq!(FitnessComponents::from_stats(&stats(70, None)).size, 50.0);
        assert_eq!(FitnessComponents::from_stats(&stats(70, Some(0.0))).size, 100.0);
        assert_eq!(FitnessComponents::from_stats(&stats(70, Some(250.0))).size, 0.0);
        assert_eq!(FitnessComponents::from_stats(&stats(70, Some(-10.0))).size, 110.0);
    }

    #[test]
    fn test_weights_sum_to_one() {
        for mode in Mode::ALL {
            let w = FitnessWeights::for_mode(mode);
            assert!((w.security + w.size + w.performance - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_monotonic_in_security_score() {
        for mode in Mode::ALL {
            for increase in [None, Some(0.0), Some(35.5), Some(400.0)] {
                let mut previous = f64::NEG_INFINITY;
                for security in 0..=100u8 {
                    let value = score(&stats(security, increase), mode);
                    assert!(value >= previous);
                    previous = value;
                }
            }
        }
    }

    #[test]
    fn test_balanced_defaults() {
        // 70*0.4 + 50*0.2 + 75*0.4
        let value = score(&TrialStatistics::default(), Mode::Normal);
        assert!((value - 68.0).abs() < 1e-9);
    }
}
