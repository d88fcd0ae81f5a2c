//! Deterministic configuration mutation for the auto-tune search.
//!
//! Each iteration interpolates the knobs of the base document by a tuning
//! factor `f = iteration / total_iterations` in `(0, 1]`. The search is a
//! sweep, not a random walk: the same inputs always yield the same document.

use crate::config::{ConfigurationDocument, FeatureToggle};

/// Valid cycle-count domain.
pub const CYCLES_MIN: i64 = 3;
pub const CYCLES_MAX: i64 = 10;

/// Valid probability domain.
pub const PROBABILITY_MIN: i64 = 0;
pub const PROBABILITY_MAX: i64 = 100;

/// Defaults used when a feature section exists without a probability.
pub const DEFAULT_FLATTENING_PROBABILITY: i64 = 70;
pub const DEFAULT_BOGUS_PROBABILITY: i64 = 50;
pub const DEFAULT_STRING_PROBABILITY: i64 = 80;

/// Interpolation rule for one probability knob: `base + f * span - offset`.
#[derive(Debug, Clone, Copy)]
struct ProbabilityRule {
    default_base: i64,
    span: f64,
    offset: f64,
}

const FLATTENING: ProbabilityRule = ProbabilityRule {
    default_base: DEFAULT_FLATTENING_PROBABILITY,
    span: 20.0,
    offset: 10.0,
};

const BOGUS: ProbabilityRule = ProbabilityRule {
    default_base: DEFAULT_BOGUS_PROBABILITY,
    span: 30.0,
    offset: 15.0,
};

const STRINGS: ProbabilityRule = ProbabilityRule {
    default_base: DEFAULT_STRING_PROBABILITY,
    span: 15.0,
    offset: 7.0,
};

impl ProbabilityRule {
    fn apply(&self, toggle: &mut FeatureToggle, factor: f64) {
        let base = toggle.probability.unwrap_or(self.default_base) as f64;
        let value = (base + factor * self.span - self.offset).floor();
        toggle.probability = Some(clamp_probability(value));
    }
}

fn clamp_probability(value: f64) -> i64 {
    value.clamp(PROBABILITY_MIN as f64, PROBABILITY_MAX as f64) as i64
}

/// Progress of a search in `(0, 1]`.
///
/// `total_iterations` of zero is treated as one, and `iteration` is clamped
/// into `1..=total_iterations`.
pub fn tuning_factor(iteration: u32, total_iterations: u32) -> f64 {
    let total = total_iterations.max(1);
    let iteration = iteration.clamp(1, total);
    f64::from(iteration) / f64::from(total)
}

/// Produces the configuration for one search iteration.
///
/// The base document is not modified; the returned document is an independent
/// copy. Only knobs present in the base are touched, except that a feature
/// section without a `probability` receives one derived from its default base.
pub fn mutate(
    base: &ConfigurationDocument,
    iteration: u32,
    total_iterations: u32,
) -> ConfigurationDocument {
    let factor = tuning_factor(iteration, total_iterations);
    let mut config = base.clone();

    let Some(obfuscation) = config.obfuscation.as_mut() else {
        return config;
    };

    if let Some(cycles) = obfuscation.cycles.as_mut() {
        let value = (CYCLES_MIN as f64 + factor * 7.0).floor() as i64;
        *cycles = value.clamp(CYCLES_MIN, CYCLES_MAX);
    }

    if let Some(control_flow) = obfuscation.control_flow.as_mut() {
        if let Some(flattening) = control_flow.flattening.as_mut() {
            FLATTENING.apply(flattening, factor);
        }
        if let Some(bogus) = control_flow.bogus.as_mut() {
            BOGUS.apply(bogus, factor);
        }
    }

    if let Some(strings) = obfuscation.string_encryption.as_mut() {
        STRINGS.apply(strings, factor);
    }

    config
}
