//! Configuration search.
//!
//! - [`mutator`] derives one candidate configuration per iteration
//! - [`fitness`] scores a trial's statistics for a mode
//! - [`controller`] runs the search for one file and keeps the best trial

pub mod controller;
pub mod fitness;
pub mod mutator;

pub use controller::{
    AutoTuneController, AutoTuneSession, BestCandidate, FileTuneOutcome, TrialResult,
    TuneOptions, TunePhase, BEST_CONFIG_FILE, MAX_ITERATIONS, TRIALS_FILE,
};
pub use fitness::{score, FitnessComponents, FitnessWeights};
pub use mutator::{mutate, tuning_factor};
