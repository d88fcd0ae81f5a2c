//! Auto-tune controller.
//!
//! Runs a fixed number of mutated-configuration trials for one input file,
//! keeps the best-scoring one and confirms it with a final run to the file's
//! canonical output path.
//!
//! ```text
//! Idle → Iterating(1..=N) → Finalizing → Done
//! ```
//!
//! Any trial failure aborts the file's search with the triggering error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::fitness;
use super::mutator::mutate;
use crate::config::{ConfigurationDocument, Mode};
use crate::error::{Result, TunerError};
use crate::runner::{sidecar_path_for, Obfuscator, TrialRequest, TrialStatistics};

/// Largest accepted number of search iterations per file.
pub const MAX_ITERATIONS: u32 = 50;

/// File name of the saved best configuration in a tuning directory.
pub const BEST_CONFIG_FILE: &str = "best_config.yaml";
/// File name of the saved trial history in a tuning directory.
pub const TRIALS_FILE: &str = "trials.json";

/// Position of one file's search in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TunePhase {
    Idle,
    Iterating { iteration: u32 },
    Finalizing,
    Done,
}

/// One scored search trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// 1-based iteration index.
    pub iteration: u32,
    pub config: ConfigurationDocument,
    pub config_fingerprint: String,
    pub stats: TrialStatistics,
    pub score: f64,
    /// Temporary output written by this trial.
    pub output_path: PathBuf,
}

/// The best trial seen so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCandidate {
    pub iteration: u32,
    pub score: f64,
    pub config: ConfigurationDocument,
}

impl From<&TrialResult> for BestCandidate {
    fn from(trial: &TrialResult) -> Self {
        Self {
            iteration: trial.iteration,
            score: trial.score,
            config: trial.config.clone(),
        }
    }
}

/// Search state for one input file.
///
/// Owned by the caller of [`AutoTuneController::tune_file`] once it returns,
/// so repeated or concurrent searches never share state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoTuneSession {
    input: PathBuf,
    base: ConfigurationDocument,
    total_iterations: u32,
    phase: TunePhase,
    trials: Vec<TrialResult>,
    best: Option<BestCandidate>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl AutoTuneSession {
    /// Creates an idle session holding the base configuration for the search.
    pub fn new(input: impl Into<PathBuf>, base: ConfigurationDocument, total_iterations: u32) -> Self {
        Self {
            input: input.into(),
            base,
            total_iterations: total_iterations.max(1),
            phase: TunePhase::Idle,
            trials: Vec::new(),
            best: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn base(&self) -> &ConfigurationDocument {
        &self.base
    }

    pub fn total_iterations(&self) -> u32 {
        self.total_iterations
    }

    pub fn phase(&self) -> TunePhase {
        self.phase
    }

    /// Trials in iteration order.
    pub fn trials(&self) -> &[TrialResult] {
        &self.trials
    }

    pub fn best(&self) -> Option<&BestCandidate> {
        self.best.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Configuration for the given iteration of this search.
    pub fn candidate_config(&self, iteration: u32) -> ConfigurationDocument {
        mutate(&self.base, iteration, self.total_iterations)
    }

    /// Appends a scored trial. Returns `true` if it became the new best.
    ///
    /// Only a strictly higher score replaces the current best, so the earliest
    /// of several tied trials is kept.
    pub fn record(&mut self, trial: TrialResult) -> bool {
        self.phase = TunePhase::Iterating {
            iteration: trial.iteration,
        };
        let improved = match &self.best {
            None => true,
            Some(best) => trial.score > best.score,
        };
        if improved {
            self.best = Some(BestCandidate::from(&trial));
        }
        self.trials.push(trial);
        improved
    }

    /// Moves to `Finalizing` and returns the configuration to confirm.
    fn begin_finalizing(&mut self) -> Result<ConfigurationDocument> {
        let best = self.best.as_ref().ok_or(TunerError::EmptyResultSet)?;
        self.phase = TunePhase::Finalizing;
        Ok(best.config.clone())
    }

    fn finish(&mut self) {
        self.phase = TunePhase::Done;
        self.finished_at = Some(Utc::now());
    }
}

/// Search parameters shared by every file of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuneOptions {
    /// Search iterations per file.
    pub iterations: u32,
    pub mode: Mode,
    /// Search trials allowed in flight at once.
    pub parallelism: usize,
    /// Keep the outputs of non-best trials.
    pub keep_trials: bool,
}

impl Default for TuneOptions {
    fn default() -> Self {
        Self {
            iterations: 10,
            mode: Mode::Normal,
            parallelism: 1,
            keep_trials: true,
        }
    }
}

impl TuneOptions {
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_keep_trials(mut self, keep: bool) -> Self {
        self.keep_trials = keep;
        self
    }
}

/// Result of tuning one file.
#[derive(Debug, Clone)]
pub struct FileTuneOutcome {
    pub session: AutoTuneSession,
    /// Statistics of the confirmation run; these are what gets reported.
    pub final_stats: TrialStatistics,
    /// Canonical output path written by the confirmation run.
    pub output: PathBuf,
    /// Directory holding the audit artifacts of the search.
    pub work_dir: PathBuf,
}

/// Drives the search for each input file.
pub struct AutoTuneController {
    obfuscator: Arc<dyn Obfuscator>,
    options: TuneOptions,
}

impl AutoTuneController {
    pub fn new(obfuscator: Arc<dyn Obfuscator>, options: TuneOptions) -> Self {
        Self {
            obfuscator,
            options,
        }
    }

    pub fn options(&self) -> &TuneOptions {
        &self.options
    }

    /// Tunes one input file.
    ///
    /// Search trials write to `work_dir`; only the confirmation run writes to
    /// `output`. Up to `parallelism` trials run at once, but results are
    /// consumed in iteration order so the chosen best does not depend on it.
    pub async fn tune_file(
        &self,
        input: &Path,
        output: &Path,
        base: &ConfigurationDocument,
        work_dir: &Path,
    ) -> Result<FileTuneOutcome> {
        let mut session = AutoTuneSession::new(input, base.clone(), self.options.iterations);
        let total = session.total_iterations();
        tokio::fs::create_dir_all(work_dir).await?;

        info!(
            "Auto-tuning {} ({} iterations, {} mode)",
            input.display(),
            total,
            self.options.mode.display_name()
        );

        let output_name = output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());

        let requests: Vec<(u32, TrialRequest)> = (1..=total)
            .map(|iteration| {
                let request = TrialRequest::new(
                    input,
                    work_dir.join(format!("temp_iter{}_{}", iteration, output_name)),
                    session.candidate_config(iteration),
                    work_dir.join(format!("config_iter{}.yaml", iteration)),
                );
                (iteration, request)
            })
            .collect();

        let obfuscator = &self.obfuscator;
        let mut trials = stream::iter(requests)
            .map(|(iteration, request)| async move {
                let stats = obfuscator.run_trial(&request).await;
                (iteration, request, stats)
            })
            .buffered(self.options.parallelism.max(1));

        while let Some((iteration, request, stats)) = trials.next().await {
            let stats = stats?;
            let score = fitness::score(&stats, self.options.mode);
            info!(
                "Iteration {}/{}: fitness score {:.2}",
                iteration, total, score
            );

            let trial = TrialResult {
                iteration,
                config_fingerprint: request.config.fingerprint(),
                config: request.config,
                stats,
                score,
                output_path: request.output,
            };
            if session.record(trial) {
                info!("New best configuration found (score: {:.2})", score);
            }
        }
        drop(trials);

        let best_config = session.begin_finalizing()?;
        if let Some(best) = session.best() {
            info!(
                "Applying best configuration from iteration {} (score: {:.2})",
                best.iteration, best.score
            );
        }
        let final_request = TrialRequest::new(
            input,
            output,
            best_config,
            work_dir.join(BEST_CONFIG_FILE),
        );
        let final_stats = self.obfuscator.run_trial(&final_request).await?;

        save_trials(&session, &work_dir.join(TRIALS_FILE)).await?;
        if !self.options.keep_trials {
            remove_discarded_trials(&session).await;
        }
        session.finish();

        Ok(FileTuneOutcome {
            session,
            final_stats,
            output: output.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
        })
    }
}

async fn save_trials(session: &AutoTuneSession, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(session.trials())?;
    tokio::fs::write(path, json).await?;
    debug!("Saved trial history to {}", path.display());
    Ok(())
}

/// Deletes outputs and sidecars of every trial except the best one.
async fn remove_discarded_trials(session: &AutoTuneSession) {
    let best_iteration = session.best().map(|b| b.iteration);
    for trial in session.trials() {
        if Some(trial.iteration) == best_iteration {
            continue;
        }
        for path in [trial.output_path.clone(), sidecar_path_for(&trial.output_path)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}
