//! Session orchestrator.
//!
//! Runs one obfuscation session end to end:
//! - Validates the inputs before anything is executed
//! - Loads the mode's preset as the base configuration
//! - Obfuscates each file, directly or through the auto-tune search
//! - Aggregates final statistics and writes the HTML and JSON reports

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::config::PipelineConfig;
use super::validation::validate_inputs;
use crate::config::{ConfigurationDocument, Mode, Platform};
use crate::error::{Result, TunerError};
use crate::report::{
    self, AutoTuneSummary, ConfigSummary, InputFile, OutputFile, ReportModel, ReportPaths,
    SessionInfo, SummaryMetrics, NOT_AVAILABLE,
};
use crate::runner::{Obfuscator, ProcessObfuscator, TrialRequest, TrialStatistics};
use crate::tuning::{AutoTuneController, AutoTuneSession, TuneOptions, MAX_ITERATIONS};

/// What to obfuscate and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub inputs: Vec<PathBuf>,
    pub platform: Platform,
    pub mode: Mode,
    pub auto_tune: bool,
    /// Search iterations per file, 1 to 50.
    pub iterations: u32,
}

impl SessionRequest {
    /// Creates a request with defaults: Linux, normal mode, no auto-tuning.
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self {
            inputs,
            platform: Platform::default(),
            mode: Mode::default(),
            auto_tune: false,
            iterations: 10,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Enables auto-tuning with the given iteration count.
    pub fn with_auto_tune(mut self, iterations: u32) -> Self {
        self.auto_tune = true;
        self.iterations = iterations;
        self
    }

    /// Checks the inputs and, when tuning, the iteration count.
    pub fn validate(&self) -> Result<()> {
        validate_inputs(&self.inputs)?;
        if self.auto_tune && !(1..=MAX_ITERATIONS).contains(&self.iterations) {
            return Err(TunerError::InvalidInput(vec![format!(
                "Iterations must be between 1 and {}, got {}",
                MAX_ITERATIONS, self.iterations
            )]));
        }
        Ok(())
    }
}

/// Final result for one input file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Statistics of the run that produced `output`.
    pub stats: TrialStatistics,
    /// The search, when auto-tuning ran.
    pub tuning: Option<AutoTuneSession>,
}

/// Result of a completed session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub session_dir: PathBuf,
    pub files: Vec<FileOutcome>,
    pub summary: SummaryMetrics,
    pub report: ReportModel,
    pub report_paths: ReportPaths,
    pub duration: Duration,
}

/// Runs obfuscation sessions.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    obfuscator: Arc<dyn Obfuscator>,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator that launches the configured obfuscator.
    pub fn new(config: PipelineConfig) -> Self {
        let obfuscator = Arc::new(ProcessObfuscator::new(config.runner_config()));
        Self::with_obfuscator(config, obfuscator)
    }

    /// Creates an orchestrator around any obfuscator implementation.
    pub fn with_obfuscator(config: PipelineConfig, obfuscator: Arc<dyn Obfuscator>) -> Self {
        Self { config, obfuscator }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs one session.
    ///
    /// Input problems are reported before any obfuscator runs. A failing
    /// trial aborts the session with that trial's error.
    pub async fn run(&self, request: &SessionRequest) -> Result<SessionOutcome> {
        let start = Instant::now();
        let started_at = Utc::now();
        request.validate()?;

        let preset_path = request.mode.preset_path(&self.config.config_dir);
        let base = request.mode.load_preset(&self.config.config_dir)?;

        let session_id = new_session_id();
        let session_dir = self.config.results_dir.join(&session_id);
        tokio::fs::create_dir_all(&session_dir).await?;
        info!(
            "Starting session {} ({} file(s), {} mode, {})",
            session_id,
            request.inputs.len(),
            request.mode.display_name(),
            request.platform.display_name()
        );

        let names = output_names(&request.inputs, request.platform);
        let mut files = Vec::with_capacity(request.inputs.len());
        for (index, input) in request.inputs.iter().enumerate() {
            let stem = file_stem(input);
            let output = session_dir.join(&names[index]);
            info!("Processing {}", input.display());

            let outcome = if request.auto_tune {
                let work_dir = session_dir
                    .join("tuning")
                    .join(format!("{:02}_{}", index + 1, stem));
                self.tune_file(request, input, &output, &base, &work_dir).await?
            } else {
                let config_path = session_dir.join(format!("{:02}_{}_config.yaml", index + 1, stem));
                self.obfuscate_file(input, &output, &base, &config_path).await?
            };
            info!(
                "Finished {} (security score {})",
                input.display(),
                outcome.stats.metrics.security_score
            );
            files.push(outcome);
        }

        let final_stats: Vec<TrialStatistics> = files.iter().map(|f| f.stats.clone()).collect();
        let summary = report::aggregate(&final_stats, request.mode)?;

        let inputs = describe_inputs(&request.inputs).await?;
        let outputs = describe_outputs(files.iter().map(|f| f.output.as_path())).await;
        let auto_tune = request.auto_tune.then(|| {
            AutoTuneSummary::from_sessions(
                request.iterations,
                files.iter().filter_map(|f| f.tuning.as_ref()),
            )
        });

        let duration = start.elapsed();
        let report = report::assemble(
            SessionInfo {
                session_id: session_id.clone(),
                started_at,
                duration,
            },
            config_summary(request, &base, &preset_path),
            inputs,
            outputs,
            summary,
            auto_tune,
        );
        let report_paths = report::write_reports(&report, &session_dir).await?;

        info!("Session {} completed in {}", session_id, report.duration);
        Ok(SessionOutcome {
            session_id,
            session_dir,
            files,
            summary,
            report,
            report_paths,
            duration,
        })
    }

    /// A single trial with the base configuration.
    async fn obfuscate_file(
        &self,
        input: &Path,
        output: &Path,
        base: &ConfigurationDocument,
        config_path: &Path,
    ) -> Result<FileOutcome> {
        let trial = TrialRequest::new(input, output, base.clone(), config_path);
        let stats = self.obfuscator.run_trial(&trial).await?;
        Ok(FileOutcome {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            stats,
            tuning: None,
        })
    }

    async fn tune_file(
        &self,
        request: &SessionRequest,
        input: &Path,
        output: &Path,
        base: &ConfigurationDocument,
        work_dir: &Path,
    ) -> Result<FileOutcome> {
        let options = TuneOptions::default()
            .with_iterations(request.iterations)
            .with_mode(request.mode)
            .with_parallelism(self.config.parallel_trials)
            .with_keep_trials(self.config.keep_trials);
        let controller = AutoTuneController::new(Arc::clone(&self.obfuscator), options);
        let outcome = controller.tune_file(input, output, base, work_dir).await?;

        Ok(FileOutcome {
            input: input.to_path_buf(),
            output: outcome.output,
            stats: outcome.final_stats,
            tuning: Some(outcome.session),
        })
    }
}

/// `session_<UTC timestamp>_<8 hex chars>`.
pub fn new_session_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!(
        "session_{}_{}",
        Utc::now().format("%Y%m%dT%H%M%SZ"),
        &id[..8]
    )
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string())
}

/// Canonical output file name per input.
///
/// Inputs sharing a stem (`a/main.c`, `b/main.cpp`) get the same `NN_`
/// index prefix as their tuning directories so no output overwrites another.
fn output_names(inputs: &[PathBuf], platform: Platform) -> Vec<String> {
    let stems: Vec<String> = inputs.iter().map(|p| file_stem(p)).collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(stem.as_str()).or_default() += 1;
    }
    stems
        .iter()
        .enumerate()
        .map(|(index, stem)| {
            if counts.get(stem.as_str()).copied().unwrap_or(0) > 1 {
                platform.output_name(&format!("{:02}_{}", index + 1, stem))
            } else {
                platform.output_name(stem)
            }
        })
        .collect()
}

fn config_summary(request: &SessionRequest, base: &ConfigurationDocument, preset: &Path) -> ConfigSummary {
    ConfigSummary {
        mode: request.mode.display_name().to_string(),
        platform: request.platform.display_name().to_string(),
        auto_tune: request.auto_tune,
        iterations: if request.auto_tune {
            request.iterations.to_string()
        } else {
            NOT_AVAILABLE.to_string()
        },
        base_config: preset.display().to_string(),
        techniques: base.techniques(),
    }
}

async fn describe_inputs(inputs: &[PathBuf]) -> Result<Vec<InputFile>> {
    let mut described = Vec::with_capacity(inputs.len());
    for path in inputs {
        let size = tokio::fs::metadata(path).await?.len();
        described.push(InputFile::new(path, size));
    }
    Ok(described)
}

async fn describe_outputs<'a>(outputs: impl Iterator<Item = &'a Path>) -> Vec<OutputFile> {
    let mut described = Vec::new();
    for path in outputs {
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => Some(meta.len()),
            Err(e) => {
                debug!("Output {} not available: {}", path.display(), e);
                None
            }
        };
        described.push(OutputFile::new(path, size));
    }
    described
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::write_builtin_presets;
    use crate::error::ProcessError;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Writes a fixed-size output and reports a fixed security score.
    struct StubObfuscator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubObfuscator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Obfuscator for StubObfuscator {
        async fn run_trial(&self, request: &TrialRequest) -> Result<TrialStatistics> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProcessError::NonZeroExit {
                    code: 2,
                    stderr: "compile error".to_string(),
                }
                .into());
            }
            request.config.save(&request.config_path)?;
            fs::write(&request.output, vec![0u8; 150])?;
            let mut stats = TrialStatistics::default().with_sizes(100, 150);
            stats.metrics.security_score = 82;
            stats.transformations.cycles = request.config.cycles() as u64;
            Ok(stats)
        }
    }

    fn setup() -> (TempDir, PipelineConfig, PathBuf) {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join("config");
        write_builtin_presets(&config_dir, false).unwrap();
        let input = temp.path().join("main.c");
        fs::write(&input, vec![b'x'; 100]).unwrap();
        let config = PipelineConfig::new()
            .with_config_dir(config_dir)
            .with_results_dir(temp.path().join("results"));
        (temp, config, input)
    }

    #[tokio::test]
    async fn test_standard_session() {
        let (_temp, config, input) = setup();
        let stub = Arc::new(StubObfuscator::new());
        let orchestrator = PipelineOrchestrator::with_obfuscator(config, stub.clone());

        let outcome = orchestrator
            .run(&SessionRequest::new(vec![input]).with_mode(Mode::Security))
            .await
            .unwrap();

        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert!(outcome.session_id.starts_with("session_"));
        assert_eq!(outcome.summary.security_score, 82);
        // maximum_security preset runs 5 cycles.
        assert_eq!(outcome.summary.max_cycles, 5);
        assert_eq!(outcome.report.size_increase, "50.00");
        assert_eq!(outcome.report.configuration.mode, "Security Focused");
        assert!(outcome.report.auto_tune.is_none());
        assert!(outcome.files[0].output.ends_with("main_obfuscated"));
        assert!(outcome.report_paths.html.exists());
        assert!(outcome.report_paths.json.exists());
    }

    /// Copies the input verbatim, so each output's size identifies its input.
    struct CopyObfuscator;

    #[async_trait]
    impl Obfuscator for CopyObfuscator {
        async fn run_trial(&self, request: &TrialRequest) -> Result<TrialStatistics> {
            let size = fs::copy(&request.input, &request.output)?;
            Ok(TrialStatistics::default().with_sizes(size, size))
        }
    }

    #[tokio::test]
    async fn test_inputs_sharing_a_stem_keep_separate_outputs() {
        let (temp, config, unique) = setup();
        let first = temp.path().join("a").join("main.c");
        let second = temp.path().join("b").join("main.cpp");
        fs::create_dir_all(first.parent().unwrap()).unwrap();
        fs::create_dir_all(second.parent().unwrap()).unwrap();
        fs::write(&first, vec![b'a'; 100]).unwrap();
        fs::write(&second, vec![b'b'; 5000]).unwrap();
        let unique = unique.with_file_name("util.c");
        fs::write(&unique, vec![b'u'; 10]).unwrap();

        let orchestrator = PipelineOrchestrator::with_obfuscator(config, Arc::new(CopyObfuscator));
        let outcome = orchestrator
            .run(&SessionRequest::new(vec![first, second, unique]))
            .await
            .unwrap();

        let outputs: Vec<&PathBuf> = outcome.files.iter().map(|f| &f.output).collect();
        assert_ne!(outputs[0], outputs[1]);
        assert!(outputs[0].ends_with("01_main_obfuscated"));
        assert!(outputs[1].ends_with("02_main_obfuscated"));
        assert!(outputs[2].ends_with("util_obfuscated"));

        assert_eq!(fs::metadata(outputs[0]).unwrap().len(), 100);
        assert_eq!(fs::metadata(outputs[1]).unwrap().len(), 5000);
        let reported: Vec<u64> = outcome.report.outputs.iter().map(|o| o.size).collect();
        assert_eq!(reported, vec![100, 5000, 10]);
        assert_eq!(outcome.report.total_output_size, 5110);
    }

    #[test]
    fn test_output_names_prefix_only_colliding_stems() {
        let inputs = vec![
            PathBuf::from("x/app.c"),
            PathBuf::from("lib.c"),
            PathBuf::from("y/app.cc"),
        ];
        assert_eq!(
            output_names(&inputs, Platform::Windows),
            vec!["01_app_obfuscated.exe", "lib_obfuscated.exe", "03_app_obfuscated.exe"]
        );
    }

    #[tokio::test]
    async fn test_auto_tune_session() {
        let (_temp, config, input) = setup();
        let stub = Arc::new(StubObfuscator::new());
        let orchestrator = PipelineOrchestrator::with_obfuscator(config, stub.clone());

        let outcome = orchestrator
            .run(
                &SessionRequest::new(vec![input])
                    .with_platform(Platform::Windows)
                    .with_auto_tune(3),
            )
            .await
            .unwrap();

        // Three search trials plus the confirmation run.
        assert_eq!(stub.calls.load(Ordering::SeqCst), 4);
        let tuning = outcome.files[0].tuning.as_ref().unwrap();
        assert_eq!(tuning.trials().len(), 3);
        assert!(outcome.files[0].output.ends_with("main_obfuscated.exe"));
        let summary = outcome.report.auto_tune.as_ref().unwrap();
        assert_eq!(summary.iterations_per_file, 3);
        assert_eq!(summary.trials_run, 3);
        let work_dir = outcome.session_dir.join("tuning").join("01_main");
        assert!(work_dir.join("config_iter1.yaml").exists());
        assert!(work_dir.join("best_config.yaml").exists());
        assert!(work_dir.join("trials.json").exists());
    }

    #[tokio::test]
    async fn test_invalid_input_runs_nothing() {
        let (temp, config, input) = setup();
        let stub = Arc::new(StubObfuscator::new());
        let orchestrator = PipelineOrchestrator::with_obfuscator(config, stub.clone());

        let request = SessionRequest::new(vec![input, temp.path().join("missing.c")]);
        let err = orchestrator.run(&request).await.unwrap_err();

        assert!(matches!(err, TunerError::InvalidInput(_)));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
        assert!(!temp.path().join("results").exists());
    }

    #[tokio::test]
    async fn test_iteration_bounds() {
        let (_temp, config, input) = setup();
        let orchestrator =
            PipelineOrchestrator::with_obfuscator(config, Arc::new(StubObfuscator::new()));
        for iterations in [0, 51] {
            let request = SessionRequest::new(vec![input.clone()]).with_auto_tune(iterations);
            assert!(matches!(
                orchestrator.run(&request).await,
                Err(TunerError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_missing_preset_is_config_read_error() {
        let (temp, config, input) = setup();
        let config = config.with_config_dir(temp.path().join("nowhere"));
        let orchestrator =
            PipelineOrchestrator::with_obfuscator(config, Arc::new(StubObfuscator::new()));

        let err = orchestrator
            .run(&SessionRequest::new(vec![input]))
            .await
            .unwrap_err();
        assert!(matches!(err, TunerError::ConfigRead { .. }));
    }

    #[tokio::test]
    async fn test_trial_failure_aborts_session() {
        let (_temp, config, input) = setup();
        let mut stub = StubObfuscator::new();
        stub.fail = true;
        let orchestrator = PipelineOrchestrator::with_obfuscator(config, Arc::new(stub));

        let err = orchestrator
            .run(&SessionRequest::new(vec![input]).with_auto_tune(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TunerError::ExternalProcess(ProcessError::NonZeroExit { code: 2, .. })
        ));
    }

    #[test]
    fn test_session_id_format() {
        let id = new_session_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].ends_with('Z'));
        assert_eq!(parts[2].len(), 8);
    }
}
