//! Trial executor - runs the external obfuscator once and normalizes its output.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::config::RunnerConfig;
use super::result::{SidecarReport, TrialStatistics};
use super::scan::scan_output;
use crate::config::ConfigurationDocument;
use crate::error::{ProcessError, Result};

/// Maximum stderr length kept in error messages.
const STDERR_SUMMARY_LEN: usize = 4000;

/// One (input file, configuration) pair to obfuscate.
#[derive(Debug, Clone)]
pub struct TrialRequest {
    /// Source file to obfuscate.
    pub input: PathBuf,
    /// Where the engine writes the produced binary.
    pub output: PathBuf,
    /// Configuration for this trial.
    pub config: ConfigurationDocument,
    /// Where the configuration is written for auditing before the run.
    pub config_path: PathBuf,
}

impl TrialRequest {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        config: ConfigurationDocument,
        config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            config,
            config_path: config_path.into(),
        }
    }

    /// Base path handed to the engine's `--report` option.
    pub fn report_base(&self) -> PathBuf {
        report_base_for(&self.output)
    }

    /// Path of the structured sidecar report the engine may write.
    pub fn sidecar_path(&self) -> PathBuf {
        sidecar_path_for(&self.output)
    }
}

/// `<output>.report`, the report base requested for an output path.
pub fn report_base_for(output: &Path) -> PathBuf {
    let mut base: OsString = output.as_os_str().to_os_string();
    base.push(".report");
    PathBuf::from(base)
}

/// `<output>.report.json`, where the sidecar for an output path lands.
pub fn sidecar_path_for(output: &Path) -> PathBuf {
    let mut path = report_base_for(output).into_os_string();
    path.push(".json");
    PathBuf::from(path)
}

/// Something that can execute obfuscation trials.
#[async_trait]
pub trait Obfuscator: Send + Sync {
    /// Runs one trial and returns its statistics.
    async fn run_trial(&self, request: &TrialRequest) -> Result<TrialStatistics>;
}

/// Runs trials by launching the external obfuscator process.
pub struct ProcessObfuscator {
    config: RunnerConfig,
}

impl ProcessObfuscator {
    /// Creates a new process-backed obfuscator.
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// The runner configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Builds the argument list for one trial.
    pub fn build_args(&self, request: &TrialRequest) -> Vec<OsString> {
        let doc = &request.config;
        let features = doc.features();

        let mut args: Vec<OsString> = self.config.launcher_args.iter().map(OsString::from).collect();
        args.push("-i".into());
        args.push(request.input.clone().into_os_string());
        args.push("-o".into());
        args.push(request.output.clone().into_os_string());
        args.push("-l".into());
        args.push(doc.level().into());
        args.push("--cycles".into());
        args.push(doc.cycles().to_string().into());
        if self.config.verbose {
            args.push("--verbose".into());
        }

        if !features.flattening {
            args.push("--no-flatten".into());
        }
        if !features.string_encryption {
            args.push("--no-strings".into());
        }
        if !features.constant_obfuscation {
            args.push("--no-constants".into());
        }
        if features.anti_debugging {
            args.push("--enable-anti-debug".into());
        }
        if features.virtualization {
            args.push("--enable-virtualization".into());
        }

        args.push("--report".into());
        args.push(request.report_base().into_os_string());
        args.push("--report-format".into());
        args.push("json".into());
        args
    }

    async fn invoke(&self, args: &[OsString]) -> std::result::Result<String, ProcessError> {
        let program = self.config.obfuscator.display().to_string();
        let mut command = tokio::process::Command::new(&self.config.obfuscator);
        command
            .args(args)
            .envs(self.config.env_vars.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|source| ProcessError::Spawn { program, source })?;

        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(ProcessError::Spawn {
                    program: self.config.program_name(),
                    source,
                })
            }
            Err(_) => return Err(ProcessError::Timeout(self.config.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProcessError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: truncate_string(stderr.trim(), STDERR_SUMMARY_LEN),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl Obfuscator for ProcessObfuscator {
    async fn run_trial(&self, request: &TrialRequest) -> Result<TrialStatistics> {
        let start = Instant::now();
        request.config.save_async(&request.config_path).await?;
        debug!("Wrote trial configuration to {}", request.config_path.display());

        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let sidecar = request.sidecar_path();
        if tokio::fs::try_exists(&sidecar).await.unwrap_or(false) {
            tokio::fs::remove_file(&sidecar).await?;
        }

        let args = self.build_args(request);
        info!(
            "Executing {} on {}",
            self.config.program_name(),
            request.input.display()
        );
        debug!("Arguments: {:?}", args);

        let stdout = self.invoke(&args).await?;
        let stats = collect_statistics(&stdout, &request.input, &request.output, &sidecar).await?;

        debug!(
            "Trial on {} finished in {:?} (output {} bytes)",
            request.input.display(),
            start.elapsed(),
            stats.output_size
        );
        Ok(stats)
    }
}

/// Derives trial statistics from engine output and the files it produced.
///
/// Text-scanned values come first; a readable sidecar report then overrides
/// them field by field. An unreadable sidecar is logged and ignored.
pub async fn collect_statistics(
    stdout: &str,
    input: &Path,
    output: &Path,
    sidecar: &Path,
) -> Result<TrialStatistics> {
    let scanned = scan_output(stdout);
    let input_size = tokio::fs::metadata(input).await?.len();
    let output_size = match tokio::fs::metadata(output).await {
        Ok(meta) => meta.len(),
        Err(_) => {
            warn!("Obfuscator produced no output at {}", output.display());
            0
        }
    };

    let mut stats = TrialStatistics {
        transformations: scanned.transformations,
        metrics: scanned.metrics,
        ..TrialStatistics::default()
    }
    .with_sizes(input_size, output_size);

    if let Some(report) = read_sidecar(sidecar).await {
        stats.merge_sidecar(&report);
    }
    Ok(stats)
}

async fn read_sidecar(path: &Path) -> Option<SidecarReport> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str(&content) {
        Ok(report) => Some(report),
        Err(e) => {
            warn!(
                "Ignoring unreadable sidecar report {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

/// Truncates a string to at most `max_len` bytes on a char boundary.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}
