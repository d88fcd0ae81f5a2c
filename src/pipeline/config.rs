//! Pipeline configuration.
//!
//! Where the obfuscator lives, where presets and results go, and how trials
//! are executed. Values come from defaults, then environment variables, then
//! command-line flags applied through the `with_*` builders.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::runner::{RunnerConfig, DEFAULT_OBFUSCATOR};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Environment-level settings shared by every session.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path of the external obfuscator.
    pub obfuscator: PathBuf,
    /// Arguments placed before the generated ones, e.g. a wrapper script.
    pub launcher_args: Vec<String>,
    /// Directory holding the preset documents.
    pub config_dir: PathBuf,
    /// Root directory for session output.
    pub results_dir: PathBuf,
    /// Timeout for one obfuscator invocation.
    pub trial_timeout: Duration,
    /// Search trials of one file allowed in flight at once.
    pub parallel_trials: usize,
    /// Keep outputs of discarded search trials.
    pub keep_trials: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            obfuscator: PathBuf::from(DEFAULT_OBFUSCATOR),
            launcher_args: Vec::new(),
            config_dir: PathBuf::from("./config"),
            results_dir: PathBuf::from("./obfuscation_results"),
            trial_timeout: Duration::from_secs(600),
            parallel_trials: 1,
            keep_trials: true,
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OBFUTUNE_OBFUSCATOR`: Obfuscator path (default: ./build/phantron-llvm-obfuscator)
    /// - `OBFUTUNE_CONFIG_DIR`: Preset directory (default: ./config)
    /// - `OBFUTUNE_RESULTS_DIR`: Session output root (default: ./obfuscation_results)
    /// - `OBFUTUNE_TRIAL_TIMEOUT_SECS`: Per-trial timeout in seconds (default: 600)
    /// - `OBFUTUNE_PARALLEL_TRIALS`: Concurrent search trials per file (default: 1)
    /// - `OBFUTUNE_KEEP_TRIALS`: Keep discarded trial outputs (default: true)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("OBFUTUNE_OBFUSCATOR") {
            config.obfuscator = PathBuf::from(val);
        }

        if let Some(val) = lookup("OBFUTUNE_CONFIG_DIR") {
            config.config_dir = PathBuf::from(val);
        }

        if let Some(val) = lookup("OBFUTUNE_RESULTS_DIR") {
            config.results_dir = PathBuf::from(val);
        }

        if let Some(val) = lookup("OBFUTUNE_TRIAL_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "OBFUTUNE_TRIAL_TIMEOUT_SECS")?;
            config.trial_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("OBFUTUNE_PARALLEL_TRIALS") {
            config.parallel_trials = parse_env_value(&val, "OBFUTUNE_PARALLEL_TRIALS")?;
        }

        if let Some(val) = lookup("OBFUTUNE_KEEP_TRIALS") {
            config.keep_trials = parse_env_bool(&val, "OBFUTUNE_KEEP_TRIALS")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.obfuscator.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "obfuscator path cannot be empty".to_string(),
            ));
        }

        if self.trial_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "trial_timeout must be greater than 0".to_string(),
            ));
        }

        if self.parallel_trials == 0 {
            return Err(ConfigError::ValidationFailed(
                "parallel_trials must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Runner settings derived from this configuration.
    pub fn runner_config(&self) -> RunnerConfig {
        let mut runner = RunnerConfig::new(&self.obfuscator).with_timeout(self.trial_timeout);
        for arg in &self.launcher_args {
            runner = runner.with_launcher_arg(arg.clone());
        }
        runner
    }

    /// Builder method to set the obfuscator path.
    pub fn with_obfuscator(mut self, path: impl Into<PathBuf>) -> Self {
        self.obfuscator = path.into();
        self
    }

    /// Builder method to add a launcher argument.
    pub fn with_launcher_arg(mut self, arg: impl Into<String>) -> Self {
        self.launcher_args.push(arg.into());
        self
    }

    /// Builder method to set the preset directory.
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// Builder method to set the results root.
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    /// Builder method to set the per-trial timeout.
    pub fn with_trial_timeout(mut self, timeout: Duration) -> Self {
        self.trial_timeout = timeout;
        self
    }

    /// Builder method to set search parallelism.
    pub fn with_parallel_trials(mut self, parallel: usize) -> Self {
        self.parallel_trials = parallel;
        self
    }

    /// Builder method to keep or clean discarded trial outputs.
    pub fn with_keep_trials(mut self, keep: bool) -> Self {
        self.keep_trials = keep;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.obfuscator, PathBuf::from("./build/phantron-llvm-obfuscator"));
        assert_eq!(config.config_dir, PathBuf::from("./config"));
        assert_eq!(config.results_dir, PathBuf::from("./obfuscation_results"));
        assert_eq!(config.trial_timeout, Duration::from_secs(600));
        assert_eq!(config.parallel_trials, 1);
        assert!(config.keep_trials);
    }

    #[test]
    fn test_from_lookup() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("OBFUTUNE_OBFUSCATOR", "/opt/obf/bin/obf"),
            ("OBFUTUNE_RESULTS_DIR", "/tmp/results"),
            ("OBFUTUNE_TRIAL_TIMEOUT_SECS", "30"),
            ("OBFUTUNE_PARALLEL_TRIALS", "4"),
            ("OBFUTUNE_KEEP_TRIALS", "no"),
        ]))
        .unwrap();

        assert_eq!(config.obfuscator, PathBuf::from("/opt/obf/bin/obf"));
        assert_eq!(config.config_dir, PathBuf::from("./config"));
        assert_eq!(config.results_dir, PathBuf::from("/tmp/results"));
        assert_eq!(config.trial_timeout, Duration::from_secs(30));
        assert_eq!(config.parallel_trials, 4);
        assert!(!config.keep_trials);
    }

    #[test]
    fn test_from_lookup_invalid_value() {
        let err = PipelineConfig::from_lookup(lookup(&[("OBFUTUNE_TRIAL_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("OBFUTUNE_TRIAL_TIMEOUT_SECS"));
    }

    #[test]
    fn test_from_lookup_runs_validation() {
        let err = PipelineConfig::from_lookup(lookup(&[("OBFUTUNE_PARALLEL_TRIALS", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("parallel_trials"));
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::new()
            .with_obfuscator("/bin/sh")
            .with_launcher_arg("fake.sh")
            .with_config_dir("presets")
            .with_results_dir("out")
            .with_trial_timeout(Duration::from_secs(5))
            .with_parallel_trials(2)
            .with_keep_trials(false);

        assert_eq!(config.obfuscator, PathBuf::from("/bin/sh"));
        assert_eq!(config.launcher_args, vec!["fake.sh".to_string()]);
        assert_eq!(config.config_dir, PathBuf::from("presets"));
        assert_eq!(config.results_dir, PathBuf::from("out"));
        assert_eq!(config.parallel_trials, 2);
        assert!(!config.keep_trials);

        let runner = config.runner_config();
        assert_eq!(runner.obfuscator, PathBuf::from("/bin/sh"));
        assert_eq!(runner.launcher_args, vec!["fake.sh".to_string()]);
        assert_eq!(runner.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validation_invalid_timeout() {
        let config = PipelineConfig::default().with_trial_timeout(Duration::from_secs(0));
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("trial_timeout"));
    }

    #[test]
    fn test_validation_empty_obfuscator() {
        let config = PipelineConfig::default().with_obfuscator("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_env_bool() {
        assert!(parse_env_bool("true", "test").unwrap());
        assert!(parse_env_bool("1", "test").unwrap());
        assert!(parse_env_bool("YES", "test").unwrap());
        assert!(parse_env_bool("on", "test").unwrap());

        assert!(!parse_env_bool("false", "test").unwrap());
        assert!(!parse_env_bool("0", "test").unwrap());
        assert!(!parse_env_bool("off", "test").unwrap());

        assert!(parse_env_bool("maybe", "test").is_err());
    }
}
