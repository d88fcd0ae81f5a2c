//! Configuration for obfuscator invocations.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default location of the external obfuscator binary.
pub const DEFAULT_OBFUSCATOR: &str = "./build/phantron-llvm-obfuscator";

/// How the external obfuscator is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Program to execute.
    pub obfuscator: PathBuf,
    /// Arguments placed before the generated ones (e.g. a wrapper script).
    pub launcher_args: Vec<String>,
    /// Maximum duration of one trial.
    pub timeout: Duration,
    /// Environment variables passed to the obfuscator.
    pub env_vars: Vec<(String, String)>,
    /// Pass `--verbose` so the text scan has something to work with.
    pub verbose: bool,
}

impl RunnerConfig {
    /// Creates a runner configuration with defaults.
    pub fn new(obfuscator: impl Into<PathBuf>) -> Self {
        Self {
            obfuscator: obfuscator.into(),
            launcher_args: Vec::new(),
            timeout: Duration::from_secs(600),
            env_vars: Vec::new(),
            verbose: true,
        }
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a leading argument.
    pub fn with_launcher_arg(mut self, arg: impl Into<String>) -> Self {
        self.launcher_args.push(arg.into());
        self
    }

    /// Adds an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Enables or disables verbose engine output.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Display name of the obfuscator for logs.
    pub fn program_name(&self) -> String {
        self.obfuscator
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.obfuscator.display().to_string())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OBFUSCATOR)
    }
}
