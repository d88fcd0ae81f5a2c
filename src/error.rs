//! Error types for obfutune operations.
//!
//! Defines the error kinds surfaced by the tuning core:
//! - Configuration documents that cannot be read or parsed
//! - External obfuscator invocations that fail, exit non-zero or time out
//! - Aggregation over an empty set of trials
//! - Input files rejected before any trial starts

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while searching, running trials and reporting.
#[derive(Debug, Error)]
pub enum TunerError {
    #[error("Failed to read configuration '{path}': {message}")]
    ConfigRead { path: PathBuf, message: String },

    #[error("External obfuscator failed: {0}")]
    ExternalProcess(#[from] ProcessError),

    #[error("No completed trials to aggregate")]
    EmptyResultSet,

    #[error("Input validation failed: {}", .0.join("; "))]
    InvalidInput(Vec<String>),

    #[error("Report rendering failed: {0}")]
    Render(#[from] tera::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TunerError {
    /// Builds a `ConfigRead` error for the given document path.
    pub fn config_read(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        TunerError::ConfigRead {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Failures of a single external obfuscator invocation.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("could not launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("process timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type alias for tuning operations.
pub type Result<T> = std::result::Result<T, TunerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_lists_every_problem() {
        let err = TunerError::InvalidInput(vec![
            "File not found: a.c".to_string(),
            "Invalid file type: b.txt (expected .c or .cpp)".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("a.c"));
        assert!(msg.contains("b.txt"));
    }

    #[test]
    fn test_timeout_is_external_process_error() {
        let err: TunerError = ProcessError::Timeout(Duration::from_secs(5)).into();
        assert!(matches!(
            err,
            TunerError::ExternalProcess(ProcessError::Timeout(_))
        ));
    }
}
