//! Environment probes for the `check` command.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::PipelineConfig;
use crate::config::Mode;

const COMPILER_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl PrerequisiteCheck {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Runs every probe. Failures are reported, never raised.
pub async fn check_prerequisites(config: &PipelineConfig) -> Vec<PrerequisiteCheck> {
    let mut checks = vec![check_obfuscator(&config.obfuscator)];
    checks.extend(check_presets(&config.config_dir));
    checks.push(check_compiler("gcc").await);
    checks
}

/// Whether every probe passed.
pub fn all_passed(checks: &[PrerequisiteCheck]) -> bool {
    checks.iter().all(|c| c.passed)
}

fn check_obfuscator(path: &Path) -> PrerequisiteCheck {
    const NAME: &str = "Obfuscator binary";
    if path.is_file() {
        PrerequisiteCheck::pass(NAME, format!("Found at {}", path.display()))
    } else {
        PrerequisiteCheck::fail(NAME, format!("Not found at {}", path.display()))
    }
}

fn check_presets(config_dir: &Path) -> Vec<PrerequisiteCheck> {
    Mode::ALL
        .iter()
        .map(|mode| {
            let path = mode.preset_path(config_dir);
            let name = format!("{} preset", mode.display_name());
            if path.is_file() {
                PrerequisiteCheck::pass(&name, path.display().to_string())
            } else {
                PrerequisiteCheck::fail(
                    &name,
                    format!("Missing {} (run `obfutune presets`)", path.display()),
                )
            }
        })
        .collect()
}

async fn check_compiler(compiler: &str) -> PrerequisiteCheck {
    const NAME: &str = "C compiler";
    let probe = tokio::process::Command::new(compiler)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(COMPILER_PROBE_TIMEOUT, probe).await {
        Ok(Ok(output)) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().unwrap_or(compiler).trim().to_string();
            PrerequisiteCheck::pass(NAME, version)
        }
        Ok(Ok(output)) => PrerequisiteCheck::fail(
            NAME,
            format!("{} --version exited with {}", compiler, output.status),
        ),
        Ok(Err(e)) => {
            debug!("Compiler probe failed: {}", e);
            PrerequisiteCheck::fail(NAME, format!("{} not found", compiler))
        }
        Err(_) => PrerequisiteCheck::fail(NAME, format!("{} --version timed out", compiler)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::write_builtin_presets;
    use tempfile::TempDir;

    #[test]
    fn test_missing_obfuscator_fails() {
        let temp = TempDir::new().unwrap();
        let check = check_obfuscator(&temp.path().join("nope"));
        assert!(!check.passed);
        assert!(check.detail.contains("Not found"));
    }

    #[test]
    fn test_presets_found_after_writing() {
        let temp = TempDir::new().unwrap();
        assert!(check_presets(temp.path()).iter().all(|c| !c.passed));

        write_builtin_presets(temp.path(), false).unwrap();
        let checks = check_presets(temp.path());
        assert_eq!(checks.len(), 3);
        assert!(all_passed(&checks));
    }

    #[tokio::test]
    async fn test_unknown_compiler_fails() {
        let check = check_compiler("definitely-not-a-compiler-xyz").await;
        assert!(!check.passed);
        assert!(check.detail.contains("not found"));
    }
}
