//! Obfuscation modes, target platforms and the built-in preset documents.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::ConfigurationDocument;
use crate::error::Result;

/// Named obfuscation presets selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Balanced protection, size and speed.
    #[default]
    Normal,
    /// Maximum protection.
    Security,
    /// Minimal size increase.
    Size,
}

impl Mode {
    /// All modes, in CLI order.
    pub const ALL: [Mode; 3] = [Mode::Normal, Mode::Security, Mode::Size];

    /// Returns the display name for this mode.
    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Normal => "Normal",
            Mode::Security => "Security Focused",
            Mode::Size => "Size Conservative",
        }
    }

    /// File name of the preset document for this mode.
    pub fn preset_file(&self) -> &'static str {
        match self {
            Mode::Normal => "balanced.yaml",
            Mode::Security => "maximum_security.yaml",
            Mode::Size => "size_conservative.yaml",
        }
    }

    /// The preset document shipped with the binary.
    pub fn builtin_preset(&self) -> &'static str {
        match self {
            Mode::Normal => include_str!("presets/balanced.yaml"),
            Mode::Security => include_str!("presets/maximum_security.yaml"),
            Mode::Size => include_str!("presets/size_conservative.yaml"),
        }
    }

    /// Path of this mode's preset inside `config_dir`.
    pub fn preset_path(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(self.preset_file())
    }

    /// Loads this mode's preset from `config_dir`.
    pub fn load_preset(&self, config_dir: &Path) -> Result<ConfigurationDocument> {
        ConfigurationDocument::load(self.preset_path(config_dir))
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" | "balanced" => Ok(Mode::Normal),
            "security" | "security-focused" => Ok(Mode::Security),
            "size" | "size-conservative" => Ok(Mode::Size),
            other => Err(format!(
                "Invalid mode: {} (valid options: normal, security, size)",
                other
            )),
        }
    }
}

/// Target platform of the obfuscated binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Linux,
    Windows,
}

impl Platform {
    /// Returns the display name for this platform.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Linux => "Linux",
            Platform::Windows => "Windows",
        }
    }

    /// Canonical output file name for an input with the given stem.
    pub fn output_name(&self, stem: &str) -> String {
        match self {
            Platform::Linux => format!("{}_obfuscated", stem),
            Platform::Windows => format!("{}_obfuscated.exe", stem),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(Platform::Linux),
            "windows" | "win" => Ok(Platform::Windows),
            other => Err(format!(
                "Invalid platform: {} (valid options: linux, windows)",
                other
            )),
        }
    }
}

/// Writes the built-in presets into `dir`.
///
/// Existing files are left alone unless `overwrite` is set. Returns the paths
/// that were written.
pub fn write_builtin_presets(dir: &Path, overwrite: bool) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for mode in Mode::ALL {
        let path = mode.preset_path(dir);
        if path.exists() && !overwrite {
            info!("Keeping existing preset {}", path.display());
            continue;
        }
        fs::write(&path, mode.builtin_preset())?;
        info!("Wrote {} preset to {}", mode, path.display());
        written.push(path);
    }
    Ok(written)
}
