//! The obfuscation configuration document.
//!
//! Documents are human-editable YAML with a top-level `obfuscation` section.
//! Known knobs are typed; anything else is carried through untouched in the
//! `extra` maps so a mutated copy round-trips every key of its base.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, TunerError};

/// A nested mapping of named obfuscation knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationDocument {
    /// The obfuscation section; absent documents configure nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obfuscation: Option<ObfuscationSection>,
    /// Unrecognised top-level keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// The `obfuscation` section of a configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObfuscationSection {
    /// Obfuscation intensity passed to the engine (`low`, `medium`, `high`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Number of transformation cycles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycles: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_flow: Option<ControlFlowSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_encryption: Option<FeatureToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant_obfuscation: Option<FeatureToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anti_debugging: Option<FeatureToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtualization: Option<FeatureToggle>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// The `control_flow` sub-section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlFlowSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flattening: Option<FeatureToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bogus: Option<FeatureToggle>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A feature sub-section with an enable flag and an optional probability (0-100).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureToggle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl FeatureToggle {
    /// Creates an enabled toggle with the given probability.
    pub fn enabled_with(probability: i64) -> Self {
        Self {
            enabled: Some(true),
            probability: Some(probability),
            extra: BTreeMap::new(),
        }
    }

    /// True unless the document explicitly says `enabled: false`.
    pub fn is_not_disabled(&self) -> bool {
        self.enabled != Some(false)
    }

    /// True only when the document explicitly says `enabled: true`.
    pub fn is_opted_in(&self) -> bool {
        self.enabled == Some(true)
    }
}

/// Engine features as they will be requested from the obfuscator.
///
/// Flattening, bogus flow, strings and constants are on by default in the
/// engine and only switched off explicitly; anti-debugging and virtualization
/// are off by default and must be opted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSet {
    pub flattening: bool,
    pub bogus_flow: bool,
    pub string_encryption: bool,
    pub constant_obfuscation: bool,
    pub anti_debugging: bool,
    pub virtualization: bool,
}

/// A named technique applied by a configuration, for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technique {
    pub name: String,
    pub description: String,
}

impl Technique {
    fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

impl ConfigurationDocument {
    /// Loads a document from a YAML file.
    ///
    /// Missing or malformed files are reported as `ConfigRead` errors.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| TunerError::config_read(path, e))?;
        Self::from_yaml_str(&content, path)
    }

    /// Parses a document from YAML text; `origin` names the source in errors.
    pub fn from_yaml_str<P: AsRef<Path>>(content: &str, origin: P) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| TunerError::config_read(origin.as_ref(), e))
    }

    /// Serializes the document back to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Writes the document to `path`, creating parent directories as needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Async variant of [`save`](Self::save) for use inside trials.
    pub async fn save_async<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_yaml()?).await?;
        Ok(())
    }

    /// Short SHA-256 fingerprint of the serialized document.
    pub fn fingerprint(&self) -> String {
        let yaml = self.to_yaml().unwrap_or_default();
        let digest = Sha256::digest(yaml.as_bytes());
        hex::encode(&digest[..8])
    }

    /// The obfuscation level, `medium` when unset.
    pub fn level(&self) -> &str {
        self.obfuscation
            .as_ref()
            .and_then(|o| o.level.as_deref())
            .unwrap_or("medium")
    }

    /// The cycle count, 3 when unset.
    pub fn cycles(&self) -> i64 {
        self.obfuscation.as_ref().and_then(|o| o.cycles).unwrap_or(3)
    }

    /// Resolves which engine features this document requests.
    pub fn features(&self) -> FeatureSet {
        let section = self.obfuscation.as_ref();
        let control_flow = section.and_then(|o| o.control_flow.as_ref());
        let default_on = |t: Option<&FeatureToggle>| t.map_or(true, FeatureToggle::is_not_disabled);
        let opt_in = |t: Option<&FeatureToggle>| t.is_some_and(FeatureToggle::is_opted_in);

        FeatureSet {
            flattening: default_on(control_flow.and_then(|c| c.flattening.as_ref())),
            bogus_flow: default_on(control_flow.and_then(|c| c.bogus.as_ref())),
            string_encryption: default_on(section.and_then(|o| o.string_encryption.as_ref())),
            constant_obfuscation: default_on(
                section.and_then(|o| o.constant_obfuscation.as_ref()),
            ),
            anti_debugging: opt_in(section.and_then(|o| o.anti_debugging.as_ref())),
            virtualization: opt_in(section.and_then(|o| o.virtualization.as_ref())),
        }
    }

    /// Techniques applied by this document, in report order.
    pub fn techniques(&self) -> Vec<Technique> {
        let features = self.features();
        let mut techniques = Vec::new();
        if features.flattening {
            techniques.push(Technique::new(
                "Control Flow Flattening",
                "Obfuscates program flow structure",
            ));
        }
        if features.bogus_flow {
            techniques.push(Technique::new(
                "Bogus Control Flow",
                "Inserts fake conditional branches",
            ));
        }
        if features.string_encryption {
            techniques.push(Technique::new(
                "String Encryption",
                "Encrypts string literals at compile time",
            ));
        }
        if features.constant_obfuscation {
            techniques.push(Technique::new(
                "Constant Obfuscation",
                "Hides constant values",
            ));
        }
        if features.anti_debugging {
            techniques.push(Technique::new(
                "Anti-Debugging",
                "Detects and prevents debugging",
            ));
        }
        if features.virtualization {
            techniques.push(Technique::new(
                "Function Virtualization",
                "Translates functions into a custom bytecode interpreter",
            ));
        }
        techniques
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
obfuscation:
  level: high
  cycles: 4
  control_flow:
    flattening:
      enabled: true
      probability: 70
    bogus:
      enabled: false
  string_encryption:
    enabled: true
    probability: 80
    algorithm: xor
  anti_debugging:
    enabled: true
output:
  strip_symbols: true
"#;

    #[test]
    fn test_parse_known_and_unknown_keys() {
        let doc = ConfigurationDocument::from_yaml_str(SAMPLE, "sample.yaml").unwrap();
        let obf = doc.obfuscation.as_ref().unwrap();
        assert_eq!(obf.level.as_deref(), Some("high"));
        assert_eq!(obf.cycles, Some(4));
        let strings = obf.string_encryption.as_ref().unwrap();
        assert_eq!(strings.probability, Some(80));
        assert!(strings.extra.contains_key("algorithm"));
        assert!(doc.extra.contains_key("output"));
    }

    #[test]
    fn test_roundtrip_preserves_unknown_keys() {
        let doc = ConfigurationDocument::from_yaml_str(SAMPLE, "sample.yaml").unwrap();
        let yaml = doc.to_yaml().unwrap();
        let reparsed = ConfigurationDocument::from_yaml_str(&yaml, "again.yaml").unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn test_features_defaults_and_overrides() {
        let doc = ConfigurationDocument::from_yaml_str(SAMPLE, "sample.yaml").unwrap();
        let features = doc.features();
        assert!(features.flattening);
        assert!(!features.bogus_flow);
        assert!(features.string_encryption);
        assert!(features.constant_obfuscation); // absent -> engine default
        assert!(features.anti_debugging);
        assert!(!features.virtualization); // absent -> not opted in
    }

    #[test]
    fn test_empty_document_defaults() {
        let doc = ConfigurationDocument::default();
        assert_eq!(doc.level(), "medium");
        assert_eq!(doc.cycles(), 3);
        assert_eq!(doc.techniques().len(), 4);
    }

    #[test]
    fn test_load_missing_file_is_config_read_error() {
        let err = ConfigurationDocument::load("/nonexistent/balanced.yaml").unwrap_err();
        assert!(matches!(err, TunerError::ConfigRead { .. }));
    }

    #[test]
    fn test_load_malformed_file_is_config_read_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.yaml");
        fs::write(&path, "obfuscation:\n  cycles: [not, a, number]\n").unwrap();
        let err = ConfigurationDocument::load(&path).unwrap_err();
        assert!(matches!(err, TunerError::ConfigRead { .. }));
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/config.yaml");
        let doc = ConfigurationDocument::from_yaml_str(SAMPLE, "sample.yaml").unwrap();
        doc.save(&path).unwrap();
        assert_eq!(ConfigurationDocument::load(&path).unwrap(), doc);
    }

    #[tokio::test]
    async fn test_save_async_matches_save() {
        let temp = TempDir::new().unwrap();
        let sync_path = temp.path().join("sync.yaml");
        let async_path = temp.path().join("trials/iter1/config.yaml");
        let doc = ConfigurationDocument::from_yaml_str(SAMPLE, "sample.yaml").unwrap();

        doc.save(&sync_path).unwrap();
        doc.save_async(&async_path).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&async_path).unwrap(),
            std::fs::read_to_string(&sync_path).unwrap()
        );
        assert_eq!(ConfigurationDocument::load(&async_path).unwrap(), doc);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = ConfigurationDocument::from_yaml_str(SAMPLE, "a.yaml").unwrap();
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.obfuscation.as_mut().unwrap().cycles = Some(9);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }
}
