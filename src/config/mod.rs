//! Obfuscation configuration documents and presets.
//!
//! A run starts from one of three preset documents (selected by [`Mode`]) and,
//! when auto-tuning, derives a mutated copy per search iteration. Documents are
//! never changed in place once handed to a trial.

pub mod document;
pub mod presets;

pub use document::{
    ConfigurationDocument, ControlFlowSection, FeatureSet, FeatureToggle, ObfuscationSection,
    Technique,
};
pub use presets::{write_builtin_presets, Mode, Platform};
