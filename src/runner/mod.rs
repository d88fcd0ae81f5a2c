//! Trial runner for the external obfuscation engine.
//!
//! A trial runs the engine once on one input with one configuration and
//! turns whatever the engine emitted into [`TrialStatistics`].
//!
//! # Architecture
//!
//! ```text
//! ConfigurationDocument → build_args → obfuscator process → output binary
//!                                                         → verbose text  → scan_output
//!                                                         → sidecar JSON  → merge_sidecar
//! ```
//!
//! The runner:
//! 1. Writes the trial configuration for auditing
//! 2. Translates the configuration into engine command-line flags
//! 3. Runs the engine with a timeout
//! 4. Scans its text output, then overlays the structured sidecar report
//! 5. Records input and output sizes
//!
//! # Example
//!
//! ```ignore
//! use obfutune::runner::{ProcessObfuscator, RunnerConfig, TrialRequest, Obfuscator};
//!
//! let runner = ProcessObfuscator::new(
//!     RunnerConfig::new("./build/phantron-llvm-obfuscator")
//!         .with_timeout(Duration::from_secs(300)),
//! );
//! let request = TrialRequest::new("main.c", "out/main_obfuscated", config, "out/config.yaml");
//! let stats = runner.run_trial(&request).await?;
//! println!("Security score: {}", stats.metrics.security_score);
//! ```

pub mod config;
pub mod executor;
pub mod result;
pub mod scan;

pub use config::{RunnerConfig, DEFAULT_OBFUSCATOR};
pub use executor::{
    collect_statistics, sidecar_path_for, Obfuscator, ProcessObfuscator, TrialRequest,
};
pub use result::{
    size_increase_percent, SecurityMetrics, SidecarReport, TransformationCounts, TrialStatistics,
};
pub use scan::{scan_output, ScannedOutput};
