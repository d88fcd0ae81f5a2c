//! Session pipeline.
//!
//! # Architecture
//!
//! - **Config**: Where the obfuscator, presets and results live
//! - **Validation**: Input checks performed before any trial
//! - **Orchestrator**: Runs one session from inputs to reports
//! - **Prerequisites**: Environment probes for `obfutune check`
//!
//! # Session Flow
//!
//! 1. **Validation**: Every input must exist and be a C/C++ source
//! 2. **Preset**: The mode's preset becomes the base configuration
//! 3. **Obfuscation**: Each file gets one trial, or an auto-tune search
//!    followed by a confirmation run with the best configuration
//! 4. **Aggregation**: Final statistics are combined across files
//! 5. **Reporting**: HTML and JSON reports are written to the session directory
//!
//! # Example
//!
//! ```rust,ignore
//! use obfutune::config::Mode;
//! use obfutune::pipeline::{PipelineConfig, PipelineOrchestrator, SessionRequest};
//!
//! let config = PipelineConfig::from_env()?.with_parallel_trials(2);
//! let orchestrator = PipelineOrchestrator::new(config);
//!
//! let request = SessionRequest::new(vec!["src/main.c".into()])
//!     .with_mode(Mode::Security)
//!     .with_auto_tune(10);
//! let outcome = orchestrator.run(&request).await?;
//!
//! println!("Report: {}", outcome.report_paths.html.display());
//! ```

pub mod config;
pub mod orchestrator;
pub mod prerequisites;
pub mod validation;

pub use config::{ConfigError, PipelineConfig};
pub use orchestrator::{
    new_session_id, FileOutcome, PipelineOrchestrator, SessionOutcome, SessionRequest,
};
pub use prerequisites::{all_passed, check_prerequisites, PrerequisiteCheck};
pub use validation::{is_source_file, split_input_list, validate_inputs, SOURCE_EXTENSIONS};
