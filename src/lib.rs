//! obfutune: configuration search and reporting for an external code obfuscator.
//!
//! This library drives an LLVM-based obfuscator over C/C++ sources, searches
//! its configuration space for the best security/size trade-off, and
//! assembles the results into HTML and JSON reports.

pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod tuning;

pub use error::{ProcessError, Result, TunerError};
