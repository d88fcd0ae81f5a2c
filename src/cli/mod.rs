//! Command-line interface for obfutune.
//!
//! Provides commands for obfuscation sessions, environment checks and
//! preset management.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
