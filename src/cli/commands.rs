//! CLI command definitions for obfutune.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::config::{write_builtin_presets, Mode, Platform};
use crate::pipeline::{
    all_passed, check_prerequisites, PipelineConfig, PipelineOrchestrator, PrerequisiteCheck,
    SessionOutcome, SessionRequest,
};
use crate::tuning::MAX_ITERATIONS;

/// Default search iterations per file.
const DEFAULT_ITERATIONS: u32 = 10;

/// Drive an external obfuscator, auto-tune its configuration and report.
#[derive(Parser)]
#[command(name = "obfutune")]
#[command(about = "Search obfuscation configurations and report on the results")]
#[command(version)]
#[command(
    long_about = "obfutune runs an external LLVM obfuscator over C/C++ sources using a preset configuration,\noptionally searching the configuration space for the best security/size trade-off.\n\nExample usage:\n  obfutune obfuscate -i main.c,util.c -m security -a -n 10"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Obfuscate source files, optionally auto-tuning the configuration.
    #[command(alias = "obf")]
    Obfuscate(ObfuscateArgs),

    /// Check that the obfuscator, presets and a C compiler are available.
    Check(CheckArgs),

    /// Show usage examples.
    Examples,

    /// Write the built-in preset configurations to a directory.
    Presets(PresetsArgs),
}

/// Arguments for `obfutune obfuscate`.
#[derive(Parser, Debug)]
pub struct ObfuscateArgs {
    /// Input files, comma-separated (.c, .cpp, .cc, .cxx).
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub input: Vec<PathBuf>,

    /// Target platform (linux, windows).
    #[arg(short, long, default_value = "linux")]
    pub platform: Platform,

    /// Obfuscation mode (normal, security, size).
    #[arg(short, long, default_value = "normal")]
    pub mode: Mode,

    /// Search for the best configuration before the final run.
    #[arg(short, long)]
    pub auto_tune: bool,

    /// Search iterations per file (1-50).
    #[arg(
        short = 'n',
        long,
        default_value_t = DEFAULT_ITERATIONS,
        value_parser = clap::value_parser!(u32).range(1..=MAX_ITERATIONS as i64)
    )]
    pub iterations: u32,

    #[command(flatten)]
    pub env: EnvArgs,

    /// Output directory for session results.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Per-trial timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Search trials of one file to run concurrently.
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Delete outputs of discarded search trials.
    #[arg(long)]
    pub clean_trials: bool,

    /// Print the report as JSON.
    #[arg(short, long)]
    pub json: bool,
}

/// Obfuscator and preset locations, shared by several commands.
#[derive(clap::Args, Debug, Default)]
pub struct EnvArgs {
    /// Path of the obfuscator binary.
    #[arg(long)]
    pub obfuscator: Option<PathBuf>,

    /// Directory holding the preset configurations.
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
}

/// Arguments for `obfutune check`.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub env: EnvArgs,

    /// Output JSON.
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for `obfutune presets`.
#[derive(Parser, Debug)]
pub struct PresetsArgs {
    /// Destination directory.
    #[arg(default_value = "./config")]
    pub dir: PathBuf,

    /// Overwrite existing files.
    #[arg(short, long)]
    pub force: bool,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// For more control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Obfuscate(args) => run_obfuscate_command(args).await,
        Commands::Check(args) => run_check_command(args).await,
        Commands::Examples => {
            print_examples();
            Ok(())
        }
        Commands::Presets(args) => run_presets_command(args),
    }
}

/// Applies command-line overrides on top of the environment configuration.
fn pipeline_config(env: &EnvArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env().context("Invalid environment configuration")?;
    if let Some(path) = &env.obfuscator {
        config = config.with_obfuscator(path);
    }
    if let Some(dir) = &env.config_dir {
        config = config.with_config_dir(dir);
    }
    Ok(config)
}

async fn run_obfuscate_command(args: ObfuscateArgs) -> anyhow::Result<()> {
    let mut config = pipeline_config(&args.env)?;
    if let Some(dir) = &args.output_dir {
        config = config.with_results_dir(dir);
    }
    if let Some(secs) = args.timeout {
        config = config.with_trial_timeout(Duration::from_secs(secs));
    }
    if let Some(parallel) = args.parallel {
        config = config.with_parallel_trials(parallel);
    }
    if args.clean_trials {
        config = config.with_keep_trials(false);
    }
    config.validate()?;

    let mut request = SessionRequest::new(args.input)
        .with_platform(args.platform)
        .with_mode(args.mode);
    if args.auto_tune {
        request = request.with_auto_tune(args.iterations);
    }

    let orchestrator = PipelineOrchestrator::new(config);
    let outcome = orchestrator.run(&request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    } else {
        print_session_summary(&outcome);
    }
    Ok(())
}

fn print_session_summary(outcome: &SessionOutcome) {
    let report = &outcome.report;
    let metrics = &outcome.summary;

    println!("\n=== Obfuscation Complete ===");
    println!("Session:          {}", outcome.session_id);
    println!("Files processed:  {}", report.files_processed);
    println!("Duration:         {}", report.duration);
    println!(
        "Size:             {} -> {} ({}%)",
        report.total_input_formatted, report.total_output_formatted, report.size_increase
    );
    println!("Security score:   {}/100", metrics.security_score);
    println!("RE difficulty:    {}/100", metrics.re_difficulty_score);
    println!("Resilience:       {}/100", metrics.resilience_score);
    println!("Fitness:          {}", metrics.fitness_score);
    if let Some(tune) = &report.auto_tune {
        println!(
            "Auto-tune:        {} trials, best score {}",
            tune.trials_run, tune.best_score
        );
    }
    println!();
    for output in &report.outputs {
        println!("  {} ({})", output.path, output.size_formatted);
    }
    println!("\nReport: {}", outcome.report_paths.html.display());
}

#[derive(Serialize)]
struct CheckSummary<'a> {
    passed: bool,
    checks: &'a [PrerequisiteCheck],
}

async fn run_check_command(args: CheckArgs) -> anyhow::Result<()> {
    let config = pipeline_config(&args.env)?;
    let checks = check_prerequisites(&config).await;
    let passed = all_passed(&checks);

    if args.json {
        let summary = CheckSummary {
            passed,
            checks: &checks,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("\n=== Prerequisite Check ===");
        for check in &checks {
            let mark = if check.passed { "ok  " } else { "FAIL" };
            println!("[{}] {:<28} {}", mark, check.name, check.detail);
        }
        println!();
    }

    if !passed {
        anyhow::bail!("Some prerequisites are missing");
    }
    Ok(())
}

fn run_presets_command(args: PresetsArgs) -> anyhow::Result<()> {
    let written = write_builtin_presets(&args.dir, args.force)
        .with_context(|| format!("Failed to write presets to {}", args.dir.display()))?;
    if written.is_empty() {
        info!(
            "All presets already exist in {} (use --force to overwrite)",
            args.dir.display()
        );
    }
    for path in &written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_examples() {
    println!(
        "\
Examples:

  Obfuscate one file with the balanced preset:
    obfutune obfuscate -i main.c

  Several files for Windows with maximum security:
    obfutune obfuscate -i main.c,crypto.cpp -p windows -m security

  Auto-tune the configuration over 20 iterations, 4 trials at a time:
    obfutune obfuscate -i main.c -a -n 20 --parallel 4

  Keep disk usage down by deleting discarded trial outputs:
    obfutune obfuscate -i main.c -a --clean-trials

  Use a custom obfuscator build and results directory:
    obfutune obfuscate -i main.c --obfuscator ./bin/obf --output-dir ./out

  Verify the environment and install the default presets:
    obfutune check
    obfutune presets ./config
"
    );
}
