#![deny(unsafe_code)]

mod commands;
mod config;
mod exit_code;
mod output;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tlsoracle_core::error::{ConfigError, LeakTestError, ReplayError, ScanError};
use tlsoracle_core::ScanDetail;

use crate::commands::{analyze, enumerate};

/// Offline detection of padding, Bleichenbacher and master-secret oracles
#[derive(Parser)]
#[command(name = "tlsoracle")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Analyze a recorded capture for a CBC padding oracle
    tlsoracle analyze capture.json --probe padding-oracle

    # Exhaustive analysis, JSON report, fail the pipeline on findings
    tlsoracle --detail all analyze capture.json --probe bleichenbacher --json --fail-on-oracle

    # Show which configurations a master-secret probe would test
    tlsoracle enumerate capabilities.json --probe master-secret
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Scanner configuration file (TOML)
    #[arg(long, value_name = "FILE", env = "TLSORACLE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Scan detail: quick, normal, detailed or all
    #[arg(long, value_name = "DETAIL", env = "TLSORACLE_SCAN_DETAIL", global = true)]
    detail: Option<ScanDetail>,

    /// Maximum number of configurations measured concurrently
    #[arg(long, value_name = "N", global = true)]
    parallelism: Option<usize>,

    /// Attach raw response maps to the report regardless of scan detail
    #[arg(long, global = true)]
    include_maps: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the adaptive scanner against a recorded transcript
    Analyze(analyze::Args),

    /// List the configurations a probe would test
    Enumerate(enumerate::Args),
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let code = categorize_error(&e);

            let args: Vec<String> = std::env::args().collect();
            let is_quiet = args.iter().any(|a| a == "-q" || a == "--quiet");

            if !is_quiet {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<u8> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let overrides = config::Overrides {
        scan_detail: cli.detail,
        parallelism: cli.parallelism,
        include_response_maps: cli.include_maps.then_some(true),
    };
    let scanner_config = config::load(cli.config.as_deref(), overrides)?;

    match cli.command {
        Commands::Analyze(args) => analyze::execute(&args, scanner_config),
        Commands::Enumerate(args) => {
            enumerate::execute(&args, scanner_config.scan_detail)?;
            Ok(exit_code::SUCCESS)
        }
    }
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(replay_err) = cause.downcast_ref::<ReplayError>() {
            return match replay_err {
                ReplayError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                    exit_code::NOT_FOUND
                }
                ReplayError::Io { .. } | ReplayError::Serialize(_) => exit_code::GENERAL_ERROR,
                ReplayError::Parse { .. } | ReplayError::DuplicateConfiguration { .. } => {
                    exit_code::INVALID_INPUT
                }
            };
        }

        if cause.downcast_ref::<ConfigError>().is_some() {
            return exit_code::INVALID_INPUT;
        }

        if let Some(scan_err) = cause.downcast_ref::<ScanError>() {
            match scan_err {
                ScanError::Config(_)
                | ScanError::Leak(LeakTestError::InconsistentMeasurement { .. }) => {
                    return exit_code::INVALID_INPUT;
                }
                _ => return exit_code::GENERAL_ERROR,
            }
        }

        if cause.downcast_ref::<toml::de::Error>().is_some()
            || cause.downcast_ref::<serde_json::Error>().is_some()
        {
            return exit_code::INVALID_INPUT;
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && io_err.kind() == io::ErrorKind::NotFound
        {
            return exit_code::NOT_FOUND;
        }
    }

    exit_code::GENERAL_ERROR
}
