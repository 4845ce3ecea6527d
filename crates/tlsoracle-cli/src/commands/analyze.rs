//! Analyze command - run the adaptive scanner against a recorded transcript.
//!
//! # Examples
//!
//! ```bash
//! # Padding-oracle verdict as a table
//! tlsoracle analyze capture.json --probe padding-oracle
//!
//! # Full JSON report, failing the pipeline if an oracle is present
//! tlsoracle --detail all analyze capture.json --probe bleichenbacher --json --fail-on-oracle
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use comfy_table::Cell;
use tracing::instrument;

use tlsoracle_core::report::ProbeReport;
use tlsoracle_core::{AdaptiveOracleScanner, ProbeKind, ProbeVerdict, ReplayExecutor, ScannerConfig};

use crate::exit_code;
use crate::output::{create_table, format_flags, verdict_cell};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Recorded measurement transcript (JSON)
    #[arg(value_name = "TRANSCRIPT")]
    pub transcript: PathBuf,

    /// Oracle family to analyze
    #[arg(long, value_name = "PROBE")]
    pub probe: ProbeKind,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit with 4 if an oracle is found, 5 if the verdict is inconclusive
    #[arg(long)]
    pub fail_on_oracle: bool,
}

#[instrument(level = "info", name = "cmd::analyze", skip_all, fields(transcript = %args.transcript.display(), probe = %args.probe))]
pub fn execute(args: &Args, config: ScannerConfig) -> Result<u8> {
    let executor = ReplayExecutor::from_path(&args.transcript)
        .with_context(|| format!("Failed to load transcript: {}", args.transcript.display()))?;
    let capabilities = executor.capabilities().clone();
    let include_maps = config.includes_response_maps();

    let scanner = AdaptiveOracleScanner::new(config, executor)?;
    let outcome = scanner
        .scan(args.probe, &capabilities)
        .with_context(|| format!("Scan for {} failed", args.probe))?;
    let report = ProbeReport::from_outcome(&outcome, include_maps);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(verdict_exit_code(report.verdict, args.fail_on_oracle))
}

/// Map a verdict to the process exit code.
pub fn verdict_exit_code(verdict: ProbeVerdict, fail_on_oracle: bool) -> u8 {
    if !fail_on_oracle {
        return exit_code::SUCCESS;
    }
    match verdict {
        ProbeVerdict::True => exit_code::ORACLE_FOUND,
        ProbeVerdict::False => exit_code::SUCCESS,
        ProbeVerdict::Uncertain | ProbeVerdict::CouldNotTest => exit_code::INCONCLUSIVE,
    }
}

fn print_report(report: &ProbeReport) {
    let mut summary = create_table();
    summary.set_header(vec!["Property", "Value"]);
    summary.add_row(vec!["Probe", report.probe.as_str()]);
    summary.add_row(vec!["Scan Detail", report.scan_detail.as_str()]);
    summary.add_row(vec![
        Cell::new("Verdict"),
        verdict_cell(Some(report.verdict)),
    ]);
    summary.add_row(vec![
        "Configurations".to_string(),
        report.stats.configurations.to_string(),
    ]);
    summary.add_row(vec![
        "Runs (base + extended)".to_string(),
        format!(
            "{} ({} + {})",
            report.stats.runs_requested(),
            report.stats.base_runs,
            report.stats.extended_runs
        ),
    ]);
    summary.add_row(vec![
        "Measurement Failures".to_string(),
        report.stats.measurement_failures.to_string(),
    ]);
    summary.add_row(vec![
        "Failure Rate".to_string(),
        format!("{:.1}%", report.stats.failure_rate() * 100.0),
    ]);
    summary.add_row(vec![
        "Early Exits".to_string(),
        report.stats.early_exits.to_string(),
    ]);
    println!("{summary}");

    if report.tests.is_empty() {
        println!("No eligible configurations for {}", report.probe);
        return;
    }

    let mut tests = create_table();
    tests.set_header(vec![
        "Version",
        "Cipher Suite",
        "Vectors",
        "Records",
        "Reference",
        "Runs",
        "Flags",
        "Verdict",
    ]);
    for test in &report.tests {
        let configuration = &test.configuration;
        tests.add_row(vec![
            Cell::new(configuration.protocol_version),
            Cell::new(&configuration.cipher_suite),
            Cell::new(configuration.vector_generator),
            Cell::new(configuration.record_generator),
            Cell::new(
                test.reference_error
                    .map_or_else(|| "-".to_string(), |error| error.to_string()),
            ),
            Cell::new(test.runs),
            Cell::new(format_flags(test)),
            verdict_cell(test.verdict),
        ]);
    }
    println!("{tests}");

    for test in &report.tests {
        let rows = test.reference_rows();
        if rows.is_empty() {
            continue;
        }
        println!("Response map for {}", test.configuration);
        let mut map = create_table();
        map.set_header(vec!["Vector", "Response"]);
        for (vector, response) in rows {
            map.add_row(vec![vector, response]);
        }
        println!("{map}");
    }
}
