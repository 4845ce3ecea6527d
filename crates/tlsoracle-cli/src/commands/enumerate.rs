//! Enumerate command - list the configurations a probe would test.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use tlsoracle_core::{ProbeKind, ScanDetail, TargetCapabilities, TestConfiguration, enumerate};

use crate::output::create_table;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Target capabilities (JSON), or a transcript carrying them
    #[arg(value_name = "CAPABILITIES")]
    pub capabilities: PathBuf,

    /// Oracle family to enumerate for
    #[arg(long, value_name = "PROBE")]
    pub probe: ProbeKind,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON output format for enumerate command
#[derive(Serialize)]
struct Enumeration<'a> {
    probe: ProbeKind,
    scan_detail: ScanDetail,
    configurations: &'a [TestConfiguration],
}

/// Accepts either a bare capabilities document or one nested under `capabilities`.
pub fn parse_capabilities(content: &str) -> Result<TargetCapabilities> {
    let mut value: serde_json::Value = serde_json::from_str(content)?;
    if let Some(nested) = value.get_mut("capabilities") {
        value = nested.take();
    }
    Ok(serde_json::from_value(value)?)
}

#[instrument(level = "info", name = "cmd::enumerate", skip_all, fields(probe = %args.probe))]
pub fn execute(args: &Args, detail: ScanDetail) -> Result<()> {
    let content = std::fs::read_to_string(&args.capabilities).with_context(|| {
        format!(
            "Failed to read capabilities: {}",
            args.capabilities.display()
        )
    })?;
    let capabilities = parse_capabilities(&content).with_context(|| {
        format!(
            "Failed to parse capabilities: {}",
            args.capabilities.display()
        )
    })?;

    let configurations = enumerate(&capabilities, detail, args.probe);

    if args.json {
        let output = Enumeration {
            probe: args.probe,
            scan_detail: detail,
            configurations: &configurations,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if configurations.is_empty() {
        println!(
            "No eligible configurations for {} at {detail} detail",
            args.probe
        );
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Version", "Cipher Suite", "Vectors", "Records"]);
    for configuration in &configurations {
        table.add_row(vec![
            configuration.protocol_version.to_string(),
            configuration.cipher_suite.to_string(),
            configuration.vector_generator.to_string(),
            configuration.record_generator.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_and_nested_capabilities() {
        let bare = r#"{"version_suites": [{"version": "TLS12", "cipher_suites": ["TLS_RSA_WITH_AES_128_CBC_SHA"]}]}"#;
        let nested = format!(r#"{{"capabilities": {bare}, "configurations": []}}"#);

        let a = parse_capabilities(bare).unwrap();
        let b = parse_capabilities(&nested).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.version_suites.len(), 1);
    }

    #[test]
    fn test_parse_rejects_unknown_version() {
        let doc = r#"{"version_suites": [{"version": "TLS14", "cipher_suites": []}]}"#;
        assert!(parse_capabilities(doc).is_err());
    }
}
