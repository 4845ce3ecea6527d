//! Scanner configuration for the CLI.
//!
//! Settings are read from a TOML file (`--config` or `TLSORACLE_CONFIG`) and
//! then overridden by command-line flags. Every key is optional.
//! `scan_detail` accepts upper- or lowercase names.
//!
//! # Example configuration
//!
//! ```toml
//! scan_detail = "DETAILED"
//! parallelism = 8
//!
//! [iterations]
//! extended = 10
//!
//! [timeouts]
//! long_ms = 2000
//!
//! [significance]
//! minimum_confirming_runs = 3
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use tlsoracle_core::{ScanDetail, ScannerConfig};

/// Flag-level overrides applied on top of the file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub scan_detail: Option<ScanDetail>,
    pub parallelism: Option<usize>,
    pub include_response_maps: Option<bool>,
}

/// Parse a scanner configuration from TOML text.
pub fn parse(content: &str) -> Result<ScannerConfig> {
    let config: ScannerConfig = toml::from_str(content)?;
    Ok(config)
}

/// Load the configuration file (if any), apply overrides and validate.
pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<ScannerConfig> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            parse(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        }
        None => ScannerConfig::default(),
    };

    if let Some(detail) = overrides.scan_detail {
        config.scan_detail = detail;
    }
    if let Some(parallelism) = overrides.parallelism {
        config.parallelism = parallelism;
    }
    if overrides.include_response_maps.is_some() {
        config.include_response_maps = overrides.include_response_maps;
    }

    config.validate().context("Invalid scanner configuration")?;
    tracing::debug!(?config, "Loaded scanner configuration");
    Ok(config)
}
