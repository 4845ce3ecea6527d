//! Scanner configuration.
//!
//! [`ScannerConfig`] carries the scan-detail dial and everything derived from
//! it: iteration counts for the base and extended passes, the timeout policy
//! handed to the measurement executor, the worker budget, and the rule used
//! to call a configuration significant. Every field has a default so a
//! partial TOML or JSON document deserializes cleanly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vector::ProbeKind;

/// Default worker budget for measurement requests.
pub const DEFAULT_PARALLELISM: usize = 4;

/// The scan-detail dial, ordered from cheapest to most exhaustive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanDetail {
    #[serde(alias = "quick")]
    Quick,
    #[default]
    #[serde(alias = "normal")]
    Normal,
    #[serde(alias = "detailed")]
    Detailed,
    #[serde(alias = "all")]
    All,
}

impl ScanDetail {
    pub fn is_at_least(self, other: ScanDetail) -> bool {
        self >= other
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanDetail::Quick => "QUICK",
            ScanDetail::Normal => "NORMAL",
            ScanDetail::Detailed => "DETAILED",
            ScanDetail::All => "ALL",
        }
    }
}

impl fmt::Display for ScanDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown scan detail string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseScanDetailError(String);

impl fmt::Display for ParseScanDetailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown scan detail '{}' (expected quick, normal, detailed or all)",
            self.0
        )
    }
}

impl std::error::Error for ParseScanDetailError {}

impl FromStr for ScanDetail {
    type Err = ParseScanDetailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quick" => Ok(ScanDetail::Quick),
            "normal" => Ok(ScanDetail::Normal),
            "detailed" => Ok(ScanDetail::Detailed),
            "all" => Ok(ScanDetail::All),
            _ => Err(ParseScanDetailError(s.to_owned())),
        }
    }
}

/// Iteration counts for the two measurement passes.
///
/// `Quick` scans take a single base run per configuration but, when a
/// configuration shows distinct answers, extend it further than the other
/// detail levels do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationConfig {
    pub base: u32,
    pub base_quick: u32,
    pub extended: u32,
    pub extended_quick: u32,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            base: 3,
            base_quick: 1,
            extended: 7,
            extended_quick: 9,
        }
    }
}

impl IterationConfig {
    pub fn base_iterations(&self, detail: ScanDetail) -> u32 {
        if detail.is_at_least(ScanDetail::Normal) {
            self.base
        } else {
            self.base_quick
        }
    }

    pub fn extended_iterations(&self, detail: ScanDetail) -> u32 {
        if detail.is_at_least(ScanDetail::Normal) {
            self.extended
        } else {
            self.extended_quick
        }
    }
}

/// Timeout parameters passed through to the measurement executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Fixed timeout below `DETAILED`.
    pub short_ms: u32,
    /// Timeout at `DETAILED` and `ALL`, combined with increasing-timeout mode.
    pub long_ms: u32,
    /// Timeout for master-secret probes, which always increase on retry.
    pub master_secret_ms: u32,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            short_ms: 50,
            long_ms: 1000,
            master_secret_ms: 4000,
        }
    }
}

/// The timeout a single measurement request runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    pub timeout_ms: u32,
    /// Retry a borderline measurement with a larger timeout window.
    pub increasing_timeout: bool,
}

impl TimeoutConfig {
    pub fn policy(&self, probe: ProbeKind, detail: ScanDetail) -> TimeoutPolicy {
        if probe == ProbeKind::MasterSecret {
            return TimeoutPolicy {
                timeout_ms: self.master_secret_ms,
                increasing_timeout: true,
            };
        }
        if detail.is_at_least(ScanDetail::Detailed) {
            TimeoutPolicy {
                timeout_ms: self.long_ms,
                increasing_timeout: true,
            }
        } else {
            TimeoutPolicy {
                timeout_ms: self.short_ms,
                increasing_timeout: false,
            }
        }
    }
}

/// Extra conditions a configuration must meet before it is called significant.
///
/// Distinct, stable and error-free answers are always required; the rule can
/// additionally demand a minimum number of confirming re-runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignificanceRule {
    pub minimum_confirming_runs: usize,
}

/// Full scanner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub scan_detail: ScanDetail,
    /// Maximum number of configurations measured concurrently.
    pub parallelism: usize,
    pub iterations: IterationConfig,
    pub timeouts: TimeoutConfig,
    pub significance: SignificanceRule,
    /// Attach raw response maps to reports. `None` attaches them from
    /// `DETAILED` upwards.
    pub include_response_maps: Option<bool>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_detail: ScanDetail::default(),
            parallelism: DEFAULT_PARALLELISM,
            iterations: IterationConfig::default(),
            timeouts: TimeoutConfig::default(),
            significance: SignificanceRule::default(),
            include_response_maps: None,
        }
    }
}

/// Errors from validating a [`ScannerConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("parallelism must be at least 1")]
    ZeroParallelism,

    #[error("iteration count '{field}' must be at least 1")]
    ZeroIterations { field: &'static str },

    #[error("timeout '{field}' must be at least 1 ms")]
    ZeroTimeout { field: &'static str },
}

impl ScannerConfig {
    pub fn new(scan_detail: ScanDetail) -> Self {
        Self {
            scan_detail,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    #[must_use]
    pub fn with_iterations(mut self, iterations: IterationConfig) -> Self {
        self.iterations = iterations;
        self
    }

    #[must_use]
    pub fn with_significance(mut self, significance: SignificanceRule) -> Self {
        self.significance = significance;
        self
    }

    pub fn base_iterations(&self) -> u32 {
        self.iterations.base_iterations(self.scan_detail)
    }

    pub fn extended_iterations(&self) -> u32 {
        self.iterations.extended_iterations(self.scan_detail)
    }

    pub fn timeout_policy(&self, probe: ProbeKind) -> TimeoutPolicy {
        self.timeouts.policy(probe, self.scan_detail)
    }

    pub fn includes_response_maps(&self) -> bool {
        self.include_response_maps
            .unwrap_or_else(|| self.scan_detail.is_at_least(ScanDetail::Detailed))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::ZeroParallelism);
        }
        let iterations = [
            ("base", self.iterations.base),
            ("base_quick", self.iterations.base_quick),
            ("extended", self.iterations.extended),
            ("extended_quick", self.iterations.extended_quick),
        ];
        if let Some((field, _)) = iterations.iter().find(|(_, count)| *count == 0) {
            return Err(ConfigError::ZeroIterations { field: *field });
        }
        let timeouts = [
            ("short_ms", self.timeouts.short_ms),
            ("long_ms", self.timeouts.long_ms),
            ("master_secret_ms", self.timeouts.master_secret_ms),
        ];
        if let Some((field, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::ZeroTimeout { field: *field });
        }
        Ok(())
    }
}
