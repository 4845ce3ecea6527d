//! Error types for the oracle scanner
//!
//! This module re-exports all error types and their context structures.

pub use crate::config::{ConfigError, ParseScanDetailError};
pub use crate::leak::{LeakTestError, MeasurementContext};
pub use crate::replay::ReplayError;
pub use crate::scanner::{MeasurementFailure, ScanError};
pub use crate::vector::ParseProbeKindError;
