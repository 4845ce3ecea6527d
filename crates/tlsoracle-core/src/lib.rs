//! Adaptive detection of behavioral response oracles in TLS peers.
//!
//! The crate decides, from repeated noisy measurements, whether a peer answers
//! padding, Bleichenbacher or master-secret vectors distinguishably. It does
//! not speak TLS itself: measurements come from a [`MeasurementExecutor`].

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod leak;
pub mod protocol;
pub mod replay;
pub mod report;
pub mod scanner;
pub mod vector;

pub use config::{ScanDetail, ScannerConfig};
pub use fingerprint::{EqualityError, ResponseFingerprint, ResponseMap, Vector, VectorId};
pub use leak::{InformationLeakTest, ProbeVerdict};
pub use replay::{ReplayExecutor, Transcript};
pub use report::ProbeReport;
pub use scanner::{
    AdaptiveOracleScanner, MeasurementExecutor, MeasurementFailure, MeasurementRequest,
    ProbeOutcome, reduce_verdicts,
};
pub use vector::{ProbeKind, TargetCapabilities, TestConfiguration, enumerate};
