//! The measurement executor seam.
//!
//! The scanner never talks to a network itself. Whatever performs the TLS
//! handshakes (a live stack, a replayed transcript, a scripted test double)
//! implements [`MeasurementExecutor`].

use thiserror::Error;

use crate::fingerprint::{ResponseMap, Vector};
use crate::vector::TestConfiguration;

/// One request for `iterations` measurement runs of a configuration.
#[derive(Debug, Clone, Copy)]
pub struct MeasurementRequest<'a> {
    pub configuration: &'a TestConfiguration,
    pub vectors: &'a [Vector],
    pub iterations: u32,
    pub timeout_ms: u32,
    pub increasing_timeout: bool,
}

/// Why a whole measurement run failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeasurementFailure {
    #[error("measurement timed out")]
    Timeout,

    #[error("connection reset by peer")]
    ConnectionReset,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// No measurement can be produced for this request at all.
    #[error("measurement unavailable: {0}")]
    Unavailable(String),
}

/// Performs measurement runs on behalf of the scanner.
///
/// Implementations are shared across the scanner's worker threads.
pub trait MeasurementExecutor: Send + Sync {
    /// The ordered vector sequence for a configuration. Must return the same
    /// sequence every time it is asked about the same configuration.
    fn vector_sequence(&self, configuration: &TestConfiguration) -> Vec<Vector>;

    /// Run the request's vectors `request.iterations` times, returning exactly
    /// one entry per iteration in execution order.
    fn execute(&self, request: &MeasurementRequest<'_>)
    -> Vec<Result<ResponseMap, MeasurementFailure>>;
}

impl<E: MeasurementExecutor + ?Sized> MeasurementExecutor for std::sync::Arc<E> {
    fn vector_sequence(&self, configuration: &TestConfiguration) -> Vec<Vector> {
        (**self).vector_sequence(configuration)
    }

    fn execute(
        &self,
        request: &MeasurementRequest<'_>,
    ) -> Vec<Result<ResponseMap, MeasurementFailure>> {
        (**self).execute(request)
    }
}
