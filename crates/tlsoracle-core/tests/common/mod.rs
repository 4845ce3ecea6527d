//! Shared helpers for scanner integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use std::collections::HashMap;

use tlsoracle_core::fingerprint::{Alert, AlertDescription, MessageType};
use tlsoracle_core::protocol::ProtocolVersion;
use tlsoracle_core::{
    MeasurementExecutor, MeasurementFailure, MeasurementRequest, ResponseFingerprint,
    ResponseMap, TargetCapabilities, TestConfiguration, Vector, VectorId,
};

pub type Outcome = Result<ResponseMap, MeasurementFailure>;
type Script = dyn Fn(&TestConfiguration, usize, &[Vector]) -> Outcome + Send + Sync;

/// A request as the executor saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedRequest {
    pub configuration: TestConfiguration,
    pub iterations: u32,
    pub timeout_ms: u32,
    pub increasing_timeout: bool,
}

/// In-memory executor driven by a closure `(configuration, run index, vectors) -> run`.
pub struct ScriptedExecutor {
    vectors: Vec<Vector>,
    script: Box<Script>,
    cursors: Mutex<HashMap<TestConfiguration, usize>>,
    requests: Mutex<Vec<LoggedRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
    short_by: usize,
}

impl ScriptedExecutor {
    pub fn new(
        script: impl Fn(&TestConfiguration, usize, &[Vector]) -> Outcome + Send + Sync + 'static,
    ) -> Self {
        Self {
            vectors: padding_vectors(),
            script: Box::new(script),
            cursors: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: Duration::ZERO,
            short_by: 0,
        }
    }

    /// Every run of every configuration answers with `map_fn(vectors)`.
    pub fn constant(map_fn: fn(&[Vector]) -> ResponseMap) -> Self {
        Self::new(move |_, _, vectors| Ok(map_fn(vectors)))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Return this many runs fewer than requested.
    pub fn short_by(mut self, missing: usize) -> Self {
        self.short_by = missing;
        self
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_for(&self, configuration: &TestConfiguration) -> Vec<LoggedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|request| &request.configuration == configuration)
            .cloned()
            .collect()
    }

    pub fn total_runs(&self) -> u32 {
        self.requests.lock().iter().map(|r| r.iterations).sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl MeasurementExecutor for ScriptedExecutor {
    fn vector_sequence(&self, _configuration: &TestConfiguration) -> Vec<Vector> {
        self.vectors.clone()
    }

    fn execute(&self, request: &MeasurementRequest<'_>) -> Vec<Outcome> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.requests.lock().push(LoggedRequest {
            configuration: request.configuration.clone(),
            iterations: request.iterations,
            timeout_ms: request.timeout_ms,
            increasing_timeout: request.increasing_timeout,
        });
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let start = {
            let mut cursors = self.cursors.lock();
            let cursor = cursors.entry(request.configuration.clone()).or_insert(0);
            let start = *cursor;
            *cursor += request.iterations as usize;
            start
        };
        let count = (request.iterations as usize).saturating_sub(self.short_by);
        let results = (start..start + count)
            .map(|run| (self.script)(request.configuration, run, request.vectors))
            .collect();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        results
    }
}

pub fn padding_vectors() -> Vec<Vector> {
    vec![
        Vector::new(0, "valid padding, invalid mac"),
        Vector::new(1, "invalid padding"),
        Vector::new(2, "zero-length padding"),
        Vector::new(3, "maximum padding"),
    ]
}

pub fn bad_record_mac() -> ResponseFingerprint {
    ResponseFingerprint::new(false)
        .with_alert(Alert::fatal(AlertDescription::BadRecordMac))
        .with_messages([MessageType::Alert])
}

pub fn decryption_failed() -> ResponseFingerprint {
    ResponseFingerprint::new(false)
        .with_alert(Alert::fatal(AlertDescription::DecryptionFailed))
        .with_messages([MessageType::Alert])
}

/// Every vector answered with the same fatal alert.
pub fn uniform_map(vectors: &[Vector]) -> ResponseMap {
    ResponseMap::from_pairs(vectors.iter().map(|v| (v.id, Some(bad_record_mac()))))
}

/// Vector 1 answered with a different alert than the rest.
pub fn distinct_map(vectors: &[Vector]) -> ResponseMap {
    ResponseMap::from_pairs(vectors.iter().map(|v| {
        let fp = if v.id == VectorId(1) {
            decryption_failed()
        } else {
            bad_record_mac()
        };
        (v.id, Some(fp))
    }))
}

/// One CBC configuration for the padding-oracle probe.
pub fn single_suite() -> TargetCapabilities {
    TargetCapabilities::default()
        .with_suites(ProtocolVersion::Tls12, ["TLS_RSA_WITH_AES_128_CBC_SHA"])
}

/// Nine CBC configurations for the padding-oracle probe.
pub fn many_suites() -> TargetCapabilities {
    let suites = [
        "TLS_RSA_WITH_AES_128_CBC_SHA",
        "TLS_RSA_WITH_AES_256_CBC_SHA",
        "TLS_DHE_RSA_WITH_AES_128_CBC_SHA",
    ];
    TargetCapabilities::default()
        .with_suites(ProtocolVersion::Tls10, suites)
        .with_suites(ProtocolVersion::Tls11, suites)
        .with_suites(ProtocolVersion::Tls12, suites)
}
