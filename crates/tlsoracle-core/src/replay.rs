//! Offline measurement replay.
//!
//! A [`Transcript`] captures the target capabilities plus, per test
//! configuration, the vector sequence and the measurement runs a live
//! executor produced. [`ReplayExecutor`] serves those runs back to the
//! scanner in recorded order, so a scan can be re-analysed without network
//! access. Requests beyond the recorded runs, or for configurations never
//! recorded, fail with [`MeasurementFailure::Unavailable`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fingerprint::{ResponseMap, Vector};
use crate::scanner::{MeasurementExecutor, MeasurementFailure, MeasurementRequest};
use crate::vector::{TargetCapabilities, TestConfiguration};

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to read transcript {path:?}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("Invalid transcript: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
        path: Option<PathBuf>,
    },

    #[error("Failed to serialize transcript: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Configuration {configuration} is recorded more than once")]
    DuplicateConfiguration { configuration: String },
}

/// Failure category of a recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedFailureKind {
    Timeout,
    ConnectionReset,
    Io,
    MalformedResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedFailure {
    pub failure: RecordedFailureKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

impl From<&RecordedFailure> for MeasurementFailure {
    fn from(recorded: &RecordedFailure) -> Self {
        match recorded.failure {
            RecordedFailureKind::Timeout => MeasurementFailure::Timeout,
            RecordedFailureKind::ConnectionReset => MeasurementFailure::ConnectionReset,
            RecordedFailureKind::Io => MeasurementFailure::Io(recorded.detail.clone()),
            RecordedFailureKind::MalformedResponse => {
                MeasurementFailure::MalformedResponse(recorded.detail.clone())
            }
        }
    }
}

/// One recorded run: either a response map or the failure that replaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordedRun {
    Map(ResponseMap),
    Failure(RecordedFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedConfiguration {
    pub configuration: TestConfiguration,
    pub vectors: Vec<Vector>,
    #[serde(default)]
    pub runs: Vec<RecordedRun>,
}

/// Captured measurements for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub capabilities: TargetCapabilities,
    #[serde(default)]
    pub configurations: Vec<RecordedConfiguration>,
}

impl Transcript {
    pub fn new(capabilities: TargetCapabilities) -> Self {
        Self {
            capabilities,
            configurations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_configuration(
        mut self,
        configuration: TestConfiguration,
        vectors: Vec<Vector>,
        runs: impl IntoIterator<Item = RecordedRun>,
    ) -> Self {
        self.configurations.push(RecordedConfiguration {
            configuration,
            vectors,
            runs: runs.into_iter().collect(),
        });
        self
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ReplayError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        serde_json::from_str(&json).map_err(|source| ReplayError::Parse {
            source,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, ReplayError> {
        serde_json::to_string_pretty(self).map_err(ReplayError::Serialize)
    }
}

struct Recording {
    vectors: Vec<Vector>,
    runs: Vec<RecordedRun>,
}

/// Serves recorded runs back in order, per configuration.
pub struct ReplayExecutor {
    capabilities: TargetCapabilities,
    recordings: HashMap<TestConfiguration, Recording>,
    cursors: Mutex<HashMap<TestConfiguration, usize>>,
}

impl ReplayExecutor {
    pub fn new(transcript: Transcript) -> Result<Self, ReplayError> {
        let mut recordings = HashMap::with_capacity(transcript.configurations.len());
        for recorded in transcript.configurations {
            let configuration = recorded.configuration;
            if recordings.contains_key(&configuration) {
                return Err(ReplayError::DuplicateConfiguration {
                    configuration: configuration.to_string(),
                });
            }
            recordings.insert(
                configuration,
                Recording {
                    vectors: recorded.vectors,
                    runs: recorded.runs,
                },
            );
        }
        debug!(configurations = recordings.len(), "Loaded replay transcript");
        Ok(Self {
            capabilities: transcript.capabilities,
            recordings,
            cursors: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        Self::new(Transcript::from_path(path)?)
    }

    /// Capabilities recorded alongside the measurements.
    pub fn capabilities(&self) -> &TargetCapabilities {
        &self.capabilities
    }

    /// Runs not yet served for `configuration`.
    pub fn remaining_runs(&self, configuration: &TestConfiguration) -> usize {
        let served = self.cursors.lock().get(configuration).copied().unwrap_or(0);
        self.recordings
            .get(configuration)
            .map_or(0, |recording| recording.runs.len().saturating_sub(served))
    }
}

impl MeasurementExecutor for ReplayExecutor {
    fn vector_sequence(&self, configuration: &TestConfiguration) -> Vec<Vector> {
        self.recordings
            .get(configuration)
            .map(|recording| recording.vectors.clone())
            .unwrap_or_default()
    }

    fn execute(
        &self,
        request: &MeasurementRequest<'_>,
    ) -> Vec<Result<ResponseMap, MeasurementFailure>> {
        let iterations = request.iterations as usize;
        let Some(recording) = self.recordings.get(request.configuration) else {
            warn!(configuration = %request.configuration, "Configuration not recorded in transcript");
            return (0..iterations)
                .map(|_| {
                    Err(MeasurementFailure::Unavailable(format!(
                        "configuration {} not recorded",
                        request.configuration
                    )))
                })
                .collect();
        };

        let remaining = self.remaining_runs(request.configuration);
        if iterations > remaining {
            warn!(
                configuration = %request.configuration,
                requested = iterations,
                remaining,
                "Request runs past the end of the transcript"
            );
        }

        let start = {
            let mut cursors = self.cursors.lock();
            let cursor = cursors.entry(request.configuration.clone()).or_insert(0);
            let start = *cursor;
            *cursor += iterations;
            start
        };

        (start..start + iterations)
            .map(|index| match recording.runs.get(index) {
                Some(RecordedRun::Map(map)) => Ok(map.clone()),
                Some(RecordedRun::Failure(failure)) => Err(failure.into()),
                None => Err(MeasurementFailure::Unavailable(format!(
                    "transcript holds {} runs, run {index} requested",
                    recording.runs.len()
                ))),
            })
            .collect()
    }
}
