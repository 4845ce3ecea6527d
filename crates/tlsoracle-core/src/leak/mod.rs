//! Per-configuration information leak test.
//!
//! An [`InformationLeakTest`] accumulates measurement runs for one
//! [`TestConfiguration`] and tracks whether the peer answered the vectors
//! differently (`distinct_answers`), whether later runs disagreed with the
//! first one (`shaky`) and whether any measurement failed (`erroneous`).
//! The first run is the reference: its classification is computed once and
//! never revisited.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SignificanceRule;
use crate::fingerprint::{EqualityError, ResponseMap, Vector, VectorId, compare_all, compare_maps};
use crate::vector::TestConfiguration;

/// Probe-level or configuration-level outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeVerdict {
    /// An oracle is present.
    True,
    /// No oracle was found.
    False,
    /// Evidence was contradictory or incomplete.
    Uncertain,
    /// Measurements failed or the probe's preconditions were not met.
    CouldNotTest,
}

impl ProbeVerdict {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeVerdict::True => "TRUE",
            ProbeVerdict::False => "FALSE",
            ProbeVerdict::Uncertain => "UNCERTAIN",
            ProbeVerdict::CouldNotTest => "COULD_NOT_TEST",
        }
    }
}

impl fmt::Display for ProbeVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context attached to leak test errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementContext {
    pub configuration: Option<String>,
    /// Zero-based index of the offending run.
    pub run: Option<usize>,
    pub vector: Option<VectorId>,
}

impl MeasurementContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_configuration(mut self, configuration: &TestConfiguration) -> Self {
        self.configuration = Some(configuration.to_string());
        self
    }

    #[must_use]
    pub fn with_run(mut self, run: usize) -> Self {
        self.run = Some(run);
        self
    }

    #[must_use]
    pub fn with_vector(mut self, vector: VectorId) -> Self {
        self.vector = Some(vector);
        self
    }
}

impl fmt::Display for MeasurementContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(ref configuration) = self.configuration {
            parts.push(format!("configuration {configuration}"));
        }
        if let Some(run) = self.run {
            parts.push(format!("run {run}"));
        }
        if let Some(vector) = self.vector {
            parts.push(format!("vector {vector}"));
        }

        if parts.is_empty() {
            write!(f, "(no context)")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeakTestError {
    /// A run does not cover the test's vector sequence. This is a defect in
    /// the executor, never a property of the target.
    #[error("Inconsistent measurement for {context}: {reason}")]
    InconsistentMeasurement {
        reason: String,
        context: MeasurementContext,
    },

    #[error("Cannot finalize {context}: {required} runs required, {actual} appended")]
    InsufficientRuns {
        required: usize,
        actual: usize,
        context: MeasurementContext,
    },

    #[error("Leak test for {context} is already finalized")]
    AlreadyFinalized { context: MeasurementContext },
}

/// Lifecycle of a leak test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeakTestState {
    New,
    Measured,
    Finalized,
}

/// How an appended run relates to the reference run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunClassification {
    /// The first run of the test.
    Reference,
    /// Same per-vector answers and same internal classification as the reference.
    Confirming,
    /// A resolved per-vector mismatch, or a different internal classification.
    Contradicting,
}

/// Measurement state for one test configuration.
#[derive(Debug, Clone)]
pub struct InformationLeakTest {
    configuration: TestConfiguration,
    vectors: Vec<Vector>,
    vector_ids: Vec<VectorId>,
    maps: Vec<ResponseMap>,
    state: LeakTestState,
    reference_error: Option<EqualityError>,
    distinct_answers: bool,
    shaky: bool,
    erroneous: bool,
    significant: bool,
    confirming_runs: usize,
    verdict: Option<ProbeVerdict>,
}

impl InformationLeakTest {
    pub fn new(configuration: TestConfiguration, vectors: Vec<Vector>) -> Self {
        let vector_ids = vectors.iter().map(|vector| vector.id).collect();
        Self {
            configuration,
            vectors,
            vector_ids,
            maps: Vec::new(),
            state: LeakTestState::New,
            reference_error: None,
            distinct_answers: false,
            shaky: false,
            erroneous: false,
            significant: false,
            confirming_runs: 0,
            verdict: None,
        }
    }

    fn context(&self) -> MeasurementContext {
        MeasurementContext::new().with_configuration(&self.configuration)
    }

    fn check_sequence(&self, map: &ResponseMap) -> Result<(), LeakTestError> {
        if map.matches_sequence(&self.vector_ids) {
            return Ok(());
        }
        let run = self.maps.len();
        let reason = if map.len() == self.vector_ids.len() {
            "vector identities differ from the test's vector sequence".to_string()
        } else {
            format!(
                "expected {} vectors, run carries {}",
                self.vector_ids.len(),
                map.len()
            )
        };
        let mut context = self.context().with_run(run);
        if let Some(id) = map
            .vector_ids()
            .zip(&self.vector_ids)
            .find(|(got, expected)| got != *expected)
            .map(|(got, _)| got)
        {
            context = context.with_vector(id);
        }
        Err(LeakTestError::InconsistentMeasurement { reason, context })
    }

    /// Append one measurement run.
    ///
    /// The first run fixes `reference_error` and `distinct_answers`. Later
    /// runs can only ever set `shaky` and `erroneous`, never clear them.
    pub fn append(&mut self, map: ResponseMap) -> Result<RunClassification, LeakTestError> {
        if self.state == LeakTestState::Finalized {
            return Err(LeakTestError::AlreadyFinalized {
                context: self.context(),
            });
        }
        self.check_sequence(&map)?;

        let map_erroneous = map.is_erroneous();
        if map_erroneous {
            self.erroneous = true;
        }

        let Some(reference) = self.maps.first() else {
            let reference_error = compare_all(&map);
            self.reference_error = Some(reference_error);
            self.distinct_answers = reference_error.is_difference() && !map_erroneous;
            self.maps.push(map);
            self.state = LeakTestState::Measured;
            return Ok(RunClassification::Reference);
        };

        let run_error = compare_all(&map);
        let comparison = compare_maps(reference, &map);
        let classification =
            if !comparison.is_stable() || Some(run_error) != self.reference_error {
                self.shaky = true;
                warn!(
                    configuration = %self.configuration,
                    run = self.maps.len(),
                    mismatched = comparison.mismatched.len(),
                    run_error = %run_error,
                    "Rescan revealed different results"
                );
                RunClassification::Contradicting
            } else {
                self.confirming_runs += 1;
                info!(
                    configuration = %self.configuration,
                    run = self.maps.len(),
                    "Rescan revealed same results"
                );
                RunClassification::Confirming
            };
        self.maps.push(map);
        Ok(classification)
    }

    /// Close the test and compute its verdict.
    ///
    /// Fails if fewer than `minimum_runs` runs (and never fewer than one) were
    /// appended.
    pub fn finalize(
        &mut self,
        minimum_runs: usize,
        rule: &SignificanceRule,
    ) -> Result<ProbeVerdict, LeakTestError> {
        if self.state == LeakTestState::Finalized {
            return Err(LeakTestError::AlreadyFinalized {
                context: self.context(),
            });
        }
        let required = minimum_runs.max(1);
        if self.maps.len() < required {
            return Err(LeakTestError::InsufficientRuns {
                required,
                actual: self.maps.len(),
                context: self.context(),
            });
        }

        let confirmed = self.confirming_runs >= rule.minimum_confirming_runs;
        self.significant = self.distinct_answers && !self.shaky && !self.erroneous && confirmed;

        let verdict = if self.erroneous {
            ProbeVerdict::CouldNotTest
        } else if self.shaky {
            ProbeVerdict::Uncertain
        } else if self.significant {
            ProbeVerdict::True
        } else if self.distinct_answers {
            // Stable distinct answers without the confirmations the rule asks for.
            ProbeVerdict::Uncertain
        } else {
            ProbeVerdict::False
        };

        self.state = LeakTestState::Finalized;
        self.verdict = Some(verdict);
        Ok(verdict)
    }

    pub fn configuration(&self) -> &TestConfiguration {
        &self.configuration
    }

    pub fn vectors(&self) -> &[Vector] {
        &self.vectors
    }

    pub fn state(&self) -> LeakTestState {
        self.state
    }

    /// `None` until the first run is appended.
    pub fn reference_error(&self) -> Option<EqualityError> {
        self.reference_error
    }

    pub fn is_distinct_answers(&self) -> bool {
        self.distinct_answers
    }

    pub fn is_shaky(&self) -> bool {
        self.shaky
    }

    pub fn is_erroneous(&self) -> bool {
        self.erroneous
    }

    /// Only meaningful once finalized.
    pub fn is_significant(&self) -> bool {
        self.significant
    }

    pub fn response_maps(&self) -> &[ResponseMap] {
        &self.maps
    }

    pub fn run_count(&self) -> usize {
        self.maps.len()
    }

    pub fn confirming_runs(&self) -> usize {
        self.confirming_runs
    }

    pub fn verdict(&self) -> Option<ProbeVerdict> {
        self.verdict
    }
}
