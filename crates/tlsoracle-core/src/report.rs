//! Serializable probe reports.

use serde::Serialize;

use crate::config::ScanDetail;
use crate::fingerprint::{EqualityError, ResponseMap, Vector};
use crate::leak::{InformationLeakTest, ProbeVerdict};
use crate::scanner::{ProbeOutcome, ScanStatsSnapshot, VerdictCounts};
use crate::vector::{ProbeKind, TestConfiguration};

/// Report row for one test configuration.
#[derive(Debug, Clone, Serialize)]
pub struct LeakTestReport {
    pub configuration: TestConfiguration,
    pub verdict: Option<ProbeVerdict>,
    pub reference_error: Option<EqualityError>,
    pub distinct_answers: bool,
    pub shaky: bool,
    pub erroneous: bool,
    pub significant: bool,
    pub runs: usize,
    pub confirming_runs: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vectors: Option<Vec<Vector>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_maps: Option<Vec<ResponseMap>>,
}

impl LeakTestReport {
    pub fn from_test(test: &InformationLeakTest, include_maps: bool) -> Self {
        Self {
            configuration: test.configuration().clone(),
            verdict: test.verdict(),
            reference_error: test.reference_error(),
            distinct_answers: test.is_distinct_answers(),
            shaky: test.is_shaky(),
            erroneous: test.is_erroneous(),
            significant: test.is_significant(),
            runs: test.run_count(),
            confirming_runs: test.confirming_runs(),
            vectors: include_maps.then(|| test.vectors().to_vec()),
            response_maps: include_maps.then(|| test.response_maps().to_vec()),
        }
    }

    /// `(vector name, rendered fingerprint)` for the reference run, if maps are attached.
    pub fn reference_rows(&self) -> Vec<(String, String)> {
        let (Some(vectors), Some(maps)) = (&self.vectors, &self.response_maps) else {
            return Vec::new();
        };
        let Some(reference) = maps.first() else {
            return Vec::new();
        };
        vectors
            .iter()
            .map(|vector| {
                let rendered = reference
                    .get(vector.id)
                    .and_then(|response| response.fingerprint.as_ref())
                    .map_or_else(|| "<absent>".to_string(), |fp| fp.to_human_readable());
                (vector.name.clone(), rendered)
            })
            .collect()
    }
}

/// Report for one probe kind.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub probe: ProbeKind,
    pub scan_detail: ScanDetail,
    pub verdict: ProbeVerdict,
    pub counts: VerdictCounts,
    pub stats: ScanStatsSnapshot,
    pub tests: Vec<LeakTestReport>,
}

impl ProbeReport {
    pub fn from_outcome(outcome: &ProbeOutcome, include_maps: bool) -> Self {
        Self {
            probe: outcome.probe,
            scan_detail: outcome.scan_detail,
            verdict: outcome.verdict,
            counts: outcome.verdict_counts(),
            stats: outcome.stats,
            tests: outcome
                .tests
                .iter()
                .map(|test| LeakTestReport::from_test(test, include_maps))
                .collect(),
        }
    }
}
