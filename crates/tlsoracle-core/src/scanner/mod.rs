//! The adaptive two-phase oracle scanner.
//!
//! For one probe kind the scanner:
//!
//! 1. enumerates the test configurations the target is eligible for,
//! 2. runs a base pass over every configuration, one run at a time, stopping
//!    a configuration early when its first run shows uniform answers,
//! 3. spends the extended budget only on configurations that answered
//!    differently (or on all of them at high scan detail),
//! 4. finalizes each configuration and reduces the verdicts to one.
//!
//! Configurations are measured concurrently on a dedicated rayon pool sized to
//! the configured worker budget. Runs of a single configuration are always
//! sequential and appended in request order.

pub mod executor;
pub mod stats;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, ScanDetail, ScannerConfig, TimeoutPolicy};
use crate::fingerprint::{EqualityError, ResponseMap, Vector};
use crate::leak::{InformationLeakTest, LeakTestError, MeasurementContext, ProbeVerdict};
use crate::vector::{ProbeKind, TargetCapabilities, TestConfiguration, enumerate};

pub use executor::{MeasurementExecutor, MeasurementFailure, MeasurementRequest};
pub use stats::{ScanStats, ScanStatsSnapshot};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid scanner configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Leak(#[from] LeakTestError),

    /// The executor returned a different number of runs than requested.
    #[error("Executor returned {actual} runs for {context}, {expected} requested")]
    RunCountMismatch {
        expected: usize,
        actual: usize,
        context: MeasurementContext,
    },

    #[error("Failed to build measurement worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result of scanning one probe kind.
#[derive(Debug)]
pub struct ProbeOutcome {
    pub probe: ProbeKind,
    pub scan_detail: ScanDetail,
    pub verdict: ProbeVerdict,
    /// Finalized tests in enumeration order.
    pub tests: Vec<InformationLeakTest>,
    pub stats: ScanStatsSnapshot,
}

impl ProbeOutcome {
    pub fn significant_tests(&self) -> impl Iterator<Item = &InformationLeakTest> {
        self.tests.iter().filter(|test| test.is_significant())
    }

    pub fn verdict_counts(&self) -> VerdictCounts {
        let mut counts = VerdictCounts::default();
        for verdict in self.tests.iter().filter_map(InformationLeakTest::verdict) {
            match verdict {
                ProbeVerdict::True => counts.positive += 1,
                ProbeVerdict::False => counts.negative += 1,
                ProbeVerdict::Uncertain => counts.uncertain += 1,
                ProbeVerdict::CouldNotTest => counts.could_not_test += 1,
            }
        }
        counts
    }
}

/// Per-verdict tally over a probe's configurations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerdictCounts {
    /// Configurations with a `TRUE` verdict.
    pub positive: usize,
    /// Configurations with a `FALSE` verdict.
    pub negative: usize,
    pub uncertain: usize,
    pub could_not_test: usize,
}

/// Reduce per-configuration verdicts to one probe verdict.
///
/// Any `True` wins. Otherwise any `Uncertain` gives `Uncertain`. Configurations
/// that could not be tested only yield `CouldNotTest` when nothing else was
/// tested; mixed with `False` they make the probe `Uncertain`, since an
/// untested configuration might be the one that leaks. No verdicts at all is
/// `CouldNotTest`.
pub fn reduce_verdicts(verdicts: impl IntoIterator<Item = ProbeVerdict>) -> ProbeVerdict {
    let (mut any_false, mut any_uncertain, mut any_untested) = (false, false, false);
    for verdict in verdicts {
        match verdict {
            ProbeVerdict::True => return ProbeVerdict::True,
            ProbeVerdict::False => any_false = true,
            ProbeVerdict::Uncertain => any_uncertain = true,
            ProbeVerdict::CouldNotTest => any_untested = true,
        }
    }
    if any_uncertain || (any_untested && any_false) {
        ProbeVerdict::Uncertain
    } else if any_false {
        ProbeVerdict::False
    } else {
        ProbeVerdict::CouldNotTest
    }
}

/// Drives the enumerate, base pass, extended pass, reduce loop for a probe.
pub struct AdaptiveOracleScanner<E> {
    config: ScannerConfig,
    executor: E,
    pool: rayon::ThreadPool,
}

impl<E: MeasurementExecutor> AdaptiveOracleScanner<E> {
    /// Validate `config` and set up the worker pool.
    pub fn new(config: ScannerConfig, executor: E) -> Result<Self, ScanError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallelism)
            .thread_name(|index| format!("tlsoracle-measure-{index}"))
            .build()?;
        Ok(Self {
            config,
            executor,
            pool,
        })
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Scan the target for one oracle family.
    #[instrument(skip(self, capabilities), fields(detail = %self.config.scan_detail))]
    pub fn scan(
        &self,
        probe: ProbeKind,
        capabilities: &TargetCapabilities,
    ) -> Result<ProbeOutcome, ScanError> {
        let detail = self.config.scan_detail;
        let stats = ScanStats::new();

        let configurations = enumerate(capabilities, detail, probe);
        stats.record_configurations(configurations.len());
        if configurations.is_empty() {
            info!(probe = %probe, "No eligible configurations, probe could not be tested");
            return Ok(ProbeOutcome {
                probe,
                scan_detail: detail,
                verdict: ProbeVerdict::CouldNotTest,
                tests: Vec::new(),
                stats: stats.snapshot(),
            });
        }

        let policy = self.config.timeout_policy(probe);

        debug!(count = configurations.len(), "Starting base pass");
        let mut tests = self.pool.install(|| {
            configurations
                .into_par_iter()
                .map(|configuration| self.base_pass(configuration, policy, &stats))
                .collect::<Result<Vec<_>, ScanError>>()
        })?;

        let any_distinct = tests.iter().any(InformationLeakTest::is_distinct_answers);
        if any_distinct || detail.is_at_least(ScanDetail::Normal) {
            let extend_all = detail.is_at_least(ScanDetail::Detailed);
            debug!(any_distinct, extend_all, "Starting extended pass");
            self.pool.install(|| {
                tests
                    .par_iter_mut()
                    .filter(|test| extend_all || test.is_distinct_answers())
                    .try_for_each(|test| self.extended_pass(test, policy, &stats))
            })?;
        } else {
            debug!("Skipping extended pass");
        }

        let significance = self.config.significance;
        let mut verdicts = Vec::with_capacity(tests.len());
        for test in &mut tests {
            let runs = test.run_count();
            verdicts.push(test.finalize(runs, &significance)?);
        }
        let verdict = reduce_verdicts(verdicts);

        let stats = stats.snapshot();
        info!(
            probe = %probe,
            verdict = %verdict,
            configurations = tests.len(),
            runs = stats.runs_requested(),
            "Probe finished"
        );
        Ok(ProbeOutcome {
            probe,
            scan_detail: detail,
            verdict,
            tests,
            stats,
        })
    }

    /// Request `iterations` runs and check the executor kept its contract.
    fn measure(
        &self,
        configuration: &TestConfiguration,
        vectors: &[Vector],
        iterations: u32,
        policy: TimeoutPolicy,
        stats: &ScanStats,
    ) -> Result<Vec<ResponseMap>, ScanError> {
        let request = MeasurementRequest {
            configuration,
            vectors,
            iterations,
            timeout_ms: policy.timeout_ms,
            increasing_timeout: policy.increasing_timeout,
        };
        let results = self.executor.execute(&request);
        let expected = iterations as usize;
        if results.len() != expected {
            return Err(ScanError::RunCountMismatch {
                expected,
                actual: results.len(),
                context: MeasurementContext::new().with_configuration(configuration),
            });
        }

        Ok(results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|failure| {
                    stats.record_failure();
                    warn!(
                        configuration = %configuration,
                        error = %failure,
                        "Measurement failed, recording run as absent"
                    );
                    ResponseMap::absent(vectors)
                })
            })
            .collect())
    }

    fn base_pass(
        &self,
        configuration: TestConfiguration,
        policy: TimeoutPolicy,
        stats: &ScanStats,
    ) -> Result<InformationLeakTest, ScanError> {
        let vectors = self.executor.vector_sequence(&configuration);
        let mut test = InformationLeakTest::new(configuration, vectors);
        let vectors = test.vectors().to_vec();

        for run in 0..self.config.base_iterations() {
            let maps = self.measure(test.configuration(), &vectors, 1, policy, stats)?;
            stats.record_base_runs(1);
            for map in maps {
                test.append(map)?;
            }
            if run == 0 && test.reference_error() == Some(EqualityError::None) {
                stats.record_early_exit();
                debug!(
                    configuration = %test.configuration(),
                    "Uniform answers on first run, skipping remaining base runs"
                );
                break;
            }
        }
        Ok(test)
    }

    fn extended_pass(
        &self,
        test: &mut InformationLeakTest,
        policy: TimeoutPolicy,
        stats: &ScanStats,
    ) -> Result<(), ScanError> {
        let iterations = self.config.extended_iterations();
        debug!(
            configuration = %test.configuration(),
            iterations,
            distinct = test.is_distinct_answers(),
            "Extending measurement"
        );
        let vectors = test.vectors().to_vec();
        let maps = self.measure(test.configuration(), &vectors, iterations, policy, stats)?;
        stats.record_extended_runs(u64::from(iterations));
        stats.record_extended_configuration();
        for map in maps {
            test.append(map)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_any_true_wins() {
        assert_eq!(
            reduce_verdicts([
                ProbeVerdict::False,
                ProbeVerdict::CouldNotTest,
                ProbeVerdict::Uncertain,
                ProbeVerdict::True
            ]),
            ProbeVerdict::True
        );
    }

    #[test]
    fn test_reduce_uncertain_over_false() {
        assert_eq!(
            reduce_verdicts([ProbeVerdict::False, ProbeVerdict::Uncertain]),
            ProbeVerdict::Uncertain
        );
    }

    #[test]
    fn test_reduce_untested_mixed_with_false_is_uncertain() {
        assert_eq!(
            reduce_verdicts([ProbeVerdict::False, ProbeVerdict::CouldNotTest]),
            ProbeVerdict::Uncertain
        );
        assert_eq!(
            reduce_verdicts([ProbeVerdict::CouldNotTest, ProbeVerdict::CouldNotTest]),
            ProbeVerdict::CouldNotTest
        );
    }

    #[test]
    fn test_reduce_all_false() {
        assert_eq!(
            reduce_verdicts([ProbeVerdict::False, ProbeVerdict::False]),
            ProbeVerdict::False
        );
    }

    #[test]
    fn test_reduce_empty_is_could_not_test() {
        assert_eq!(reduce_verdicts(Vec::new()), ProbeVerdict::CouldNotTest);
    }
}
