//! Scan statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters updated by the scanner's worker threads.
///
/// Thread-safe counters using atomic operations for lock-free updates.
#[derive(Debug, Default)]
pub struct ScanStats {
    /// Configurations enumerated for the probe
    pub configurations: AtomicU64,

    /// Measurement runs requested in the base pass
    pub base_runs: AtomicU64,

    /// Measurement runs requested in the extended pass
    pub extended_runs: AtomicU64,

    /// Runs the executor reported as failed
    pub measurement_failures: AtomicU64,

    /// Configurations whose base pass stopped after the first run
    pub early_exits: AtomicU64,

    /// Configurations that received extra runs
    pub extended_configurations: AtomicU64,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_configurations(&self, count: usize) {
        self.configurations.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_base_runs(&self, runs: u64) {
        self.base_runs.fetch_add(runs, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_extended_runs(&self, runs: u64) {
        self.extended_runs.fetch_add(runs, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self) {
        self.measurement_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_early_exit(&self) {
        self.early_exits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_extended_configuration(&self) {
        self.extended_configurations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of the counters
    pub fn snapshot(&self) -> ScanStatsSnapshot {
        ScanStatsSnapshot {
            configurations: self.configurations.load(Ordering::Relaxed),
            base_runs: self.base_runs.load(Ordering::Relaxed),
            extended_runs: self.extended_runs.load(Ordering::Relaxed),
            measurement_failures: self.measurement_failures.load(Ordering::Relaxed),
            early_exits: self.early_exits.load(Ordering::Relaxed),
            extended_configurations: self.extended_configurations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of scan statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatsSnapshot {
    pub configurations: u64,
    pub base_runs: u64,
    pub extended_runs: u64,
    pub measurement_failures: u64,
    pub early_exits: u64,
    pub extended_configurations: u64,
}

impl ScanStatsSnapshot {
    pub fn runs_requested(&self) -> u64 {
        self.base_runs + self.extended_runs
    }

    /// Fraction of requested runs that failed, 0.0 when nothing ran.
    pub fn failure_rate(&self) -> f64 {
        let total = self.runs_requested();
        if total == 0 {
            return 0.0;
        }
        self.measurement_failures as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = ScanStats::new();
        stats.record_configurations(2);
        stats.record_base_runs(3);
        stats.record_base_runs(1);
        stats.record_extended_runs(7);
        stats.record_failure();
        stats.record_early_exit();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.configurations, 2);
        assert_eq!(snapshot.base_runs, 4);
        assert_eq!(snapshot.runs_requested(), 11);
        assert_eq!(snapshot.measurement_failures, 1);
        assert_eq!(snapshot.early_exits, 1);
    }

    #[test]
    fn test_failure_rate_without_runs() {
        assert!(ScanStatsSnapshot::default().failure_rate().abs() < f64::EPSILON);
    }
}
