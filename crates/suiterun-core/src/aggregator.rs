//! Outcome aggregation and running metrics.
//!
//! The aggregator owns the only mutable state shared between in-flight
//! jobs. `collect` may be called concurrently from completion callbacks, so
//! every update goes through one mutex; everything else in the core is
//! immutable after construction.
//!
//! Collecting a second record for the same test replaces the first; that is
//! how the retry pass overwrites a first-pass FAIL with the retried outcome.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::results::{Outcome, ResultRecord, TestId};

/// Running counters for one suite run.
///
/// `total` is fixed at catalog size before any job starts, so
/// `passed + failed + dead + skipped == total` exactly when every test has
/// reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub dead: usize,
    pub skipped: usize,
}

impl Metrics {
    /// Number of tests that have reported an outcome.
    #[must_use]
    pub const fn accounted(&self) -> usize {
        self.passed + self.failed + self.dead + self.skipped
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.accounted() == self.total
    }
}

/// Thread-safe collector of per-test outcomes.
#[derive(Debug)]
pub struct ResultAggregator {
    total: usize,
    outcomes: Mutex<BTreeMap<TestId, Outcome>>,
}

impl ResultAggregator {
    /// Aggregator for a catalog of `total` tests.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            outcomes: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record one completed job, replacing any earlier outcome for the test.
    pub fn collect(&self, record: &ResultRecord) {
        let previous = self
            .outcomes
            .lock()
            .insert(record.test.clone(), record.outcome);
        if let Some(previous) = previous {
            debug!(
                "outcome_replaced test={} previous={} current={}",
                record.test, previous, record.outcome
            );
        }
    }

    /// Current metrics snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Metrics {
        let outcomes = self.outcomes.lock();
        let mut metrics = Metrics {
            total: self.total,
            ..Metrics::default()
        };
        for outcome in outcomes.values() {
            match outcome {
                Outcome::Pass => metrics.passed += 1,
                Outcome::Fail => metrics.failed += 1,
                Outcome::Dead => metrics.dead += 1,
                Outcome::Skip => metrics.skipped += 1,
            }
        }
        metrics
    }

    /// Ids whose current outcome is FAIL.
    #[must_use]
    pub fn failed_tests(&self) -> BTreeSet<TestId> {
        self.tests_with(Outcome::Fail)
    }

    /// Ids whose current outcome is DEAD.
    #[must_use]
    pub fn dead_tests(&self) -> BTreeSet<TestId> {
        self.tests_with(Outcome::Dead)
    }

    fn tests_with(&self, wanted: Outcome) -> BTreeSet<TestId> {
        self.outcomes
            .lock()
            .iter()
            .filter(|(_, outcome)| **outcome == wanted)
            .map(|(test, _)| test.clone())
            .collect()
    }

    /// Current outcome for a test, if it has reported.
    #[must_use]
    pub fn outcome_of(&self, test: &str) -> Option<Outcome> {
        self.outcomes.lock().get(test).copied()
    }
}
