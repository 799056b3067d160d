//! Threshold-gated serialized retry pass.
//!
//! Failures under parallel execution are often contention artifacts, not
//! regressions. When the first pass finishes with fewer failures than the
//! configured threshold, the failed tests are re-run one at a time, feeding
//! the same aggregator so the final metrics reflect the retried outcomes.
//! At or above the threshold the retry is refused: the run is marked as
//! having blown its failure budget but still produces a report.

use tracing::{error, info, warn};

use crate::aggregator::ResultAggregator;
use crate::catalog::TestCatalog;
use crate::executor::{JobContext, TestExecutor};
use crate::results::{ResultRecord, ResultStore};
use crate::{config::RunConfig, scheduler};

/// Progress of the retry decision for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// First pass not finished yet.
    Initial,
    /// First pass finished, decision pending.
    FirstPassDone,
    /// Retry disabled by configuration (threshold 0).
    NoRetryNeeded,
    /// Serialized second pass completed.
    RetryPassDone,
    /// Failure count reached the threshold; retry refused.
    Aborted,
}

/// Drives the conditional second pass over first-pass failures.
#[derive(Debug)]
pub struct RetryController {
    threshold: usize,
    state: RetryState,
}

impl RetryController {
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            state: RetryState::Initial,
        }
    }

    pub fn first_pass_done(&mut self) {
        if self.state == RetryState::Initial {
            self.state = RetryState::FirstPassDone;
        }
    }

    #[must_use]
    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Decide on and (when eligible) run the serialized retry pass.
    ///
    /// The reduced catalog is the first-pass catalog filtered to the tests
    /// the aggregator currently records as FAIL, in catalog order. The pass
    /// always runs with a single worker and the driver-side skip
    /// optimizations enabled; records flow through the same `on_complete`
    /// as the first pass, overwriting the prior FAIL entries.
    pub fn run_retry_pass<E, F>(
        &mut self,
        catalog: &TestCatalog,
        config: &RunConfig,
        store: &ResultStore,
        executor: &E,
        aggregator: &ResultAggregator,
        on_complete: &F,
    ) where
        E: TestExecutor + ?Sized,
        F: Fn(ResultRecord) + Sync,
    {
        if self.state != RetryState::FirstPassDone {
            return;
        }
        if self.threshold == 0 {
            self.state = RetryState::NoRetryNeeded;
            return;
        }

        let failed_count = aggregator.snapshot().failed;
        if failed_count >= self.threshold {
            error!(
                "too_many_errors failed={failed_count} threshold={}",
                self.threshold
            );
            self.state = RetryState::Aborted;
            return;
        }

        warn!(
            "{failed_count} tests have failed (threshold was {}), retrying serially",
            self.threshold
        );
        let reduced = catalog.retain(&aggregator.failed_tests());
        let ctx = JobContext::retry_pass(config, store);
        scheduler::run(reduced.tests(), 1, executor, &ctx, on_complete);
        info!("retry_pass_done retried={}", reduced.len());
        self.state = RetryState::RetryPassDone;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::Outcome;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use std::path::Path;

    /// Executor that fails the scripted tests once, then passes them.
    struct FlakyExecutor {
        remaining_failures: Mutex<BTreeMap<String, usize>>,
    }

    impl FlakyExecutor {
        fn failing_once(tests: &[&str]) -> Self {
            Self {
                remaining_failures: Mutex::new(
                    tests.iter().map(|t| ((*t).to_owned(), 1)).collect(),
                ),
            }
        }
    }

    impl TestExecutor for FlakyExecutor {
        fn execute(
            &self,
            test: &str,
            _ctx: &JobContext<'_>,
        ) -> suiterun_error::Result<ResultRecord> {
            let mut remaining = self.remaining_failures.lock();
            let outcome = match remaining.get_mut(test) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    Outcome::Fail
                }
                _ => Outcome::Pass,
            };
            Ok(ResultRecord {
                test: test.to_owned(),
                outcome,
                exit_code: Some(i32::from(outcome == Outcome::Fail)),
                elapsed_ms: 1,
                reason: None,
                diff: None,
            })
        }
    }

    fn fixture() -> (RunConfig, ResultStore) {
        let config = RunConfig::new(Path::new("."), Path::new("out"));
        let store = ResultStore::open(Path::new("out/results"));
        (config, store)
    }

    fn first_pass(
        catalog: &TestCatalog,
        executor: &FlakyExecutor,
        config: &RunConfig,
        store: &ResultStore,
        aggregator: &ResultAggregator,
    ) {
        let ctx = JobContext::first_pass(config, store);
        scheduler::run(catalog.tests(), 1, executor, &ctx, &|record| {
            aggregator.collect(&record);
        });
    }

    #[test]
    fn threshold_zero_disables_retry() {
        let (config, store) = fixture();
        let catalog = TestCatalog::from_tests(vec!["a".to_owned()]);
        let executor = FlakyExecutor::failing_once(&["a"]);
        let aggregator = ResultAggregator::new(catalog.len());
        first_pass(&catalog, &executor, &config, &store, &aggregator);

        let mut controller = RetryController::new(0);
        controller.first_pass_done();
        controller.run_retry_pass(&catalog, &config, &store, &executor, &aggregator, &|r| {
            aggregator.collect(&r);
        });

        assert_eq!(controller.state(), RetryState::NoRetryNeeded);
        assert_eq!(aggregator.snapshot().failed, 1, "no retry must have run");
    }

    #[test]
    fn failed_count_at_threshold_aborts() {
        let (config, store) = fixture();
        let catalog =
            TestCatalog::from_tests(vec!["a".to_owned(), "b".to_owned(), "c".to_owned()]);
        let executor = FlakyExecutor::failing_once(&["a", "b"]);
        let aggregator = ResultAggregator::new(catalog.len());
        first_pass(&catalog, &executor, &config, &store, &aggregator);

        // failed == threshold: strict `<` comparison refuses the retry.
        let mut controller = RetryController::new(2);
        controller.first_pass_done();
        controller.run_retry_pass(&catalog, &config, &store, &executor, &aggregator, &|r| {
            aggregator.collect(&r);
        });

        assert_eq!(controller.state(), RetryState::Aborted);
        assert_eq!(aggregator.snapshot().failed, 2);
    }

    #[test]
    fn failed_count_below_threshold_retries_exactly_the_failures() {
        let (config, store) = fixture();
        let catalog =
            TestCatalog::from_tests(vec!["a".to_owned(), "b".to_owned(), "c".to_owned()]);
        let executor = FlakyExecutor::failing_once(&["a", "b"]);
        let aggregator = ResultAggregator::new(catalog.len());
        first_pass(&catalog, &executor, &config, &store, &aggregator);
        assert_eq!(aggregator.snapshot().failed, 2);

        let retried = Mutex::new(Vec::new());
        let mut controller = RetryController::new(5);
        controller.first_pass_done();
        controller.run_retry_pass(&catalog, &config, &store, &executor, &aggregator, &|r| {
            retried.lock().push(r.test.clone());
            aggregator.collect(&r);
        });

        assert_eq!(controller.state(), RetryState::RetryPassDone);
        assert_eq!(retried.into_inner(), vec!["a".to_owned(), "b".to_owned()]);

        let metrics = aggregator.snapshot();
        assert_eq!(metrics.passed, 3);
        assert_eq!(metrics.failed, 0);
        assert!(metrics.is_complete());
    }

    #[test]
    fn failed_count_one_below_threshold_retries() {
        let (config, store) = fixture();
        let catalog = TestCatalog::from_tests(vec!["a".to_owned(), "b".to_owned()]);
        let executor = FlakyExecutor::failing_once(&["a", "b"]);
        let aggregator = ResultAggregator::new(catalog.len());
        first_pass(&catalog, &executor, &config, &store, &aggregator);

        let mut controller = RetryController::new(3);
        controller.first_pass_done();
        controller.run_retry_pass(&catalog, &config, &store, &executor, &aggregator, &|r| {
            aggregator.collect(&r);
        });

        assert_eq!(controller.state(), RetryState::RetryPassDone);
        assert_eq!(aggregator.snapshot().failed, 0);
    }

    #[test]
    fn retry_over_zero_failures_is_a_no_op() {
        let (config, store) = fixture();
        let catalog = TestCatalog::from_tests(vec!["a".to_owned()]);
        let executor = FlakyExecutor::failing_once(&[]);
        let aggregator = ResultAggregator::new(catalog.len());
        first_pass(&catalog, &executor, &config, &store, &aggregator);

        let before = aggregator.snapshot();
        let mut controller = RetryController::new(3);
        controller.first_pass_done();
        controller.run_retry_pass(&catalog, &config, &store, &executor, &aggregator, &|r| {
            aggregator.collect(&r);
        });

        assert_eq!(controller.state(), RetryState::RetryPassDone);
        assert_eq!(aggregator.snapshot(), before);
    }

    #[test]
    fn retry_pass_requires_first_pass_done() {
        let (config, store) = fixture();
        let catalog = TestCatalog::from_tests(vec!["a".to_owned()]);
        let executor = FlakyExecutor::failing_once(&[]);
        let aggregator = ResultAggregator::new(catalog.len());

        let mut controller = RetryController::new(3);
        controller.run_retry_pass(&catalog, &config, &store, &executor, &aggregator, &|_| {});
        assert_eq!(controller.state(), RetryState::Initial);
    }
}
