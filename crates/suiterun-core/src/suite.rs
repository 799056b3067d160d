//! Whole-suite run driver.
//!
//! Wires one run end to end: first scheduling pass over the catalog, the
//! conditional serialized retry pass, and metrics persistence. Per-test
//! records are written to the store and printed (when asked) as they
//! complete, from whichever worker finished them.

use std::fs;

use suiterun_error::Result;
use tracing::{info, warn};

use crate::aggregator::{Metrics, ResultAggregator};
use crate::catalog::TestCatalog;
use crate::config::RunConfig;
use crate::executor::{JobContext, TestExecutor};
use crate::results::{Outcome, ResultRecord, ResultStore};
use crate::retry::RetryController;
use crate::scheduler;

/// Run the full suite: first pass, retry pass, metrics.
///
/// Returns the final metrics; `passed + failed + dead + skipped == total`
/// once this returns, with retried tests counted by their final outcome.
pub fn run_suite<E>(
    config: &RunConfig,
    catalog: &TestCatalog,
    executor: &E,
    store: &ResultStore,
) -> Result<Metrics>
where
    E: TestExecutor + ?Sized,
{
    let aggregator = ResultAggregator::new(catalog.len());
    let on_complete = |record: ResultRecord| {
        info!("test_finished test={} outcome={}", record.test, record.outcome);
        if config.view_diffs && record.outcome == Outcome::Fail {
            if let Some(diff) = &record.diff {
                println!("================ {} ================", record.test);
                println!("{diff}");
            }
        }
        if let Err(error) = store.write_record(&record) {
            warn!("record_write_failed test={} error={error}", record.test);
        }
        aggregator.collect(&record);
    };

    info!(
        "first_pass_start tests={} jobs={}",
        catalog.len(),
        config.effective_jobs()
    );
    let ctx = JobContext::first_pass(config, store);
    scheduler::run(
        catalog.tests(),
        config.effective_jobs(),
        executor,
        &ctx,
        &on_complete,
    );

    let mut controller = RetryController::new(config.retry_threshold);
    controller.first_pass_done();
    controller.run_retry_pass(catalog, config, store, executor, &aggregator, &on_complete);

    let metrics = aggregator.snapshot();
    fs::write(
        store.dir().join("metrics.json"),
        serde_json::to_string_pretty(&metrics)?,
    )?;
    info!(
        "suite_complete total={} passed={} failed={} dead={} skipped={}",
        metrics.total, metrics.passed, metrics.failed, metrics.dead, metrics.skipped
    );
    Ok(metrics)
}
