//! Bounded-concurrency job scheduler.
//!
//! A fixed set of worker threads pulls test ids from a shared cursor over
//! the catalog slice, so at most `concurrency` driver processes are alive at
//! any instant. Completion callbacks fire in finish order, from worker
//! threads; callers synchronize internally (the aggregator holds the one
//! mutex in the core). With a single worker the cursor degenerates to plain
//! catalog-order iteration.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use tracing::warn;

use crate::executor::{JobContext, TestExecutor};
use crate::results::{ResultRecord, TestId};

/// Run every test in `tests` through `executor`, at most `concurrency` at a
/// time, invoking `on_complete` exactly once per test as each job finishes.
///
/// Executor errors are contained here: they become DEAD records and the run
/// continues. Nothing is returned; all output flows through the callback.
pub fn run<E, F>(
    tests: &[TestId],
    concurrency: usize,
    executor: &E,
    ctx: &JobContext<'_>,
    on_complete: &F,
) where
    E: TestExecutor + ?Sized,
    F: Fn(ResultRecord) + Sync,
{
    if tests.is_empty() {
        return;
    }
    let workers = concurrency.max(1).min(tests.len());
    let cursor = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let index = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(test) = tests.get(index) else { break };
                let record = match executor.execute(test, ctx) {
                    Ok(record) => record,
                    Err(error) => {
                        warn!("job_execution_error test={test} error={error}");
                        ResultRecord::dead(test, error.to_string())
                    }
                };
                on_complete(record);
            });
        }
    });
}
