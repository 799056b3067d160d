//! External driver invocation and outcome classification.
//!
//! The orchestrator never interprets test content. Each job spawns the
//! configured driver program with the test id as its argument, captures
//! stdout+stderr into the per-test log, and classifies the exit status.
//! Everything a driver needs beyond its argument travels in environment
//! variables so the contract stays process-level.
//!
//! Exit-code contract: `0` pass, `1` clean failure, `77` skipped, anything
//! else (or signal death, spawn failure, timeout) dead.

use std::fs::File;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use suiterun_error::{Result, SuiteError};
use tracing::debug;

use crate::config::RunConfig;
use crate::results::{Outcome, ResultRecord, ResultStore};

/// Space-joined discriminant set, exported to every driver.
pub const ENV_DISCRIMINANTS: &str = "SUITERUN_DISCRIMINANTS";
/// Path of the persisted run configuration.
pub const ENV_CONFIG: &str = "SUITERUN_CONFIG";
/// Set (to `1`) during the retry pass: the driver may skip work for tests
/// it already saw pass.
pub const ENV_SKIP_IF_OK: &str = "SUITERUN_SKIP_IF_OK";
/// Set (to `1`) during the retry pass: the driver may skip tests known dead.
pub const ENV_SKIP_IF_DEAD: &str = "SUITERUN_SKIP_IF_DEAD";
pub const ENV_WITH_GDB: &str = "SUITERUN_WITH_GDB";
pub const ENV_WITH_VALGRIND: &str = "SUITERUN_WITH_VALGRIND";
pub const ENV_WITH_GPROF: &str = "SUITERUN_WITH_GPROF";

const PASS_EXIT_CODE: i32 = 0;
const FAIL_EXIT_CODE: i32 = 1;
/// Conventional "skipped" exit code.
const SKIP_EXIT_CODE: i32 = 77;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Per-pass execution context handed to every job.
#[derive(Debug, Clone, Copy)]
pub struct JobContext<'a> {
    pub config: &'a RunConfig,
    pub store: &'a ResultStore,
    pub skip_if_ok: bool,
    pub skip_if_dead: bool,
}

impl<'a> JobContext<'a> {
    /// First-pass context: no skip optimizations.
    #[must_use]
    pub fn first_pass(config: &'a RunConfig, store: &'a ResultStore) -> Self {
        Self {
            config,
            store,
            skip_if_ok: false,
            skip_if_dead: false,
        }
    }

    /// Retry-pass context: both skip optimizations enabled.
    #[must_use]
    pub fn retry_pass(config: &'a RunConfig, store: &'a ResultStore) -> Self {
        Self {
            config,
            store,
            skip_if_ok: true,
            skip_if_dead: true,
        }
    }
}

/// Narrow seam between the scheduler and whatever actually runs a test.
pub trait TestExecutor: Sync {
    /// Run one test to completion and classify it.
    ///
    /// # Errors
    ///
    /// An error means the execution machinery itself failed; the scheduler
    /// maps it to a DEAD record and the run continues.
    fn execute(&self, test: &str, ctx: &JobContext<'_>) -> Result<ResultRecord>;
}

/// Default process-backed executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl TestExecutor for ProcessExecutor {
    fn execute(&self, test: &str, ctx: &JobContext<'_>) -> Result<ResultRecord> {
        let log_path = ctx.store.log_path(test);
        let mut child = spawn_driver(test, ctx, &log_path)?;
        let status = wait_for_exit(&mut child, ctx.config.timeout_secs, test)?;

        let (outcome, reason) = classify_exit(status.timed_out, status.exit_code);
        let diff = if outcome == Outcome::Fail {
            std::fs::read_to_string(&log_path).ok().filter(|s| !s.is_empty())
        } else {
            None
        };

        debug!(
            "job_finished test={test} outcome={} elapsed_ms={}",
            outcome, status.elapsed_ms
        );
        Ok(ResultRecord {
            test: test.to_owned(),
            outcome,
            exit_code: status.exit_code,
            elapsed_ms: status.elapsed_ms,
            reason,
            diff,
        })
    }
}

fn spawn_driver(test: &str, ctx: &JobContext<'_>, log_path: &Path) -> Result<Child> {
    let stdout_file = File::create(log_path)
        .map_err(|error| SuiteError::job_execution(test, format!("log_create_failed error={error}")))?;
    let stderr_file = stdout_file
        .try_clone()
        .map_err(|error| SuiteError::job_execution(test, format!("log_clone_failed error={error}")))?;

    let config = ctx.config;
    let mut command = Command::new(config.driver_command());
    command
        .arg(test)
        .current_dir(&config.root)
        .env(ENV_DISCRIMINANTS, config.discriminants.join(" "))
        .env(ENV_CONFIG, &config.config_file)
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file));
    if ctx.skip_if_ok {
        command.env(ENV_SKIP_IF_OK, "1");
    }
    if ctx.skip_if_dead {
        command.env(ENV_SKIP_IF_DEAD, "1");
    }
    if config.with_gdb {
        command.env(ENV_WITH_GDB, "1");
    }
    if config.with_valgrind {
        command.env(ENV_WITH_VALGRIND, "1");
    }
    if config.with_gprof {
        command.env(ENV_WITH_GPROF, "1");
    }

    command.spawn().map_err(|error| {
        if error.kind() == std::io::ErrorKind::NotFound {
            SuiteError::job_execution(test, "driver_not_found")
        } else {
            SuiteError::job_execution(test, format!("driver_spawn_failed error={error}"))
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProcessStatus {
    exit_code: Option<i32>,
    timed_out: bool,
    elapsed_ms: u64,
}

/// Poll the child until exit or the timeout budget elapses (then kill).
///
/// `timeout_secs == 0` disables the budget; a hung driver then stalls this
/// pool slot, which is the documented trade-off.
fn wait_for_exit(child: &mut Child, timeout_secs: u64, test: &str) -> Result<ProcessStatus> {
    let started_at = Instant::now();
    let deadline = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                return Ok(ProcessStatus {
                    exit_code: status.code(),
                    timed_out: false,
                    elapsed_ms: elapsed_ms(started_at),
                });
            }
            Ok(None) => {
                if let Some(deadline) = deadline {
                    if started_at.elapsed() >= deadline {
                        let _ = child.kill();
                        let status = child.wait().map_err(|error| {
                            SuiteError::job_execution(
                                test,
                                format!("wait_after_kill_failed error={error}"),
                            )
                        })?;
                        return Ok(ProcessStatus {
                            exit_code: status.code(),
                            timed_out: true,
                            elapsed_ms: elapsed_ms(started_at),
                        });
                    }
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(error) => {
                return Err(SuiteError::job_execution(
                    test,
                    format!("try_wait_failed error={error}"),
                ));
            }
        }
    }
}

fn elapsed_ms(started_at: Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Map a process exit status to an outcome and an optional reason token.
fn classify_exit(timed_out: bool, exit_code: Option<i32>) -> (Outcome, Option<String>) {
    if timed_out {
        return (Outcome::Dead, Some("timeout_exceeded".to_owned()));
    }
    match exit_code {
        Some(PASS_EXIT_CODE) => (Outcome::Pass, None),
        Some(FAIL_EXIT_CODE) => (Outcome::Fail, None),
        Some(SKIP_EXIT_CODE) => (Outcome::Skip, Some("driver_skipped".to_owned())),
        Some(code) => (
            Outcome::Dead,
            Some(format!("unexpected_exit_code code={code}")),
        ),
        None => (Outcome::Dead, Some("killed_by_signal".to_owned())),
    }
}
