//! Immutable per-run configuration.
//!
//! Everything the original environment-derived globals carried is collected
//! here once at startup and passed by reference into the catalog, scheduler,
//! and executor. The object is persisted as `config.json` in the output
//! directory so external drivers (and postmortem debugging) can see the
//! exact configuration of a run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use suiterun_error::Result;

use crate::discriminants::DiscriminantSet;

/// Default worker count for the first pass.
pub const DEFAULT_JOBS: usize = 1;
/// Default per-job timeout budget (seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "out";
/// Default external per-test driver, relative to the suite root.
pub const DEFAULT_DRIVER: &str = "run-test";
/// Default tag file generated by the suite's setup step.
pub const DEFAULT_TAG_FILE: &str = "testsuite.tags";

/// Resolved configuration for one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Suite root: driver working directory and discovery root.
    pub root: PathBuf,
    pub output_dir: PathBuf,
    /// Where result records and driver logs land.
    pub results_dir: PathBuf,
    /// Persisted copy of this configuration, exported to drivers.
    pub config_file: PathBuf,
    /// External per-test driver program.
    pub driver: PathBuf,
    /// Entry-point file that marks a directory as a test during discovery.
    pub entry_point: String,
    pub jobs: usize,
    pub timeout_secs: u64,
    /// Absolute failure count below which the serialized retry pass runs;
    /// `0` disables the retry pass entirely.
    pub retry_threshold: usize,
    pub include_sentinel: bool,
    /// Print failing tests' diff payload on stdout as they complete.
    pub view_diffs: bool,
    /// Interactive debugging: forces serial execution.
    pub with_gdb: bool,
    pub with_valgrind: bool,
    pub with_gprof: bool,
    pub discriminants: DiscriminantSet,
}

impl RunConfig {
    /// Configuration with defaults for everything but the two paths.
    #[must_use]
    pub fn new(root: &Path, output_dir: &Path) -> Self {
        Self {
            root: root.to_owned(),
            output_dir: output_dir.to_owned(),
            results_dir: output_dir.join("results"),
            config_file: output_dir.join("config.json"),
            driver: PathBuf::from(DEFAULT_DRIVER),
            entry_point: crate::catalog::DEFAULT_ENTRY_POINT.to_owned(),
            jobs: DEFAULT_JOBS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_threshold: 0,
            include_sentinel: false,
            view_diffs: false,
            with_gdb: false,
            with_valgrind: false,
            with_gprof: false,
            discriminants: DiscriminantSet::default(),
        }
    }

    /// Worker count actually used for the first pass.
    ///
    /// Interactive gdb debugging of a job only makes sense serially, so it
    /// overrides whatever `--jobs` asked for.
    #[must_use]
    pub fn effective_jobs(&self) -> usize {
        if self.with_gdb {
            1
        } else {
            self.jobs.max(1)
        }
    }

    /// Driver program path, absolutized against the suite root.
    ///
    /// `Command::current_dir` + a relative program path resolves
    /// platform-dependently, so the executor always gets an absolute path.
    #[must_use]
    pub fn driver_command(&self) -> PathBuf {
        if self.driver.is_absolute() {
            self.driver.clone()
        } else {
            self.root.join(&self.driver)
        }
    }

    /// Persist the configuration to [`Self::config_file`].
    pub fn persist(&self) -> Result<()> {
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(&self.config_file, payload)?;
        Ok(())
    }

    /// Load a persisted configuration (driver-side and test use).
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
