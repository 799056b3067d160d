//! Per-test outcome records and the on-disk result store.
//!
//! Every completed job produces one [`ResultRecord`], persisted as a JSON
//! file in the run's results directory next to the driver's captured log.
//! The report renderer (and a later run's baseline comparison) reads the
//! records back from disk; nothing downstream depends on in-memory state.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use suiterun_error::{Result, SuiteError};

/// A test is identified by its relative directory path.
pub type TestId = String;

/// Final classification of one test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Driver reported success.
    Pass,
    /// Driver reported a clean functional failure.
    Fail,
    /// Execution itself errored: crash, missing driver, timeout, signal.
    Dead,
    /// Driver declined to run the test for this configuration.
    Skip,
}

impl Outcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Dead => "dead",
            Self::Skip => "skip",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome record for one scheduled execution of one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub test: TestId,
    pub outcome: Outcome,
    /// Driver exit code, when the process ran to completion.
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
    /// snake_case token explaining DEAD/SKIP classifications.
    pub reason: Option<String>,
    /// Driver output attached to failures for the diff report.
    pub diff: Option<String>,
}

impl ResultRecord {
    /// Record for a job whose execution itself errored.
    #[must_use]
    pub fn dead(test: &str, reason: impl Into<String>) -> Self {
        Self {
            test: test.to_owned(),
            outcome: Outcome::Dead,
            exit_code: None,
            elapsed_ms: 0,
            reason: Some(reason.into()),
            diff: None,
        }
    }
}

/// Flatten a test id (a relative path) into a filename-safe stem.
#[must_use]
pub fn safe_file_stem(test: &str) -> String {
    test.chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' => c,
            _ => '_',
        })
        .collect()
}

/// Directory of per-test result records and driver logs.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    /// Create the results directory (and parents) and return a store for it.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_owned(),
        })
    }

    /// Open an existing results directory without touching the filesystem.
    #[must_use]
    pub fn open(dir: &Path) -> Self {
        Self {
            dir: dir.to_owned(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn record_path(&self, test: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_file_stem(test)))
    }

    #[must_use]
    pub fn log_path(&self, test: &str) -> PathBuf {
        self.dir.join(format!("{}.log", safe_file_stem(test)))
    }

    /// Persist one record, replacing any earlier record for the same test.
    pub fn write_record(&self, record: &ResultRecord) -> Result<()> {
        let payload = serde_json::to_string_pretty(record)?;
        fs::write(self.record_path(&record.test), payload)?;
        Ok(())
    }

    /// Load every record in the store, sorted by test id.
    pub fn load_records(&self) -> Result<Vec<ResultRecord>> {
        let mut records = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(error) => return Err(SuiteError::Io(error)),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // metrics.json lives alongside the records but is not one.
            if path.file_name().and_then(|n| n.to_str()) == Some("metrics.json") {
                continue;
            }
            let text = fs::read_to_string(&path)?;
            records.push(serde_json::from_str(&text)?);
        }
        records.sort_by(|a, b| a.test.cmp(&b.test));
        Ok(records)
    }
}
