use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for suiterun operations.
///
/// Structured variants for the configuration surface, a catch-all `Io` for
/// filesystem plumbing, and a contained per-job variant that the scheduler
/// maps to a DEAD outcome rather than propagating.
#[derive(Error, Debug)]
pub enum SuiteError {
    // === Configuration errors (fatal, pre-run) ===
    /// The mandatory tag file produced by the setup step is missing.
    #[error("cannot find tag file '{path}': run the testsuite setup step first")]
    TagFileMissing { path: PathBuf },

    /// A test list file was named but cannot be read.
    #[error("cannot read test list '{path}': {detail}")]
    ListFileUnreadable { path: PathBuf, detail: String },

    /// A required makefile-setup fragment is missing or malformed.
    #[error("cannot load makefile setup '{path}': {detail}")]
    MakefileSetup { path: PathBuf, detail: String },

    /// Invalid option combination or value.
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    // === Per-job errors (contained at the job boundary) ===
    /// A single test's driver process could not be executed.
    ///
    /// Never escapes the scheduler; it becomes a DEAD result record.
    #[error("test '{test}' driver execution failed: {detail}")]
    JobExecution { test: String, detail: String },

    // === Plumbing ===
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact (de)serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SuiteError {
    /// Shorthand for an invalid-configuration error.
    pub fn invalid_config(detail: impl Into<String>) -> Self {
        Self::InvalidConfig {
            detail: detail.into(),
        }
    }

    /// Shorthand for a contained job-execution error.
    pub fn job_execution(test: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::JobExecution {
            test: test.into(),
            detail: detail.into(),
        }
    }

    /// Process exit code for a run aborted by this error.
    ///
    /// Configuration errors abort before any test executes; everything that
    /// reaches the job boundary is contained there and never maps to an exit
    /// code directly.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::TagFileMissing { .. }
            | Self::ListFileUnreadable { .. }
            | Self::MakefileSetup { .. }
            | Self::InvalidConfig { .. } => 3,
            Self::JobExecution { .. } | Self::Io(_) | Self::Json(_) => 1,
        }
    }

    /// True for errors that must abort the run before any job is scheduled.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::TagFileMissing { .. }
                | Self::ListFileUnreadable { .. }
                | Self::MakefileSetup { .. }
                | Self::InvalidConfig { .. }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, SuiteError>;
