//! Makefile-variable extraction for build-directory runs.
//!
//! `--from-build-dir` derives the test environment from the `makefile.setup`
//! fragment the build wrote next to the suite. The fragment is plain
//! `KEY = value` lines; nothing here evaluates make syntax.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use suiterun_error::{Result, SuiteError};

/// Variables parsed from a makefile-setup fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MakeVars {
    vars: BTreeMap<String, String>,
}

impl MakeVars {
    /// Parse `KEY = value` lines; comments and non-assignments are ignored.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|error| SuiteError::MakefileSetup {
            path: path.to_owned(),
            detail: error.to_string(),
        })?;
        let mut vars = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            vars.insert(key.trim().to_owned(), value.trim().to_owned());
        }
        Ok(Self { vars })
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// `when_eq` iff the variable equals `expected`, `when_ne` otherwise
    /// (including when the variable is absent).
    #[must_use]
    pub fn choose(&self, key: &str, expected: &str, when_eq: &str, when_ne: &str) -> String {
        if self.get(key) == Some(expected) {
            when_eq.to_owned()
        } else {
            when_ne.to_owned()
        }
    }
}
