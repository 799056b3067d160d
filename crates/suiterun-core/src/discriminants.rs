//! Discriminant tag resolution.
//!
//! A discriminant is a free-form tag describing the platform or build
//! configuration; individual test drivers consult the active set to decide
//! whether a test applies. The orchestrator never evaluates per-test tag
//! expressions itself; it only assembles the set and hands it to each job.
//!
//! Resolution order: the `ALL` wildcard, the host OS family, the optional
//! legacy-OS tag, user-supplied tags, then the tokens of the generated tag
//! file. The tag file is mandatory: its absence means the suite's setup step
//! never ran, and the whole run aborts before scheduling anything.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use suiterun_error::{Result, SuiteError};
use tracing::debug;

/// Matches every test regardless of configuration.
pub const WILDCARD_TAG: &str = "ALL";

/// Tag added for the legacy embedded OS family.
pub const LEGACY_OS_TAG: &str = "vxworks";

/// Insertion-ordered set of discriminant tags.
///
/// Built once at startup, immutable afterwards, shared read-only by every
/// job. Duplicate inserts are ignored; first occurrence wins the position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscriminantSet {
    tags: Vec<String>,
}

impl DiscriminantSet {
    /// Resolve the full discriminant set for this run.
    ///
    /// `explicit` is a comma-separated user tag list (empty contributes
    /// nothing). `tag_file` is the whitespace-separated tag file generated by
    /// the suite's setup step.
    ///
    /// # Errors
    ///
    /// [`SuiteError::TagFileMissing`] when the tag file cannot be read; this
    /// is fatal for the whole run.
    pub fn resolve(explicit: &str, tag_file: &Path, legacy_os: bool) -> Result<Self> {
        let mut set = Self::default();
        set.insert(WILDCARD_TAG);
        set.insert(std::env::consts::FAMILY);
        if legacy_os {
            set.insert(LEGACY_OS_TAG);
        }
        for tag in explicit.split(',') {
            let tag = tag.trim();
            if !tag.is_empty() {
                set.insert(tag);
            }
        }

        let text = fs::read_to_string(tag_file).map_err(|_| SuiteError::TagFileMissing {
            path: tag_file.to_owned(),
        })?;
        for token in text.split_whitespace() {
            set.insert(token);
        }

        debug!("discriminants_resolved count={} tags={}", set.len(), set.join(","));
        Ok(set)
    }

    fn insert(&mut self, tag: &str) {
        if !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_owned());
        }
    }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    #[must_use]
    pub fn join(&self, separator: &str) -> String {
        self.tags.join(separator)
    }

    /// Write the resolved set to a side-channel state file for inspection.
    pub fn persist(&self, path: &Path) -> Result<()> {
        fs::write(path, self.join(" "))?;
        Ok(())
    }
}
