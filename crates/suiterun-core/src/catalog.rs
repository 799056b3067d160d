//! Test catalog selection.
//!
//! Three selection modes, in priority order: an explicit list file (one test
//! per non-empty line, `:`-separated annotations ignored), explicit ids on
//! the command line (trailing path separators tolerated for shell
//! completion), or filesystem discovery of every immediate subdirectory
//! containing the driver entry-point file.
//!
//! The catalog applies no discriminant filtering: tag applicability is the
//! external driver's business, evaluated per test at run time.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use suiterun_error::{Result, SuiteError};
use tracing::debug;

use crate::results::TestId;

/// Deliberately always-failing test used to verify failure reporting.
pub const SENTINEL_TEST: &str = "Z999_xfail";

/// Default per-test entry-point file that discovery keys on.
pub const DEFAULT_ENTRY_POINT: &str = "test.py";

/// Ordered sequence of test ids for one scheduling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestCatalog {
    tests: Vec<TestId>,
}

impl TestCatalog {
    /// Build the catalog for this run.
    ///
    /// # Errors
    ///
    /// Fails when a named list file cannot be read or discovery cannot scan
    /// the suite root.
    pub fn select(
        requested: &[String],
        root: &Path,
        entry_point: &str,
        include_sentinel: bool,
    ) -> Result<Self> {
        let mut tests = if requested.len() == 1 && Path::new(&requested[0]).is_file() {
            parse_list_file(Path::new(&requested[0]))?
        } else if !requested.is_empty() {
            requested
                .iter()
                .map(|t| t.trim_end_matches(['/', '\\']).to_owned())
                .collect()
        } else {
            discover(root, entry_point)?
        };

        if !include_sentinel {
            tests.retain(|t| t != SENTINEL_TEST);
        }

        debug!("catalog_selected count={}", tests.len());
        Ok(Self { tests })
    }

    /// Catalog from an explicit id sequence (retry pass, tests).
    #[must_use]
    pub fn from_tests(tests: Vec<TestId>) -> Self {
        Self { tests }
    }

    /// Order-preserving subsequence of the ids present in `keep`.
    #[must_use]
    pub fn retain(&self, keep: &BTreeSet<TestId>) -> Self {
        Self {
            tests: self
                .tests
                .iter()
                .filter(|t| keep.contains(*t))
                .cloned()
                .collect(),
        }
    }

    #[must_use]
    pub fn tests(&self) -> &[TestId] {
        &self.tests
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Parse an explicit test list: first `:`-token of each non-empty line.
fn parse_list_file(path: &Path) -> Result<Vec<TestId>> {
    let text = fs::read_to_string(path).map_err(|error| SuiteError::ListFileUnreadable {
        path: path.to_owned(),
        detail: error.to_string(),
    })?;
    Ok(text
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            line.split(':').next().map(|id| id.trim().to_owned())
        })
        .filter(|id| !id.is_empty())
        .collect())
}

/// Every immediate subdirectory of `root` containing `entry_point`, sorted.
fn discover(root: &Path, entry_point: &str) -> Result<Vec<TestId>> {
    let mut tests = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() || !path.join(entry_point).is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            tests.push(name.to_owned());
        }
    }
    tests.sort();
    Ok(tests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn make_test_dir(root: &Path, name: &str, with_entry: bool) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        if with_entry {
            fs::File::create(dir.join(DEFAULT_ENTRY_POINT)).unwrap();
        }
    }

    #[test]
    fn list_file_takes_first_colon_token() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("tests.list");
        let mut f = fs::File::create(&list).unwrap();
        writeln!(f, "foo:extra-info").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "bar").unwrap();
        drop(f);

        let catalog = TestCatalog::select(
            &[list.to_string_lossy().into_owned()],
            dir.path(),
            DEFAULT_ENTRY_POINT,
            false,
        )
        .unwrap();
        assert_eq!(catalog.tests(), ["foo".to_owned(), "bar".to_owned()]);
    }

    #[test]
    fn explicit_ids_strip_trailing_separator() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = TestCatalog::select(
            &["alpha/".to_owned(), "beta".to_owned()],
            dir.path(),
            DEFAULT_ENTRY_POINT,
            false,
        )
        .unwrap();
        assert_eq!(catalog.tests(), ["alpha".to_owned(), "beta".to_owned()]);
    }

    #[test]
    fn discovery_finds_entry_point_dirs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        make_test_dir(dir.path(), "zeta", true);
        make_test_dir(dir.path(), "alpha", true);
        make_test_dir(dir.path(), "not_a_test", false);

        let catalog =
            TestCatalog::select(&[], dir.path(), DEFAULT_ENTRY_POINT, false).unwrap();
        assert_eq!(catalog.tests(), ["alpha".to_owned(), "zeta".to_owned()]);
    }

    #[test]
    fn sentinel_dropped_unless_requested() {
        let dir = tempfile::tempdir().unwrap();
        make_test_dir(dir.path(), SENTINEL_TEST, true);
        make_test_dir(dir.path(), "alpha", true);

        let without =
            TestCatalog::select(&[], dir.path(), DEFAULT_ENTRY_POINT, false).unwrap();
        assert_eq!(without.tests(), ["alpha".to_owned()]);

        let with = TestCatalog::select(&[], dir.path(), DEFAULT_ENTRY_POINT, true).unwrap();
        assert!(with.tests().contains(&SENTINEL_TEST.to_owned()));
    }

    #[test]
    fn retain_preserves_catalog_order() {
        let catalog = TestCatalog::from_tests(vec![
            "c".to_owned(),
            "a".to_owned(),
            "b".to_owned(),
        ]);
        let keep: BTreeSet<TestId> = ["b".to_owned(), "c".to_owned()].into_iter().collect();
        assert_eq!(catalog.retain(&keep).tests(), ["c".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn missing_list_file_falls_through_to_explicit_ids() {
        let dir = tempfile::tempdir().unwrap();
        // Two entries, so the list-file branch is not taken even though
        // neither path exists.
        let catalog = TestCatalog::select(
            &["no/such/file".to_owned(), "other".to_owned()],
            dir.path(),
            DEFAULT_ENTRY_POINT,
            false,
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);
    }
}
