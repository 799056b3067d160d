//! Final report rendering.
//!
//! The core's only obligation is to hand the persisted results (and
//! optionally a prior run's results) to a sink. The bundled `TextReport`
//! writes a plain-text summary with a differential section against the
//! baseline; anything fancier can implement [`ReportSink`] instead.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use suiterun_error::Result;
use tracing::info;

use crate::results::{Outcome, ResultRecord, ResultStore, TestId};

/// Renderer of the final run artifact.
pub trait ReportSink {
    /// Render the records in `results_dir` (diffed against `baseline_dir`
    /// when given) into `output_file`.
    fn render(
        &self,
        results_dir: &Path,
        baseline_dir: Option<&Path>,
        output_file: &Path,
    ) -> Result<()>;
}

/// Plain-text diff-style report.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextReport;

impl ReportSink for TextReport {
    fn render(
        &self,
        results_dir: &Path,
        baseline_dir: Option<&Path>,
        output_file: &Path,
    ) -> Result<()> {
        let current = ResultStore::open(results_dir).load_records()?;
        let baseline = match baseline_dir {
            Some(dir) => Some(ResultStore::open(dir).load_records()?),
            None => None,
        };
        let text = render_to_string(&current, baseline.as_deref());
        fs::write(output_file, text)?;
        info!("report_written path={}", output_file.display());
        Ok(())
    }
}

fn outcome_index(records: &[ResultRecord]) -> BTreeMap<&TestId, Outcome> {
    records.iter().map(|r| (&r.test, r.outcome)).collect()
}

fn render_to_string(current: &[ResultRecord], baseline: Option<&[ResultRecord]>) -> String {
    let mut out = String::new();
    let counts = |wanted: Outcome| current.iter().filter(|r| r.outcome == wanted).count();

    let _ = writeln!(out, "test run report");
    let _ = writeln!(out, "===============");
    let _ = writeln!(out);
    let _ = writeln!(out, "total   : {}", current.len());
    let _ = writeln!(out, "passed  : {}", counts(Outcome::Pass));
    let _ = writeln!(out, "failed  : {}", counts(Outcome::Fail));
    let _ = writeln!(out, "dead    : {}", counts(Outcome::Dead));
    let _ = writeln!(out, "skipped : {}", counts(Outcome::Skip));

    for (heading, wanted) in [
        ("failed tests", Outcome::Fail),
        ("dead tests", Outcome::Dead),
        ("skipped tests", Outcome::Skip),
    ] {
        let selected: Vec<&ResultRecord> =
            current.iter().filter(|r| r.outcome == wanted).collect();
        if selected.is_empty() {
            continue;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{heading}:");
        for record in selected {
            match &record.reason {
                Some(reason) => {
                    let _ = writeln!(out, "  {} ({reason})", record.test);
                }
                None => {
                    let _ = writeln!(out, "  {}", record.test);
                }
            }
        }
    }

    if let Some(baseline) = baseline {
        let old = outcome_index(baseline);
        let broken_now = |outcome: Outcome| matches!(outcome, Outcome::Fail | Outcome::Dead);

        let regressions: Vec<&ResultRecord> = current
            .iter()
            .filter(|r| {
                broken_now(r.outcome) && old.get(&r.test).copied() == Some(Outcome::Pass)
            })
            .collect();
        let fixes: Vec<&ResultRecord> = current
            .iter()
            .filter(|r| {
                r.outcome == Outcome::Pass
                    && old.get(&r.test).copied().is_some_and(broken_now)
            })
            .collect();

        let _ = writeln!(out);
        let _ = writeln!(out, "comparison with previous run:");
        let _ = writeln!(out, "  regressions : {}", regressions.len());
        for record in &regressions {
            let _ = writeln!(out, "    {} (now {})", record.test, record.outcome);
        }
        let _ = writeln!(out, "  fixed       : {}", fixes.len());
        for record in &fixes {
            let _ = writeln!(out, "    {}", record.test);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(test: &str, outcome: Outcome) -> ResultRecord {
        ResultRecord {
            test: test.to_owned(),
            outcome,
            exit_code: None,
            elapsed_ms: 0,
            reason: None,
            diff: None,
        }
    }

    #[test]
    fn summary_counts_every_outcome() {
        let current = vec![
            record("a", Outcome::Pass),
            record("b", Outcome::Fail),
            record("c", Outcome::Dead),
        ];
        let text = render_to_string(&current, None);
        assert!(text.contains("total   : 3"), "{text}");
        assert!(text.contains("failed  : 1"), "{text}");
        assert!(text.contains("failed tests:\n  b"), "{text}");
        assert!(text.contains("dead tests:\n  c"), "{text}");
        assert!(!text.contains("comparison"), "{text}");
    }

    #[test]
    fn baseline_diff_lists_regressions_and_fixes() {
        let baseline = vec![
            record("a", Outcome::Pass),
            record("b", Outcome::Fail),
            record("c", Outcome::Pass),
        ];
        let current = vec![
            record("a", Outcome::Fail),
            record("b", Outcome::Pass),
            record("c", Outcome::Pass),
        ];
        let text = render_to_string(&current, Some(&baseline));
        assert!(text.contains("regressions : 1"), "{text}");
        assert!(text.contains("    a (now fail)"), "{text}");
        assert!(text.contains("fixed       : 1"), "{text}");
        assert!(text.contains("    b"), "{text}");
    }

    #[test]
    fn render_reads_stores_and_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::create(&dir.path().join("results")).unwrap();
        store.write_record(&record("a", Outcome::Pass)).unwrap();
        store.write_record(&record("b", Outcome::Fail)).unwrap();

        let report_path = dir.path().join("report.txt");
        TextReport
            .render(store.dir(), None, &report_path)
            .unwrap();
        let text = fs::read_to_string(&report_path).unwrap();
        assert!(text.contains("passed  : 1"));
        assert!(text.contains("failed  : 1"));
    }
}
