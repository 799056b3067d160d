//! suiterun execution engine.
//!
//! Orchestrates a directory-per-test suite: resolves the discriminant tag
//! set for the target configuration, selects the catalog, runs each test as
//! an isolated external driver process under bounded concurrency, aggregates
//! outcomes, optionally re-validates failures in a serialized retry pass,
//! and hands the persisted results to a report sink.
//!
//! The crate deliberately knows nothing about test content: pass/fail logic
//! and per-test applicability expressions belong to the external driver,
//! reached through the [`executor::TestExecutor`] seam.

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod discriminants;
pub mod executor;
pub mod report;
pub mod results;
pub mod retry;
pub mod scheduler;
pub mod suite;

pub use aggregator::{Metrics, ResultAggregator};
pub use catalog::TestCatalog;
pub use config::RunConfig;
pub use discriminants::DiscriminantSet;
pub use executor::{JobContext, ProcessExecutor, TestExecutor};
pub use report::{ReportSink, TextReport};
pub use results::{Outcome, ResultRecord, ResultStore, TestId};
pub use retry::{RetryController, RetryState};
pub use suite::run_suite;
