//! suiterun binary: option parsing, environment plumbing, run wiring.
//!
//! Everything interesting lives in `suiterun-core`; this crate turns a
//! command line into a [`RunConfig`], prepares the output directory, and
//! wires the suite run to the report renderer. Fatal configuration errors
//! (most importantly a missing tag file) abort here with a non-zero exit
//! before any test is scheduled.

mod makevar;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use suiterun_core::config::{
    DEFAULT_DRIVER, DEFAULT_JOBS, DEFAULT_OUTPUT_DIR, DEFAULT_TAG_FILE, DEFAULT_TIMEOUT_SECS,
};
use suiterun_core::{
    catalog::DEFAULT_ENTRY_POINT, run_suite, DiscriminantSet, ProcessExecutor, ReportSink as _,
    ResultStore, RunConfig, TestCatalog, TextReport,
};
use suiterun_error::{Result, SuiteError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::makevar::MakeVars;

const USAGE: &str = "\
usage: suiterun [OPTIONS] [TEST|LIST_FILE]...

Run the testsuite: discover (or take) a set of test directories, execute
each through the external driver under bounded concurrency, optionally
re-run failures serially, and write a diff-style report.

options:
    --discs A,B                extra discriminant tags
    --tags-file PATH           tag file from the setup step [testsuite.tags]
    -j, --jobs N               concurrent jobs [1]
    --output-dir PATH          run artifact directory [out]
    --old-result-dir PATH      previous run's results for the diff report
    --report-file PATH         report destination [OUTPUT_DIR/report.txt]
    --retry-when-errors-lower-than N
                               re-run failed tests serially when fewer than
                               N tests failed; 0 disables [0]
    --with-sentinel            include the always-failing sentinel test
    --view-diffs, --diffs      print failing tests' output on stdout
    --with-gdb                 debug interactively (forces --jobs 1)
    --with-valgrind            ask the driver to run under valgrind
    --with-gprof               ask the driver to collect profiling data
    --driver PATH              external per-test driver [run-test]
    --timeout SECS             per-test timeout budget [300]
    --entry-point FILE         discovery entry-point file [test.py]
    --from-build-dir           derive environment from ../makefile.setup
    -h, --help                 show this help
";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Options {
    tests: Vec<String>,
    discs: String,
    tags_file: PathBuf,
    jobs: usize,
    output_dir: PathBuf,
    old_result_dir: Option<PathBuf>,
    report_file: Option<PathBuf>,
    retry_threshold: usize,
    with_sentinel: bool,
    view_diffs: bool,
    with_gdb: bool,
    with_valgrind: bool,
    with_gprof: bool,
    driver: PathBuf,
    timeout_secs: u64,
    entry_point: String,
    from_build_dir: bool,
    show_help: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tests: Vec::new(),
            discs: String::new(),
            tags_file: PathBuf::from(DEFAULT_TAG_FILE),
            jobs: DEFAULT_JOBS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            old_result_dir: None,
            report_file: None,
            retry_threshold: 0,
            with_sentinel: false,
            view_diffs: false,
            with_gdb: false,
            with_valgrind: false,
            with_gprof: false,
            driver: PathBuf::from(DEFAULT_DRIVER),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            entry_point: DEFAULT_ENTRY_POINT.to_owned(),
            from_build_dir: false,
            show_help: false,
        }
    }
}

impl Options {
    fn parse(args: &[String]) -> std::result::Result<Self, String> {
        let mut options = Self::default();
        let mut index = 0_usize;

        let value = |args: &[String], index: usize, flag: &str| {
            args.get(index)
                .cloned()
                .ok_or_else(|| format!("missing value for {flag}"))
        };

        while index < args.len() {
            match args[index].as_str() {
                "--discs" => {
                    index += 1;
                    options.discs = value(args, index, "--discs")?;
                }
                "--tags-file" => {
                    index += 1;
                    options.tags_file = PathBuf::from(value(args, index, "--tags-file")?);
                }
                "-j" | "--jobs" => {
                    index += 1;
                    let raw = value(args, index, "--jobs")?;
                    options.jobs = raw
                        .parse()
                        .map_err(|_| format!("invalid --jobs value '{raw}'"))?;
                }
                "--output-dir" => {
                    index += 1;
                    options.output_dir = PathBuf::from(value(args, index, "--output-dir")?);
                }
                "--old-result-dir" => {
                    index += 1;
                    options.old_result_dir =
                        Some(PathBuf::from(value(args, index, "--old-result-dir")?));
                }
                "--report-file" => {
                    index += 1;
                    options.report_file =
                        Some(PathBuf::from(value(args, index, "--report-file")?));
                }
                "--retry-when-errors-lower-than" => {
                    index += 1;
                    let raw = value(args, index, "--retry-when-errors-lower-than")?;
                    options.retry_threshold = raw.parse().map_err(|_| {
                        format!("invalid --retry-when-errors-lower-than value '{raw}'")
                    })?;
                }
                "--with-sentinel" => options.with_sentinel = true,
                "--view-diffs" | "--diffs" => options.view_diffs = true,
                "--with-gdb" => options.with_gdb = true,
                "--with-valgrind" => options.with_valgrind = true,
                "--with-gprof" => options.with_gprof = true,
                "--driver" => {
                    index += 1;
                    options.driver = PathBuf::from(value(args, index, "--driver")?);
                }
                "--timeout" => {
                    index += 1;
                    let raw = value(args, index, "--timeout")?;
                    options.timeout_secs = raw
                        .parse()
                        .map_err(|_| format!("invalid --timeout value '{raw}'"))?;
                }
                "--entry-point" => {
                    index += 1;
                    options.entry_point = value(args, index, "--entry-point")?;
                }
                "--from-build-dir" => options.from_build_dir = true,
                "-h" | "--help" => options.show_help = true,
                other if other.starts_with('-') => {
                    return Err(format!("unknown option '{other}'"));
                }
                test => options.tests.push(test.to_owned()),
            }
            index += 1;
        }

        Ok(options)
    }
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = match Options::parse(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };
    if options.show_help {
        print!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(suite_error) => {
            error!("{suite_error}");
            ExitCode::from(u8::try_from(suite_error.exit_code()).unwrap_or(1))
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(options: &Options) -> Result<()> {
    let root = env::current_dir()?;
    if options.from_build_dir {
        apply_build_dir_env(&root)?;
    }

    // Tag-file resolution comes first: its absence aborts the whole run
    // before any directory is created or any test scheduled.
    let discriminants = DiscriminantSet::resolve(
        &options.discs,
        &options.tags_file,
        cfg!(target_os = "vxworks"),
    )?;
    info!("running with discriminants: {}", discriminants.join(", "));

    fs::create_dir_all(&options.output_dir)?;
    discriminants.persist(&options.output_dir.join("discs"))?;

    let config = build_config(options, &root, discriminants);
    config.persist()?;

    let catalog = TestCatalog::select(
        &options.tests,
        &root,
        &config.entry_point,
        config.include_sentinel,
    )?;
    info!("catalog_selected tests={}", catalog.len());

    let store = ResultStore::create(&config.results_dir)?;
    run_suite(&config, &catalog, &ProcessExecutor, &store)?;

    let report_file = options
        .report_file
        .clone()
        .unwrap_or_else(|| options.output_dir.join("report.txt"));
    TextReport.render(
        &config.results_dir,
        options.old_result_dir.as_deref(),
        &report_file,
    )?;
    Ok(())
}

fn build_config(options: &Options, root: &Path, discriminants: DiscriminantSet) -> RunConfig {
    let mut config = RunConfig::new(root, &options.output_dir);
    config.driver = options.driver.clone();
    config.entry_point = options.entry_point.clone();
    config.jobs = options.jobs;
    config.timeout_secs = options.timeout_secs;
    config.retry_threshold = options.retry_threshold;
    config.include_sentinel = options.with_sentinel;
    config.view_diffs = options.view_diffs;
    config.with_gdb = options.with_gdb;
    config.with_valgrind = options.with_valgrind;
    // gdb wants one interactive process; profiling noise would defeat it.
    config.with_gprof = options.with_gprof && !options.with_gdb;
    config.discriminants = discriminants;
    config
}

/// Derive the test environment from the build tree next to the suite.
fn apply_build_dir_env(root: &Path) -> Result<()> {
    let setup_path = root.join("..").join("makefile.setup");
    let vars = MakeVars::load(&setup_path)?;
    let profile = vars.choose("DEBUG", "true", "Debug", "Release");

    env::set_var("PRJ_BUILD", &profile);
    env::set_var("PLATFORM", "native");
    env::set_var("LIBRARY_TYPE", "static");
    env::set_var("PROJECT_PATH", root);

    let tools_dir = root
        .join("..")
        .join(".build")
        .join("native")
        .join(profile.to_lowercase())
        .join("static")
        .join("tools");
    let mut entries = vec![tools_dir];
    entries.extend(env::split_paths(&env::var_os("PATH").unwrap_or_default()));
    let joined = env::join_paths(entries)
        .map_err(|joe| SuiteError::invalid_config(format!("path_join_failed error={joe}")))?;
    env::set_var("PATH", joined);

    info!("build_dir_env_applied profile={profile}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Options, String> {
        let args: Vec<String> = args.iter().map(|a| (*a).to_owned()).collect();
        Options::parse(&args)
    }

    #[test]
    fn defaults_match_documented_values() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.jobs, 1);
        assert_eq!(options.timeout_secs, 300);
        assert_eq!(options.retry_threshold, 0);
        assert_eq!(options.tags_file, PathBuf::from("testsuite.tags"));
        assert_eq!(options.output_dir, PathBuf::from("out"));
        assert!(!options.with_sentinel);
    }

    #[test]
    fn positional_arguments_are_tests() {
        let options = parse(&["net/echo", "proto/handshake"]).unwrap();
        assert_eq!(options.tests, ["net/echo", "proto/handshake"]);
    }

    #[test]
    fn value_options_consume_the_next_argument() {
        let options = parse(&[
            "--discs",
            "ssl,ipv6",
            "-j",
            "8",
            "--retry-when-errors-lower-than",
            "5",
            "--driver",
            "bin/run-test",
        ])
        .unwrap();
        assert_eq!(options.discs, "ssl,ipv6");
        assert_eq!(options.jobs, 8);
        assert_eq!(options.retry_threshold, 5);
        assert_eq!(options.driver, PathBuf::from("bin/run-test"));
    }

    #[test]
    fn diffs_is_an_alias_for_view_diffs() {
        assert!(parse(&["--diffs"]).unwrap().view_diffs);
        assert!(parse(&["--view-diffs"]).unwrap().view_diffs);
    }

    #[test]
    fn missing_value_and_unknown_option_are_errors() {
        assert!(parse(&["--jobs"]).is_err());
        assert!(parse(&["--jobs", "many"]).is_err());
        assert!(parse(&["--no-such-option"]).is_err());
    }

    #[test]
    fn gdb_forces_serial_config_and_disables_gprof() {
        let options = parse(&["--with-gdb", "--with-gprof", "-j", "4"]).unwrap();
        let config = build_config(
            &options,
            Path::new("/suite"),
            DiscriminantSet::default(),
        );
        assert_eq!(config.effective_jobs(), 1);
        assert!(!config.with_gprof);
        assert!(config.with_gdb);
    }
}
