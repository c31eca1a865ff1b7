//! Command orchestration for maid.
//!
//! This module ties the pipeline together for each command:
//! - `clean`: scan, classify, name, plan, execute
//! - `keep`: scan, classify, name, retain, execute
//! - `restore`: locate a trash run, plan the moves back, execute, prune

use crate::classifier::Classifier;
use crate::config::{CompiledConfig, MaidConfig, RetentionConfig};
use crate::error::MaidError;
use crate::executor::{ExecutionReport, Executor, Operation};
use crate::file_category::Lexicon;
use crate::namer::Namer;
use crate::output::{Reporter, RunCommand, RunReport};
use crate::planner::{PlanMode, Planner};
use crate::restore::{RestoreError, TrashRestorer};
use crate::retention::RetentionPolicy;
use crate::scanner::{RootError, ScanOutcome, Scanner, ensure_root};
use crate::trash;
use chrono::Utc;
use std::path::Path;

pub use crate::output::OutputOptions;

/// Represents a CLI command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaidCommand {
    /// Rename files to canonical names, optionally relocating them.
    Clean {
        recursive: bool,
        restructure: bool,
        dry_run: bool,
    },
    /// Move unimportant files into a new trash run.
    Keep { recursive: bool, dry_run: bool },
    /// Bring a trash run back, or list the runs.
    Restore {
        run: Option<String>,
        list: bool,
        dry_run: bool,
    },
}

/// Runs a command against `root` with discovered configuration and default
/// output.
///
/// # Examples
///
/// ```no_run
/// use maid::cli::{MaidCommand, run_cli};
/// use std::path::Path;
///
/// let command = MaidCommand::Clean { recursive: false, restructure: false, dry_run: true };
/// match run_cli(command, Path::new("/path/to/directory")) {
///     Ok(report) => println!("{} operations planned", report.summary.operations_planned),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(command: MaidCommand, root: &Path) -> Result<RunReport, MaidError> {
    run_cli_with_config(command, root, None, OutputOptions::default())
}

/// Runs a command with an optional configuration file and output options.
///
/// # Errors
///
/// Fails before touching anything when the root is unusable, the
/// configuration is invalid or the requested trash run does not exist.
/// Failures of individual files are part of the returned report.
pub fn run_cli_with_config(
    command: MaidCommand,
    root: &Path,
    config_path: Option<&Path>,
    output: OutputOptions,
) -> Result<RunReport, MaidError> {
    let root = ensure_root(root)?;
    let reporter = Reporter::new(output);

    let report = match command {
        MaidCommand::Clean {
            recursive,
            restructure,
            dry_run,
        } => {
            let mode = if restructure {
                PlanMode::Restructure
            } else {
                PlanMode::InPlace
            };
            clean(&root, config_path, recursive, mode, dry_run, &reporter)?
        }
        MaidCommand::Keep { recursive, dry_run } => {
            keep(&root, config_path, recursive, dry_run, &reporter)?
        }
        MaidCommand::Restore { run, list, dry_run } => {
            if list {
                list_trash(&root)?
            } else {
                restore(&root, run.as_deref(), dry_run, &reporter)?
            }
        }
    };

    reporter.finish(&report)?;
    Ok(report)
}

fn load_config(root: &Path, config_path: Option<&Path>) -> Result<CompiledConfig, MaidError> {
    Ok(MaidConfig::load(config_path, root)?.compile()?)
}

/// Scans `root` and classifies every record.
///
/// Returns the lexicon and retention settings for the later stages.
fn scan_and_classify(
    root: &Path,
    config: CompiledConfig,
    recursive: bool,
) -> (ScanOutcome, Lexicon, RetentionConfig) {
    let CompiledConfig {
        filters,
        lexicon,
        retention,
        extensions,
        excerpt_lines,
        ..
    } = config;

    let mut outcome = Scanner::new(filters, &extensions, recursive).scan(root);
    let classifier = Classifier::new(lexicon);
    for record in outcome.records.iter_mut() {
        classifier.classify_record(record, excerpt_lines);
    }

    (outcome, classifier.lexicon().clone(), retention)
}

fn clean(
    root: &Path,
    config_path: Option<&Path>,
    recursive: bool,
    mode: PlanMode,
    dry_run: bool,
    reporter: &Reporter,
) -> Result<RunReport, MaidError> {
    let config = load_config(root, config_path)?;
    let script_subdirs = config.restructure.script_subdirs;
    let (outcome, lexicon, _) = scan_and_classify(root, config, recursive);
    let ScanOutcome {
        mut records,
        skipped,
    } = outcome;

    let namer = Namer::new(lexicon);
    let operations = Planner::new(root, mode)
        .with_script_subdirs(script_subdirs)
        .plan(&mut records, &namer)?;
    let execution = execute(root, operations, dry_run, reporter)?;

    let mut report = RunReport::new(RunCommand::Clean, root.to_path_buf(), execution);
    report.mode = Some(mode);
    report.records = records;
    report.skipped = skipped;
    Ok(report.summarize())
}

fn keep(
    root: &Path,
    config_path: Option<&Path>,
    recursive: bool,
    dry_run: bool,
    reporter: &Reporter,
) -> Result<RunReport, MaidError> {
    let config = load_config(root, config_path)?;
    let (outcome, lexicon, retention) = scan_and_classify(root, config, recursive);
    let ScanOutcome {
        mut records,
        skipped,
    } = outcome;

    Namer::new(lexicon).name_records(&mut records);
    let policy = RetentionPolicy::new(&retention);
    let plan = policy.retain(root, &records, Utc::now());

    let trash_run = (!plan.operations.is_empty()).then(|| plan.run_id.clone());
    let execution = execute(root, plan.operations, dry_run, reporter)?;

    let mut report = RunReport::new(RunCommand::Keep, root.to_path_buf(), execution);
    report.records = records;
    report.skipped = skipped;
    report.decisions = plan.decisions;
    report.trash_run = trash_run;
    Ok(report.summarize())
}

fn list_trash(root: &Path) -> Result<RunReport, MaidError> {
    let runs = trash::list_runs(root).map_err(RestoreError::from)?;
    let mut report = RunReport::new(
        RunCommand::Restore,
        root.to_path_buf(),
        ExecutionReport::default(),
    );
    report.trash_runs = runs;
    Ok(report.summarize())
}

fn restore(
    root: &Path,
    run_id: Option<&str>,
    dry_run: bool,
    reporter: &Reporter,
) -> Result<RunReport, MaidError> {
    let plan = TrashRestorer::plan(root, run_id)?;
    let execution = execute(root, plan.operations.clone(), dry_run, reporter)?;

    if let Err(e) = TrashRestorer::finish(root, &plan, &execution) {
        log::warn!("could not clean up trash run {}: {}", plan.run.id, e);
    }

    let mut report = RunReport::new(RunCommand::Restore, root.to_path_buf(), execution);
    report.trash_run = Some(plan.run.id);
    Ok(report.summarize())
}

fn execute(
    root: &Path,
    operations: Vec<Operation>,
    dry_run: bool,
    reporter: &Reporter,
) -> Result<ExecutionReport, RootError> {
    let progress = reporter.progress_bar(operations.len(), dry_run);
    let report = Executor::new(dry_run).execute_with(root, operations, |outcome| {
        reporter.report_outcome(outcome, progress.as_ref())
    })?;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    Ok(report)
}
