//! Output formatting and styling module.
//!
//! Everything a run prints goes through [`Reporter`]: the verbose operation
//! trace, failures, the progress bar and the closing summary. With `--json`
//! the whole [`RunReport`] is printed instead and nothing else reaches stdout.

use crate::executor::{ExecutionReport, OperationOutcome};
use crate::planner::PlanMode;
use crate::retention::{RetentionDecision, Verdict};
use crate::scanner::{FileRecord, SkippedFile};
use crate::trash::TrashRun;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Writes a path as a string, replacing bytes that are not valid UTF-8, so a
/// report can always be printed.
pub(crate) fn serialize_path<P, S>(path: &P, serializer: S) -> Result<S::Ok, S::Error>
where
    P: AsRef<Path>,
    S: Serializer,
{
    serializer.serialize_str(&path.as_ref().to_string_lossy())
}

/// How a run talks to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Print one line per operation and per keep decision.
    pub verbose: bool,
    /// Print the run report as JSON and nothing else.
    pub json: bool,
}

/// The command a report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunCommand {
    Clean,
    Keep,
    Restore,
}

/// Counts shown at the end of every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub files_scanned: usize,
    pub operations_planned: usize,
    pub executed: usize,
    pub simulated: usize,
    pub failed: usize,
}

/// Everything a run found, decided and did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub command: RunCommand,
    #[serde(serialize_with = "crate::output::serialize_path")]
    pub root: PathBuf,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<PlanMode>,
    pub records: Vec<FileRecord>,
    pub skipped: Vec<SkippedFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<RetentionDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trash_run: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trash_runs: Vec<TrashRun>,
    pub execution: ExecutionReport,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn new(command: RunCommand, root: PathBuf, execution: ExecutionReport) -> Self {
        Self {
            command,
            root,
            dry_run: execution.dry_run,
            mode: None,
            records: Vec::new(),
            skipped: Vec::new(),
            decisions: Vec::new(),
            trash_run: None,
            trash_runs: Vec::new(),
            execution,
            summary: RunSummary::default(),
        }
    }

    /// Recomputes the summary from the records and the execution report.
    pub fn summarize(mut self) -> Self {
        self.summary = RunSummary {
            files_scanned: self.records.len(),
            operations_planned: self.execution.outcomes.len(),
            executed: self.execution.executed(),
            simulated: self.execution.simulated(),
            failed: self.execution.failed(),
        };
        self
    }
}

/// Prints a run for humans or machines.
pub struct Reporter {
    options: OutputOptions,
}

impl Reporter {
    pub fn new(options: OutputOptions) -> Self {
        Self { options }
    }

    fn human(&self) -> bool {
        !self.options.json
    }

    /// A progress bar for a real run that is neither verbose nor JSON.
    pub fn progress_bar(&self, total: usize, dry_run: bool) -> Option<ProgressBar> {
        if self.options.verbose || self.options.json || dry_run || total == 0 {
            return None;
        }
        Some(Self::create_progress_bar(total as u64))
    }

    /// Reports one finished operation.
    pub fn report_outcome(&self, outcome: &OperationOutcome, progress: Option<&ProgressBar>) {
        if let Some(pb) = progress {
            pb.inc(1);
        }
        if !self.human() {
            return;
        }

        let line = Self::operation_line(outcome);
        if outcome.is_failure() {
            match progress {
                Some(pb) => pb.suspend(|| Self::error(&line)),
                None => Self::error(&line),
            }
        } else if self.options.verbose {
            Self::plain(&line);
        }
    }

    /// `RENAME <source> -> <destination> (<status>)`
    pub fn operation_line(outcome: &OperationOutcome) -> String {
        format!(
            "{} {} -> {} ({})",
            outcome.operation.kind,
            outcome.operation.source.display(),
            outcome.operation.destination.display(),
            outcome.status
        )
    }

    /// Prints the end of a run.
    ///
    /// # Errors
    ///
    /// Fails only if the report cannot be serialized in JSON mode.
    pub fn finish(&self, report: &RunReport) -> Result<(), serde_json::Error> {
        if self.options.json {
            println!("{}", serde_json::to_string_pretty(report)?);
            return Ok(());
        }

        if self.options.verbose {
            for decision in &report.decisions {
                Self::plain(&Self::decision_line(decision));
            }
        }

        for skipped in &report.skipped {
            Self::warning(&format!(
                "skipped {}: {}",
                skipped.path.display(),
                skipped.reason
            ));
        }

        match report.command {
            RunCommand::Clean => Self::clean_summary(report),
            RunCommand::Keep => Self::keep_summary(report),
            RunCommand::Restore => Self::restore_summary(report),
        }

        let summary = &report.summary;
        Self::header("SUMMARY");
        Self::plain(&format!("Files scanned:      {}", summary.files_scanned));
        Self::plain(&format!("Operations planned: {}", summary.operations_planned));
        if report.dry_run {
            Self::plain(&format!("Simulated:          {}", summary.simulated));
        } else {
            Self::plain(&format!(
                "Executed:           {}",
                summary.executed.to_string().green()
            ));
        }
        if summary.failed > 0 {
            Self::plain(&format!(
                "Failed:             {}",
                summary.failed.to_string().red()
            ));
        }

        if report.dry_run {
            Self::dry_run_notice("No files were modified.");
        } else if summary.failed == 0 {
            Self::success("Done.");
        } else {
            Self::warning("Some operations failed, see above.");
        }
        Ok(())
    }

    fn decision_line(decision: &RetentionDecision) -> String {
        match &decision.verdict {
            Verdict::Keep { rule } => format!(
                "{} {} ({})",
                "KEEP".green(),
                decision.path.display(),
                rule.as_str()
            ),
            Verdict::Trash => format!("{} {}", "TRASH".yellow(), decision.path.display()),
            Verdict::Duplicate { original } => format!(
                "{} {} (duplicate of {})",
                "TRASH".yellow(),
                decision.path.display(),
                original.display()
            ),
        }
    }

    fn clean_summary(report: &RunReport) {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in &report.records {
            *counts
                .entry(record.category.description().to_string())
                .or_insert(0) += 1;
        }
        if !counts.is_empty() {
            Self::summary_table(&counts, report.records.len());
        }
    }

    fn keep_summary(report: &RunReport) {
        let trashed = report
            .decisions
            .iter()
            .filter(|d| d.verdict.is_trash())
            .count();
        Self::header("RETENTION");
        Self::plain(&format!("Kept:    {}", report.decisions.len() - trashed));
        Self::plain(&format!("Trashed: {}", trashed));
        if let Some(run) = &report.trash_run {
            Self::info(&format!(
                "Trash run {}. Use 'maid restore --run {}' to bring files back.",
                run, run
            ));
        }
    }

    fn restore_summary(report: &RunReport) {
        if report.trash_runs.is_empty() {
            if let Some(run) = &report.trash_run {
                Self::info(&format!("Restored trash run {}", run));
            }
            return;
        }

        Self::header("TRASH RUNS");
        for run in &report.trash_runs {
            let file_word = if run.files == 1 { "file" } else { "files" };
            Self::plain(&format!(
                "{}  {} {}",
                run.id.bold(),
                run.files.to_string().green(),
                file_word
            ));
        }
    }

    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark, on stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for `total` operations.
    ///
    /// ```no_run
    /// use maid::output::Reporter;
    /// let pb = Reporter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Prints a table of file counts by category.
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("CATEGORIES");

        let width = category_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (category, count) in category_counts {
            let file_word = if *count == 1 { "file" } else { "files" };
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                file_word,
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            if total_files == 1 { "file" } else { "files" },
            width = width
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Operation, OperationKind, OperationStatus};

    fn outcome(status: OperationStatus) -> OperationOutcome {
        OperationOutcome {
            operation: Operation::new(
                OperationKind::Rename,
                PathBuf::from("/r/A_GUIDE.md"),
                PathBuf::from("/r/guide.md"),
            ),
            status,
        }
    }

    #[test]
    fn test_operation_line_format() {
        assert_eq!(
            Reporter::operation_line(&outcome(OperationStatus::Simulated)),
            "RENAME /r/A_GUIDE.md -> /r/guide.md (simulated)"
        );
        assert_eq!(
            Reporter::operation_line(&outcome(OperationStatus::Failed {
                reason: "destination /r/guide.md already exists".to_string()
            })),
            "RENAME /r/A_GUIDE.md -> /r/guide.md (failed: destination /r/guide.md already exists)"
        );
    }

    #[test]
    fn test_progress_bar_only_for_quiet_real_runs() {
        let quiet = Reporter::new(OutputOptions::default());
        assert!(quiet.progress_bar(3, false).is_some());
        assert!(quiet.progress_bar(3, true).is_none());
        assert!(quiet.progress_bar(0, false).is_none());

        let verbose = Reporter::new(OutputOptions {
            verbose: true,
            json: false,
        });
        assert!(verbose.progress_bar(3, false).is_none());

        let json = Reporter::new(OutputOptions {
            verbose: false,
            json: true,
        });
        assert!(json.progress_bar(3, false).is_none());
    }

    #[test]
    fn test_report_serializes_command_and_paths() {
        let report = RunReport::new(
            RunCommand::Keep,
            PathBuf::from("/r"),
            ExecutionReport::default(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["command"], "keep");
        assert_eq!(json["root"], "/r");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_serialize_lossily() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = Path::new("/r").join(OsStr::from_bytes(b"dir\xff"));
        let report = RunReport::new(RunCommand::Clean, root, ExecutionReport::default());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["root"], "/r/dir\u{fffd}");
    }

    #[test]
    fn test_summary_counts() {
        let execution = ExecutionReport {
            dry_run: false,
            outcomes: vec![
                outcome(OperationStatus::Executed),
                outcome(OperationStatus::Failed {
                    reason: "x".to_string(),
                }),
            ],
        };
        let report = RunReport::new(RunCommand::Clean, PathBuf::from("/r"), execution).summarize();
        assert_eq!(
            report.summary,
            RunSummary {
                files_scanned: 0,
                operations_planned: 2,
                executed: 1,
                simulated: 0,
                failed: 1,
            }
        );
    }
}
