//! Applies or simulates a list of filesystem operations.
//!
//! Every operation is checked before it runs: the source must exist, the
//! destination must be free, and both the source directory and the nearest
//! existing ancestor of the destination must be writable directories. A failed operation is recorded and the batch carries
//! on. In dry-run mode the same checks run against a simulated view of the
//! tree that includes the effect of earlier simulated operations, so a dry
//! run reports the failures a real run would hit.

use crate::scanner::{RootError, ensure_root};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The kind of change an operation makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// New name, same directory.
    Rename,
    /// New directory, possibly a new name.
    Move,
    /// Move into the trash.
    TrashMove,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Rename => "RENAME",
            OperationKind::Move => "MOVE",
            OperationKind::TrashMove => "TRASH",
        })
    }
}

/// A single planned path change. File contents are never touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub kind: OperationKind,
    #[serde(serialize_with = "crate::output::serialize_path")]
    pub source: PathBuf,
    #[serde(serialize_with = "crate::output::serialize_path")]
    pub destination: PathBuf,
    /// Set once the operation has been applied to the filesystem.
    pub executed: bool,
}

impl Operation {
    pub fn new(kind: OperationKind, source: PathBuf, destination: PathBuf) -> Self {
        Self {
            kind,
            source,
            destination,
            executed: false,
        }
    }
}

/// Why a single operation could not run.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("source {} no longer exists", .0.display())]
    SourceMissing(PathBuf),
    #[error("destination {} already exists", .0.display())]
    DestinationOccupied(PathBuf),
    #[error("{} is not a directory", .0.display())]
    ParentNotDirectory(PathBuf),
    #[error("{} is not writable", .0.display())]
    PermissionDenied(PathBuf),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationStatus {
    Executed,
    Simulated,
    Failed { reason: String },
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Executed => f.write_str("executed"),
            OperationStatus::Simulated => f.write_str("simulated"),
            OperationStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome {
    pub operation: Operation,
    #[serde(flatten)]
    pub status: OperationStatus,
}

impl OperationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, OperationStatus::Failed { .. })
    }
}

/// Outcomes of a batch, in execution order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    pub dry_run: bool,
    pub outcomes: Vec<OperationOutcome>,
}

impl ExecutionReport {
    pub fn executed(&self) -> usize {
        self.count(|s| matches!(s, OperationStatus::Executed))
    }

    pub fn simulated(&self) -> usize {
        self.count(|s| matches!(s, OperationStatus::Simulated))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OperationStatus::Failed { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    fn count(&self, predicate: impl Fn(&OperationStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}

/// Paths changed by earlier simulated operations.
#[derive(Default)]
struct SimulatedView {
    vacated: HashSet<PathBuf>,
    created: HashSet<PathBuf>,
    created_dirs: HashSet<PathBuf>,
}

impl SimulatedView {
    fn exists(&self, path: &Path) -> bool {
        if self.created.contains(path) || self.created_dirs.contains(path) {
            return true;
        }
        if self.vacated.contains(path) {
            return false;
        }
        fs::symlink_metadata(path).is_ok()
    }

    fn is_simulated(&self, path: &Path) -> bool {
        self.created.contains(path) || self.vacated.contains(path)
    }

    fn apply(&mut self, operation: &Operation) {
        self.created.remove(&operation.source);
        self.vacated.insert(operation.source.clone());

        self.vacated.remove(&operation.destination);
        self.created.insert(operation.destination.clone());

        for ancestor in operation.destination.ancestors().skip(1) {
            if self.exists(ancestor) {
                break;
            }
            self.created_dirs.insert(ancestor.to_path_buf());
        }
    }
}

/// Applies operations, or only checks them when `dry_run` is set.
pub struct Executor {
    dry_run: bool,
}

impl Executor {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Runs `operations` in order.
    ///
    /// # Errors
    ///
    /// Returns [`RootError`] without touching anything if `root` is no longer
    /// usable. Per-operation failures are reported in the result instead.
    pub fn execute(
        &self,
        root: &Path,
        operations: Vec<Operation>,
    ) -> Result<ExecutionReport, RootError> {
        self.execute_with(root, operations, |_| {})
    }

    /// Like [`Executor::execute`], calling `on_outcome` after each operation.
    pub fn execute_with<F>(
        &self,
        root: &Path,
        operations: Vec<Operation>,
        mut on_outcome: F,
    ) -> Result<ExecutionReport, RootError>
    where
        F: FnMut(&OperationOutcome),
    {
        ensure_root(root)?;

        let mut view = SimulatedView::default();
        let mut report = ExecutionReport {
            dry_run: self.dry_run,
            outcomes: Vec::with_capacity(operations.len()),
        };

        for mut operation in operations {
            let status = match self.run_one(&operation, &mut view) {
                Ok(()) if self.dry_run => OperationStatus::Simulated,
                Ok(()) => {
                    operation.executed = true;
                    OperationStatus::Executed
                }
                Err(e) => {
                    log::warn!(
                        "{} {} failed: {}",
                        operation.kind,
                        operation.source.display(),
                        e
                    );
                    OperationStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            let outcome = OperationOutcome { operation, status };
            on_outcome(&outcome);
            report.outcomes.push(outcome);
        }

        log::info!(
            "{} operations: {} executed, {} simulated, {} failed",
            report.outcomes.len(),
            report.executed(),
            report.simulated(),
            report.failed()
        );
        Ok(report)
    }

    fn run_one(&self, operation: &Operation, view: &mut SimulatedView) -> Result<(), OperationError> {
        preflight(operation, view)?;

        if self.dry_run {
            view.apply(operation);
            return Ok(());
        }

        if let Some(parent) = operation.destination.parent() {
            fs::create_dir_all(parent).map_err(|e| OperationError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        fs::rename(&operation.source, &operation.destination).map_err(|e| {
            OperationError::Io {
                path: operation.source.clone(),
                source: e,
            }
        })?;

        log::debug!(
            "{} {} -> {}",
            operation.kind,
            operation.source.display(),
            operation.destination.display()
        );
        Ok(())
    }
}

fn preflight(operation: &Operation, view: &SimulatedView) -> Result<(), OperationError> {
    if !view.exists(&operation.source) {
        return Err(OperationError::SourceMissing(operation.source.clone()));
    }

    if view.exists(&operation.destination) {
        let same = case_only_rename(&operation.source, &operation.destination)
            && !view.is_simulated(&operation.source)
            && !view.is_simulated(&operation.destination)
            && same_file(&operation.source, &operation.destination);
        if !same {
            return Err(OperationError::DestinationOccupied(
                operation.destination.clone(),
            ));
        }
    }

    // unlinking the source needs write access to its directory too
    if let Some(parent) = operation.source.parent() {
        writable_dir(parent, view)?;
    }
    match operation.destination.parent() {
        Some(parent) => writable_dir(parent, view),
        None => Ok(()),
    }
}

/// Checks the nearest existing ancestor of `dir` (or `dir` itself) is a
/// directory the current user can write to.
fn writable_dir(dir: &Path, view: &SimulatedView) -> Result<(), OperationError> {
    for ancestor in dir.ancestors() {
        if view.created_dirs.contains(ancestor) {
            return Ok(());
        }
        if view.created.contains(ancestor) {
            return Err(OperationError::ParentNotDirectory(ancestor.to_path_buf()));
        }
        if view.vacated.contains(ancestor) {
            continue;
        }
        match fs::metadata(ancestor) {
            Ok(metadata) if !metadata.is_dir() => {
                return Err(OperationError::ParentNotDirectory(ancestor.to_path_buf()));
            }
            Ok(_) if !is_writable(ancestor) => {
                return Err(OperationError::PermissionDenied(ancestor.to_path_buf()));
            }
            Ok(_) => return Ok(()),
            Err(_) => continue,
        }
    }
    Ok(())
}

/// Write and search permission for the calling user, owner and group
/// included.
#[cfg(unix)]
fn is_writable(dir: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    match CString::new(dir.as_os_str().as_bytes()) {
        Ok(path) => unsafe { libc::access(path.as_ptr(), libc::W_OK | libc::X_OK) == 0 },
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_writable(dir: &Path) -> bool {
    fs::metadata(dir).is_ok_and(|metadata| !metadata.permissions().readonly())
}

/// Same directory, names differing only in case.
fn case_only_rename(a: &Path, b: &Path) -> bool {
    match (a.file_name(), b.file_name()) {
        (Some(x), Some(y)) => {
            a.parent() == b.parent()
                && x != y
                && x.to_string_lossy().to_lowercase() == y.to_string_lossy().to_lowercase()
        }
        _ => false,
    }
}

/// True when both paths name the same file, as on a case-insensitive
/// filesystem where `Guide.md` and `guide.md` are one entry.
#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
