//! Moving a trash run back into the root.
//!
//! Restoring is planned like any other batch: one `Move` per file from
//! `.maid-trash/<run>/<rel>` back to `<root>/<rel>`, handed to the executor.
//! A file whose original location has been taken again fails and stays in
//! the trash.

use crate::executor::{ExecutionReport, Operation, OperationKind};
use crate::trash::{self, TrashRun};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("no trash found under {}", .0.display())]
    NoTrash(PathBuf),
    #[error("trash run '{0}' not found")]
    RunNotFound(String),
    #[error("cannot read trash: {0}")]
    Io(#[from] io::Error),
}

/// A run and the moves that put its files back.
#[derive(Debug, Clone)]
pub struct RestorePlan {
    pub run: TrashRun,
    pub operations: Vec<Operation>,
}

pub struct TrashRestorer;

impl TrashRestorer {
    /// Plans the restore of `run_id`, or of the latest run when `None`.
    ///
    /// # Errors
    ///
    /// * **No trash**: the root has no trash runs
    /// * **Unknown run**: `run_id` does not name a run
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use maid::restore::TrashRestorer;
    /// use std::path::Path;
    ///
    /// match TrashRestorer::plan(Path::new("/path/to/directory"), None) {
    ///     Ok(plan) => println!("{} files in run {}", plan.operations.len(), plan.run.id),
    ///     Err(e) => eprintln!("Restore failed: {}", e),
    /// }
    /// ```
    pub fn plan(root: &Path, run_id: Option<&str>) -> Result<RestorePlan, RestoreError> {
        let mut runs = trash::list_runs(root)?;
        if runs.is_empty() {
            return Err(RestoreError::NoTrash(root.to_path_buf()));
        }

        let run = match run_id {
            Some(id) => {
                let position = runs
                    .iter()
                    .position(|run| run.id == id)
                    .ok_or_else(|| RestoreError::RunNotFound(id.to_string()))?;
                runs.swap_remove(position)
            }
            None => runs.pop().ok_or_else(|| RestoreError::NoTrash(root.to_path_buf()))?,
        };

        let operations = trash::run_files(&run.path)
            .into_iter()
            .map(|relative| {
                Operation::new(
                    OperationKind::Move,
                    run.path.join(&relative),
                    root.join(&relative),
                )
            })
            .collect();

        Ok(RestorePlan { run, operations })
    }

    /// Removes what a real restore left empty: directories of the run and,
    /// if nothing else is in it, the trash itself.
    pub fn finish(root: &Path, plan: &RestorePlan, report: &ExecutionReport) -> io::Result<()> {
        if report.dry_run {
            return Ok(());
        }

        if plan.run.path.exists() {
            trash::prune_empty_dirs(&plan.run.path)?;
        }

        let trash_root = trash::trash_root(root);
        if trash_root.is_dir() && fs::read_dir(&trash_root)?.next().is_none() {
            fs::remove_dir(&trash_root)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;
    use crate::trash::TRASH_DIR_NAME;
    use tempfile::TempDir;

    fn trashed(root: &Path, run: &str, relative: &str, content: &str) {
        let path = root.join(TRASH_DIR_NAME).join(run).join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_restore_no_trash() {
        let temp_dir = TempDir::new().unwrap();
        let result = TrashRestorer::plan(temp_dir.path(), None);
        assert!(matches!(result, Err(RestoreError::NoTrash(_))));
    }

    #[test]
    fn test_restore_unknown_run() {
        let temp_dir = TempDir::new().unwrap();
        trashed(temp_dir.path(), "20261018T101500Z", "a.md", "a");
        let result = TrashRestorer::plan(temp_dir.path(), Some("19990101T000000Z"));
        assert!(matches!(result, Err(RestoreError::RunNotFound(_))));
    }

    #[test]
    fn test_restore_latest_run_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        trashed(root, "20261018T101500Z", "old.md", "old");
        trashed(root, "20261018T101500Z-2", "docs/new.md", "new");

        let plan = TrashRestorer::plan(root, None).unwrap();
        assert_eq!(plan.run.id, "20261018T101500Z-2");
        assert_eq!(plan.operations.len(), 1);
        assert_eq!(plan.operations[0].destination, root.join("docs/new.md"));
    }

    #[test]
    fn test_restore_round_trip_and_prune() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        trashed(root, "20261018T101500Z", "docs/deep/a.md", "a");
        trashed(root, "20261018T101500Z", "b.md", "b");

        let plan = TrashRestorer::plan(root, Some("20261018T101500Z")).unwrap();
        let report = Executor::new(false)
            .execute(root, plan.operations.clone())
            .unwrap();
        TrashRestorer::finish(root, &plan, &report).unwrap();

        assert_eq!(report.executed(), 2);
        assert_eq!(fs::read_to_string(root.join("docs/deep/a.md")).unwrap(), "a");
        assert_eq!(fs::read_to_string(root.join("b.md")).unwrap(), "b");
        assert!(!root.join(TRASH_DIR_NAME).exists());
    }

    #[test]
    fn test_restore_conflict_stays_in_trash() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        trashed(root, "20261018T101500Z", "a.md", "trashed");
        fs::write(root.join("a.md"), "new file").unwrap();

        let plan = TrashRestorer::plan(root, None).unwrap();
        let report = Executor::new(false)
            .execute(root, plan.operations.clone())
            .unwrap();
        TrashRestorer::finish(root, &plan, &report).unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(fs::read_to_string(root.join("a.md")).unwrap(), "new file");
        assert!(
            root.join(TRASH_DIR_NAME)
                .join("20261018T101500Z/a.md")
                .exists()
        );
    }
}
