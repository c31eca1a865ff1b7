//! Layout of the recoverable trash.
//!
//! Every `keep` run gets its own directory under `<root>/.maid-trash/`, named
//! after the UTC time of the run. Files keep their path relative to the root
//! inside it, so a run can be restored without any extra bookkeeping.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory under the root that holds all trash runs.
pub const TRASH_DIR_NAME: &str = ".maid-trash";

/// Format of a run id, filesystem-safe ISO 8601 basic format.
const RUN_ID_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// One trash run.
#[derive(Debug, Clone, Serialize)]
pub struct TrashRun {
    pub id: String,
    #[serde(serialize_with = "crate::output::serialize_path")]
    pub path: PathBuf,
    /// Number of files currently held by this run.
    pub files: usize,
}

pub fn trash_root(root: &Path) -> PathBuf {
    root.join(TRASH_DIR_NAME)
}

/// Picks the id for a run starting at `now`.
///
/// Adds `-2`, `-3`, ... when a run with the same timestamp already exists so
/// runs never share a directory.
pub fn new_run_id(root: &Path, now: DateTime<Utc>) -> String {
    let base = now.format(RUN_ID_FORMAT).to_string();
    let trash = trash_root(root);

    if !trash.join(&base).exists() {
        return base;
    }

    let mut counter = 2;
    loop {
        let candidate = format!("{}-{}", base, counter);
        if !trash.join(&candidate).exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Lists the runs in the trash, oldest first.
///
/// Returns an empty list when there is no trash directory.
pub fn list_runs(root: &Path) -> io::Result<Vec<TrashRun>> {
    let trash = trash_root(root);
    if !trash.is_dir() {
        return Ok(Vec::new());
    }

    let mut runs = Vec::new();
    for entry in fs::read_dir(&trash)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        runs.push(TrashRun {
            id: entry.file_name().to_string_lossy().into_owned(),
            files: run_files(&path).len(),
            path,
        });
    }

    runs.sort_by(|a, b| run_sort_key(&a.id).cmp(&run_sort_key(&b.id)));
    Ok(runs)
}

/// `20261018T101500Z-10` sorts after `20261018T101500Z-2`.
fn run_sort_key(id: &str) -> (&str, u32) {
    match id.rsplit_once('-') {
        Some((base, suffix)) => match suffix.parse() {
            Ok(n) => (base, n),
            Err(_) => (id, 1),
        },
        None => (id, 1),
    }
}

/// Files held by a run, relative to the run directory, sorted.
pub fn run_files(run_path: &Path) -> Vec<PathBuf> {
    WalkDir::new(run_path)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(run_path)
                .ok()
                .map(Path::to_path_buf)
        })
        .collect()
}

/// Removes empty directories below and including `dir`, deepest first.
///
/// Directories that still hold anything are left alone.
pub fn prune_empty_dirs(dir: &Path) -> io::Result<()> {
    let dirs: Vec<PathBuf> = WalkDir::new(dir)
        .contents_first(true)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect();

    for path in dirs {
        if fs::read_dir(&path)?.next().is_none() {
            log::debug!("removing empty directory {}", path.display());
            fs::remove_dir(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, h, m, s).unwrap()
    }

    #[test]
    fn test_run_id_format() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(new_run_id(temp_dir.path(), at(10, 15, 0)), "20261018T101500Z");
    }

    #[test]
    fn test_run_id_never_reuses_directory() {
        let temp_dir = TempDir::new().unwrap();
        let trash = trash_root(temp_dir.path());
        fs::create_dir_all(trash.join("20261018T101500Z")).unwrap();
        fs::create_dir_all(trash.join("20261018T101500Z-2")).unwrap();

        assert_eq!(
            new_run_id(temp_dir.path(), at(10, 15, 0)),
            "20261018T101500Z-3"
        );
    }

    #[test]
    fn test_list_runs_without_trash() {
        let temp_dir = TempDir::new().unwrap();
        assert!(list_runs(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_list_runs_sorted_with_counts() {
        let temp_dir = TempDir::new().unwrap();
        let trash = trash_root(temp_dir.path());
        for id in ["20261018T101500Z-10", "20261018T101500Z", "20261018T101500Z-2"] {
            fs::create_dir_all(trash.join(id).join("docs")).unwrap();
        }
        fs::write(trash.join("20261018T101500Z/docs/a.md"), "a").unwrap();
        fs::write(trash.join("20261018T101500Z/b.md"), "b").unwrap();

        let runs = list_runs(temp_dir.path()).unwrap();
        let ids: Vec<&str> = runs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["20261018T101500Z", "20261018T101500Z-2", "20261018T101500Z-10"]
        );
        assert_eq!(runs[0].files, 2);
        assert_eq!(runs[1].files, 0);
    }

    #[test]
    fn test_prune_keeps_non_empty_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let run = temp_dir.path().join("run");
        fs::create_dir_all(run.join("empty/deeper")).unwrap();
        fs::create_dir_all(run.join("full")).unwrap();
        fs::write(run.join("full/x.md"), "x").unwrap();

        prune_empty_dirs(&run).unwrap();

        assert!(!run.join("empty").exists());
        assert!(run.join("full/x.md").exists());
    }

    #[test]
    fn test_prune_removes_fully_empty_tree() {
        let temp_dir = TempDir::new().unwrap();
        let run = temp_dir.path().join("run");
        fs::create_dir_all(run.join("a/b")).unwrap();

        prune_empty_dirs(&run).unwrap();
        assert!(!run.exists());
    }
}
