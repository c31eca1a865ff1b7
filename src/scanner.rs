//! Directory scanning.
//!
//! Validates the root directory, enumerates candidate files and builds one
//! [`FileRecord`] per file. A bad root is fatal; a file whose metadata cannot
//! be read, or whose name is not valid UTF-8, is only skipped.

use crate::classifier::{Confidence, tokenize};
use crate::config::CompiledFilters;
use crate::file_category::Category;
use crate::trash::TRASH_DIR_NAME;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Bytes inspected when deciding whether a file is text.
const SNIFF_LEN: usize = 8192;

/// The root directory cannot be used. Nothing is touched when this occurs.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("root path {0} does not exist")]
    NotFound(PathBuf),
    #[error("root path {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("root path {path} is not readable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Checks that `root` is a readable directory and returns its absolute form.
pub fn ensure_root(root: &Path) -> Result<PathBuf, RootError> {
    let metadata = fs::metadata(root).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RootError::NotFound(root.to_path_buf()),
        _ => RootError::Unreadable {
            path: root.to_path_buf(),
            source: e,
        },
    })?;

    if !metadata.is_dir() {
        return Err(RootError::NotADirectory(root.to_path_buf()));
    }

    fs::read_dir(root).map_err(|e| RootError::Unreadable {
        path: root.to_path_buf(),
        source: e,
    })?;

    fs::canonicalize(root).map_err(|e| RootError::Unreadable {
        path: root.to_path_buf(),
        source: e,
    })
}

/// One discovered file and everything decided about it during a run.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    /// Absolute path, the identity of the record within a run.
    #[serde(serialize_with = "crate::output::serialize_path")]
    pub path: PathBuf,
    /// Path relative to the scanned root.
    #[serde(serialize_with = "crate::output::serialize_path")]
    pub relative_path: PathBuf,
    /// File name without extension.
    pub base_name: String,
    pub extension: Option<String>,
    /// Tokens of `base_name`, see [`tokenize`].
    pub tokens: Vec<String>,
    pub modified: DateTime<Utc>,
    pub size: u64,
    pub category: Category,
    pub confidence: Confidence,
    /// Computed file name; equal to the current name when nothing changes.
    pub canonical_name: String,
    /// Computed target directory.
    #[serde(serialize_with = "crate::output::serialize_path")]
    pub destination_dir: PathBuf,
}

impl FileRecord {
    /// Builds an unclassified record for `path` under `root`.
    pub fn new(root: &Path, path: PathBuf, modified: DateTime<Utc>, size: u64) -> Self {
        let relative_path = path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());
        let base_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let destination_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());

        Self {
            tokens: tokenize(&base_name),
            path,
            relative_path,
            base_name,
            extension,
            modified,
            size,
            category: Category::Unknown,
            confidence: Confidence::None,
            canonical_name: file_name,
            destination_dir,
        }
    }

    /// Current file name including extension.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Directory the file currently lives in.
    pub fn current_dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }

    /// Where the file should end up.
    pub fn target_path(&self) -> PathBuf {
        self.destination_dir.join(&self.canonical_name)
    }

    /// True when the file already is where it should be.
    pub fn is_in_place(&self) -> bool {
        self.target_path() == self.path
    }
}

/// A file that was seen but could not be turned into a record.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    #[serde(serialize_with = "crate::output::serialize_path")]
    pub path: PathBuf,
    pub reason: String,
}

/// Everything a scan produced.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub records: Vec<FileRecord>,
    pub skipped: Vec<SkippedFile>,
}

/// Enumerates candidate files under a root.
pub struct Scanner {
    filters: CompiledFilters,
    extensions: HashSet<String>,
    recursive: bool,
}

impl Scanner {
    pub fn new(filters: CompiledFilters, extensions: &[String], recursive: bool) -> Self {
        Self {
            filters,
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            recursive,
        }
    }

    /// Scans `root`, returning records sorted by path.
    ///
    /// `root` must already be absolute (see [`ensure_root`]).
    pub fn scan(&self, root: &Path) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let hidden_dirs = self.filters.hidden_files_enabled();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                name != TRASH_DIR_NAME && (hidden_dirs || !name.starts_with('.'))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    log::warn!("skipping {}: {}", path.display(), e);
                    outcome.skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.has_wanted_extension(entry.path()) {
                continue;
            }

            if entry.file_name().to_str().is_none() {
                log::warn!("skipping {}: file name is not valid UTF-8", entry.path().display());
                outcome.skipped.push(SkippedFile {
                    path: entry.path().to_path_buf(),
                    reason: "file name is not valid UTF-8".to_string(),
                });
                continue;
            }

            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if !self.filters.should_include(relative) {
                log::debug!("filtered out {}", relative.display());
                continue;
            }

            match entry.metadata() {
                Ok(metadata) => {
                    let modified = metadata
                        .modified()
                        .map(DateTime::<Utc>::from)
                        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                    outcome.records.push(FileRecord::new(
                        root,
                        entry.path().to_path_buf(),
                        modified,
                        metadata.len(),
                    ));
                }
                Err(e) => {
                    log::warn!("skipping {}: {}", entry.path().display(), e);
                    outcome.skipped.push(SkippedFile {
                        path: entry.path().to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        log::info!(
            "scanned {}: {} candidate files, {} skipped",
            root.display(),
            outcome.records.len(),
            outcome.skipped.len()
        );
        outcome
    }

    fn has_wanted_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| self.extensions.contains(&e.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or(false)
    }
}

/// Reads the first `lines` lines of a text file.
///
/// Returns `None` for unreadable files and for anything that looks binary:
/// content `infer` recognises as a non-text format, or a NUL byte in the
/// leading bytes.
pub fn read_excerpt(path: &Path, lines: usize) -> Option<String> {
    let mut file = File::open(path).ok()?;
    let mut buffer = Vec::with_capacity(SNIFF_LEN);
    file.by_ref()
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut buffer)
        .ok()?;

    if let Some(kind) = infer::get(&buffer)
        && !kind.mime_type().starts_with("text/")
    {
        log::debug!(
            "not reading {}: detected {}",
            path.display(),
            kind.mime_type()
        );
        return None;
    }
    if buffer.contains(&0) {
        return None;
    }

    let text = String::from_utf8_lossy(&buffer);
    let excerpt: Vec<&str> = text.lines().take(lines).collect();
    Some(excerpt.join("\n"))
}
