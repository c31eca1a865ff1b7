//! Turns named records into an ordered list of filesystem operations.

use crate::classifier::tokenize;
use crate::executor::{Operation, OperationKind};
use crate::file_category::Category;
use crate::namer::Namer;
use crate::scanner::{FileRecord, read_excerpt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where files end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Rename files where they are.
    InPlace,
    /// Move recognised files into `root/<category-dir>/`.
    Restructure,
}

#[derive(Debug, Error)]
pub enum PlanError {
    /// Two operations would write the same path.
    #[error("{} and {} would both be written to {}", .first.display(), .second.display(), .destination.display())]
    DuplicateDestination {
        destination: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Script subdirectories, in the order they are tried. A script goes to the
/// first one with a name or content token starting with one of its prefixes.
const SCRIPT_SUBDIRS: &[(&str, &[&str])] = &[
    ("setup", &["install", "setup"]),
    ("tests", &["test"]),
    ("build", &["build"]),
];

pub struct Planner {
    root: PathBuf,
    mode: PlanMode,
    script_subdirs: bool,
}

impl Planner {
    /// `root` must be the absolute root the records were scanned from.
    pub fn new(root: &Path, mode: PlanMode) -> Self {
        Self {
            root: root.to_path_buf(),
            mode,
            script_subdirs: false,
        }
    }

    /// Restructure scripts into `scripts/<setup|tests|build>/` by purpose.
    pub fn with_script_subdirs(mut self, enabled: bool) -> Self {
        self.script_subdirs = enabled;
        self
    }

    /// Sets the destination directory of every record for this mode.
    pub fn assign_destinations(&self, records: &mut [FileRecord]) {
        for record in records.iter_mut() {
            record.destination_dir = match (self.mode, record.category.dir_name()) {
                (PlanMode::Restructure, Some(dir_name)) => {
                    let dir = self.root.join(dir_name);
                    match self.script_subdir(record) {
                        Some(subdir) => dir.join(subdir),
                        None => dir,
                    }
                }
                _ => record.current_dir().to_path_buf(),
            };
        }
    }

    fn script_subdir(&self, record: &FileRecord) -> Option<&'static str> {
        if !self.script_subdirs || record.category != Category::Script {
            return None;
        }

        let mut tokens: Vec<String> = record.tokens.iter().map(|t| t.to_lowercase()).collect();
        if let Some(content) = read_excerpt(&record.path, usize::MAX) {
            tokens.extend(tokenize(&content).iter().map(|t| t.to_lowercase()));
        }

        SCRIPT_SUBDIRS
            .iter()
            .find(|(_, prefixes)| {
                tokens
                    .iter()
                    .any(|token| prefixes.iter().any(|prefix| token.starts_with(prefix)))
            })
            .map(|(subdir, _)| *subdir)
    }

    /// Names the records, resolves collisions and plans the operations.
    ///
    /// Records that are already where they should be produce nothing. The
    /// result is sorted by source path, except that an operation writing to
    /// another operation's source is placed after it.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::DuplicateDestination`] if two operations would
    /// target the same path, compared case-insensitively.
    pub fn plan(
        &self,
        records: &mut [FileRecord],
        namer: &Namer,
    ) -> Result<Vec<Operation>, PlanError> {
        namer.name_records(records);
        self.assign_destinations(records);
        namer.resolve_collisions(records);

        let mut operations: Vec<Operation> = records
            .iter()
            .filter(|record| !record.is_in_place())
            .map(|record| {
                let kind = if record.destination_dir == record.current_dir() {
                    OperationKind::Rename
                } else {
                    OperationKind::Move
                };
                Operation::new(kind, record.path.clone(), record.target_path())
            })
            .collect();

        verify_unique_destinations(&operations)?;

        operations.sort_by(|a, b| a.source.cmp(&b.source));
        let operations = order_dependencies(operations);

        log::info!(
            "planned {} operations for {} files ({:?})",
            operations.len(),
            records.len(),
            self.mode
        );
        Ok(operations)
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

fn verify_unique_destinations(operations: &[Operation]) -> Result<(), PlanError> {
    let mut seen: HashMap<String, &Operation> = HashMap::new();
    for operation in operations {
        if let Some(first) = seen.insert(path_key(&operation.destination), operation) {
            return Err(PlanError::DuplicateDestination {
                destination: operation.destination.clone(),
                first: first.source.clone(),
                second: operation.source.clone(),
            });
        }
    }
    Ok(())
}

/// Stable ordering in which an operation never overwrites a path another
/// pending operation still has to move away.
///
/// Falls back to the given order for operations caught in a cycle; the
/// executor then reports the blocked destination as a per-file failure.
fn order_dependencies(operations: Vec<Operation>) -> Vec<Operation> {
    let sources: HashMap<String, usize> = operations
        .iter()
        .enumerate()
        .map(|(index, op)| (path_key(&op.source), index))
        .collect();

    let mut placed: HashSet<usize> = HashSet::new();
    let mut order: Vec<usize> = Vec::with_capacity(operations.len());

    while order.len() < operations.len() {
        let before = order.len();
        for (index, operation) in operations.iter().enumerate() {
            if placed.contains(&index) {
                continue;
            }
            let blocked = sources
                .get(&path_key(&operation.destination))
                .is_some_and(|&other| other != index && !placed.contains(&other));
            if !blocked {
                placed.insert(index);
                order.push(index);
            }
        }

        if order.len() == before {
            log::warn!("rename cycle detected, keeping remaining operations in path order");
            for index in 0..operations.len() {
                if placed.insert(index) {
                    order.push(index);
                }
            }
        }
    }

    let mut slots: Vec<Option<Operation>> = operations.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}
