//! Keep-or-trash decisions for `maid keep`.
//!
//! A file is important when any enabled rule says so. Everything else is
//! moved into a fresh trash run, never deleted. With `duplicate_content`
//! enabled, later copies of a file are trashed whatever the other rules say.

use crate::config::RetentionConfig;
use crate::executor::{Operation, OperationKind};
use crate::file_category::Category;
use crate::scanner::FileRecord;
use crate::trash::{new_run_id, trash_root};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// A retention rule. All but `DuplicateContent` are reasons to keep a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionRule {
    /// Modified within the configured number of days.
    RecentModification,
    /// Recognised and already carrying its canonical name.
    CanonicalNamePresent,
    /// A name token is one of the configured markers.
    ExplicitMarkerToken,
    /// Most recently modified file of its category.
    LatestPerCategory,
    /// File with the most words in its category.
    MostComprehensivePerCategory,
    /// The category is one of the configured protected categories.
    ProtectedCategory,
    /// Byte-identical copies of an older file are trashed.
    DuplicateContent,
}

impl RetentionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionRule::RecentModification => "recent_modification",
            RetentionRule::CanonicalNamePresent => "canonical_name_present",
            RetentionRule::ExplicitMarkerToken => "explicit_marker_token",
            RetentionRule::LatestPerCategory => "latest_per_category",
            RetentionRule::MostComprehensivePerCategory => "most_comprehensive_per_category",
            RetentionRule::ProtectedCategory => "protected_category",
            RetentionRule::DuplicateContent => "duplicate_content",
        }
    }

    fn reads_content(&self) -> bool {
        matches!(
            self,
            RetentionRule::MostComprehensivePerCategory | RetentionRule::DuplicateContent
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Keep {
        rule: RetentionRule,
    },
    Trash,
    /// Same bytes as `original`, which is older.
    Duplicate {
        #[serde(serialize_with = "crate::output::serialize_path")]
        original: PathBuf,
    },
}

impl Verdict {
    /// Whether the file goes to the trash.
    pub fn is_trash(&self) -> bool {
        !matches!(self, Verdict::Keep { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetentionDecision {
    #[serde(serialize_with = "crate::output::serialize_path")]
    pub path: PathBuf,
    pub category: Category,
    #[serde(flatten)]
    pub verdict: Verdict,
}

/// Decisions plus the moves that carry them out.
#[derive(Debug, Clone, Serialize)]
pub struct RetentionPlan {
    pub run_id: String,
    #[serde(serialize_with = "crate::output::serialize_path")]
    pub run_dir: PathBuf,
    pub decisions: Vec<RetentionDecision>,
    pub operations: Vec<Operation>,
}

/// What the content rules need to know about one file.
struct ContentFacts {
    words: usize,
    digest: Vec<u8>,
}

impl ContentFacts {
    fn read(path: &Path) -> Option<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("cannot read {}: {}", path.display(), e);
                return None;
            }
        };
        let words = if bytes.contains(&0) {
            0
        } else {
            String::from_utf8_lossy(&bytes).split_whitespace().count()
        };
        Some(Self {
            words,
            digest: Sha256::digest(&bytes).to_vec(),
        })
    }
}

pub struct RetentionPolicy {
    rules: Vec<RetentionRule>,
    recent: Duration,
    markers: Vec<String>,
    protected: Vec<Category>,
}

impl RetentionPolicy {
    pub fn new(config: &RetentionConfig) -> Self {
        Self {
            rules: config.rules.clone(),
            recent: Duration::days(i64::from(config.recent_days)),
            markers: config.markers.clone(),
            protected: config.protected_categories.clone(),
        }
    }

    fn enabled(&self, rule: RetentionRule) -> bool {
        self.rules.contains(&rule)
    }

    /// Decides every record. `canonical_name` must already be computed.
    ///
    /// Rules are tried in configured order and the first match is reported.
    /// File contents are only read when a content rule is enabled.
    pub fn evaluate(&self, records: &[FileRecord], now: DateTime<Utc>) -> Vec<RetentionDecision> {
        let facts: Vec<Option<ContentFacts>> = if self.rules.iter().any(RetentionRule::reads_content)
        {
            records.iter().map(|r| ContentFacts::read(&r.path)).collect()
        } else {
            records.iter().map(|_| None).collect()
        };

        let latest = if self.enabled(RetentionRule::LatestPerCategory) {
            latest_per_category(records)
        } else {
            HashMap::new()
        };
        let comprehensive = if self.enabled(RetentionRule::MostComprehensivePerCategory) {
            most_comprehensive_per_category(records, &facts)
        } else {
            HashSet::new()
        };
        let duplicates = if self.enabled(RetentionRule::DuplicateContent) {
            duplicate_originals(records, &facts)
        } else {
            HashMap::new()
        };

        records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let verdict = match duplicates.get(&index) {
                    Some(&original) => Verdict::Duplicate {
                        original: records[original].path.clone(),
                    },
                    None => self
                        .rules
                        .iter()
                        .copied()
                        .find(|rule| match rule {
                            RetentionRule::RecentModification => {
                                now - record.modified <= self.recent
                            }
                            RetentionRule::CanonicalNamePresent => {
                                record.category != Category::Unknown
                                    && record.file_name() == record.canonical_name
                            }
                            RetentionRule::ExplicitMarkerToken => {
                                record.tokens.iter().any(|token| {
                                    self.markers.iter().any(|m| m.eq_ignore_ascii_case(token))
                                })
                            }
                            RetentionRule::LatestPerCategory => {
                                latest.get(&record.category) == Some(&record.path.as_path())
                            }
                            RetentionRule::MostComprehensivePerCategory => {
                                comprehensive.contains(&index)
                            }
                            RetentionRule::ProtectedCategory => {
                                self.protected.contains(&record.category)
                            }
                            RetentionRule::DuplicateContent => false,
                        })
                        .map_or(Verdict::Trash, |rule| Verdict::Keep { rule }),
                };

                log::debug!("{}: {:?}", record.path.display(), verdict);
                RetentionDecision {
                    path: record.path.clone(),
                    category: record.category,
                    verdict,
                }
            })
            .collect()
    }

    /// Decides every record and plans a `TrashMove` for each discarded one
    /// into `root/.maid-trash/<run-id>/<relative path>`.
    pub fn retain(&self, root: &Path, records: &[FileRecord], now: DateTime<Utc>) -> RetentionPlan {
        let run_id = new_run_id(root, now);
        let run_dir = trash_root(root).join(&run_id);
        let decisions = self.evaluate(records, now);

        let operations: Vec<Operation> = records
            .iter()
            .zip(&decisions)
            .filter(|(_, decision)| decision.verdict.is_trash())
            .map(|(record, _)| {
                Operation::new(
                    OperationKind::TrashMove,
                    record.path.clone(),
                    run_dir.join(&record.relative_path),
                )
            })
            .collect();

        log::info!(
            "keeping {} of {} files, trash run {}",
            records.len() - operations.len(),
            records.len(),
            run_id
        );

        RetentionPlan {
            run_id,
            run_dir,
            decisions,
            operations,
        }
    }
}

/// Newest file of each recognised category, ties going to the later path.
fn latest_per_category(records: &[FileRecord]) -> HashMap<Category, &Path> {
    let mut latest: HashMap<Category, &FileRecord> = HashMap::new();
    for record in records.iter().filter(|r| r.category != Category::Unknown) {
        latest
            .entry(record.category)
            .and_modify(|current| {
                if (record.modified, &record.path) > (current.modified, &current.path) {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    latest
        .into_iter()
        .map(|(category, record)| (category, record.path.as_path()))
        .collect()
}

/// Index of the wordiest readable file of each recognised category. Ties go
/// to the newer file, then the later path. Empty files never count.
fn most_comprehensive_per_category(
    records: &[FileRecord],
    facts: &[Option<ContentFacts>],
) -> HashSet<usize> {
    let mut best: HashMap<Category, (usize, usize)> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        let Some(words) = facts[index].as_ref().map(|f| f.words) else {
            continue;
        };
        if record.category == Category::Unknown || words == 0 {
            continue;
        }

        let key = move |i: usize, w: usize| (w, records[i].modified, &records[i].path);
        best.entry(record.category)
            .and_modify(|current| {
                if key(index, words) > key(current.0, current.1) {
                    *current = (index, words);
                }
            })
            .or_insert((index, words));
    }
    best.into_values().map(|(index, _)| index).collect()
}

/// Maps every later copy of identical content to the index of the oldest
/// copy (then the first path).
fn duplicate_originals(
    records: &[FileRecord],
    facts: &[Option<ContentFacts>],
) -> HashMap<usize, usize> {
    let mut groups: HashMap<&[u8], Vec<usize>> = HashMap::new();
    for (index, fact) in facts.iter().enumerate() {
        if let Some(fact) = fact {
            groups.entry(fact.digest.as_slice()).or_default().push(index);
        }
    }

    let mut duplicates = HashMap::new();
    for mut members in groups.into_values().filter(|m| m.len() > 1) {
        members.sort_by(|&a, &b| {
            (records[a].modified, &records[a].path).cmp(&(records[b].modified, &records[b].path))
        });
        let original = members[0];
        for &copy in &members[1..] {
            duplicates.insert(copy, original);
        }
    }
    duplicates
}
