//! Canonical file names.
//!
//! A canonical name is `<slug>[-<tokens>].<ext>`: the category slug followed
//! by whatever in the original name still tells files apart. Naming a
//! canonical name again yields the same name, which is what keeps repeated
//! runs from renaming anything.

use crate::file_category::{Category, Lexicon};
use crate::scanner::FileRecord;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// One file asking for a name in a destination directory.
#[derive(Debug, Clone)]
pub struct NameClaim {
    pub path: PathBuf,
    pub file_name: String,
    pub modified: DateTime<Utc>,
    pub desired: String,
}

/// Builds canonical names from an ordered lexicon.
#[derive(Debug, Clone)]
pub struct Namer {
    lexicon: Lexicon,
}

impl Namer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    /// Computes the canonical name for a category, name tokens and extension.
    ///
    /// ```
    /// use maid::file_category::Category;
    /// use maid::namer::Namer;
    ///
    /// let namer = Namer::default();
    /// let tokens = ["DOCUMENTATION", "REFACTORING", "SUMMARY"].map(String::from);
    /// assert_eq!(
    ///     namer.canonical_name(Category::Summary, &tokens, Some("md")),
    ///     "summary-documentation-refactoring.md"
    /// );
    /// ```
    pub fn canonical_name(
        &self,
        category: Category,
        tokens: &[String],
        extension: Option<&str>,
    ) -> String {
        let boilerplate = self.lexicon.boilerplate_mask(category, tokens);
        let mut kept: Vec<String> = Vec::new();
        for (token, dropped) in tokens.iter().zip(boilerplate) {
            if dropped || self.lexicon.is_noise(token) {
                continue;
            }
            let token = token.to_ascii_lowercase();
            if !kept.contains(&token) {
                kept.push(token);
            }
        }

        let mut name = category.slug().to_string();
        for token in &kept {
            name.push('-');
            name.push_str(token);
        }
        if let Some(ext) = extension {
            name.push('.');
            name.push_str(&ext.to_ascii_lowercase());
        }
        name
    }

    /// Returns the name `record` should have, ignoring collisions.
    ///
    /// Unknown files keep the name they have.
    pub fn name_for(&self, record: &FileRecord) -> String {
        if record.category == Category::Unknown {
            return record.file_name();
        }
        self.canonical_name(record.category, &record.tokens, record.extension.as_deref())
    }

    /// Sets `canonical_name` on every record, ignoring collisions.
    pub fn name_records(&self, records: &mut [FileRecord]) {
        for record in records.iter_mut() {
            record.canonical_name = self.name_for(record);
        }
    }

    /// Makes canonical names unique within each destination directory.
    ///
    /// Names already on disk that do not belong to one of `records` are
    /// treated as taken. `destination_dir` and `canonical_name` must be set.
    pub fn resolve_collisions(&self, records: &mut [FileRecord]) {
        let batch: HashSet<PathBuf> = records.iter().map(|r| r.path.clone()).collect();

        let mut by_dir: HashMap<PathBuf, Vec<usize>> = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            by_dir
                .entry(record.destination_dir.clone())
                .or_default()
                .push(index);
        }

        for (dir, indices) in by_dir {
            let occupied = occupied_names(&dir, &batch);
            let claims: Vec<NameClaim> = indices
                .iter()
                .map(|&i| NameClaim {
                    path: records[i].path.clone(),
                    file_name: records[i].file_name(),
                    modified: records[i].modified,
                    desired: records[i].canonical_name.clone(),
                })
                .collect();

            let assigned = assign_unique(&claims, &occupied);
            for (&index, name) in indices.iter().zip(assigned) {
                if name != records[index].canonical_name {
                    log::debug!(
                        "{} renamed to {} to avoid a collision in {}",
                        records[index].canonical_name,
                        name,
                        dir.display()
                    );
                }
                records[index].canonical_name = name;
            }
        }
    }
}

impl Default for Namer {
    fn default() -> Self {
        Self::new(Lexicon::standard())
    }
}

/// Lowercased names present in `dir` that are not files from the batch.
fn occupied_names(dir: &Path, batch: &HashSet<PathBuf>) -> HashSet<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return HashSet::new();
    };

    entries
        .flatten()
        .filter(|entry| !batch.contains(&entry.path()))
        .map(|entry| entry.file_name().to_string_lossy().to_lowercase())
        .collect()
}

/// Assigns one unique name per claim in a single directory.
///
/// The result is parallel to `claims`. `occupied` holds lowercased names that
/// are unavailable. Claimants are served oldest first (then by file name and
/// path): the first claimant of a free name gets it, the others are suffixed
/// with `-2`, `-3`, ... skipping anything occupied, desired or assigned.
pub fn assign_unique(claims: &[NameClaim], occupied: &HashSet<String>) -> Vec<String> {
    let mut order: Vec<usize> = (0..claims.len()).collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (&claims[a], &claims[b]);
        a.modified
            .cmp(&b.modified)
            .then_with(|| a.file_name.cmp(&b.file_name))
            .then_with(|| a.path.cmp(&b.path))
    });

    let desired: HashSet<String> = claims.iter().map(|c| c.desired.to_lowercase()).collect();
    let mut taken: HashSet<String> = HashSet::new();
    let mut assigned: Vec<Option<String>> = vec![None; claims.len()];

    for &index in &order {
        let key = claims[index].desired.to_lowercase();
        if !occupied.contains(&key) && !taken.contains(&key) {
            taken.insert(key);
            assigned[index] = Some(claims[index].desired.clone());
        }
    }

    for &index in &order {
        if assigned[index].is_some() {
            continue;
        }
        let mut counter = 2;
        let name = loop {
            let candidate = with_suffix(&claims[index].desired, counter);
            let key = candidate.to_lowercase();
            if !occupied.contains(&key) && !desired.contains(&key) && !taken.contains(&key) {
                taken.insert(key);
                break candidate;
            }
            counter += 1;
        };
        assigned[index] = Some(name);
    }

    assigned.into_iter().flatten().collect()
}

/// `report-q2.md` with 2 becomes `report-q2-2.md`.
fn with_suffix(name: &str, counter: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, counter, ext),
        _ => format!("{}-{}", name, counter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, tokenize};
    use chrono::TimeZone;

    fn name(stem: &str, ext: &str) -> String {
        let classification = Classifier::default().classify(stem, Some(ext), None);
        let namer = Namer::default();
        if classification.category == Category::Unknown {
            return format!("{}.{}", stem, ext);
        }
        namer.canonical_name(classification.category, &tokenize(stem), Some(ext))
    }

    fn claim(path: &str, secs: i64, desired: &str) -> NameClaim {
        NameClaim {
            path: PathBuf::from(path),
            file_name: Path::new(path)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned(),
            modified: Utc.timestamp_opt(secs, 0).unwrap(),
            desired: desired.to_string(),
        }
    }

    #[test]
    fn test_documented_examples() {
        assert_eq!(
            name("DOCUMENTATION_REFACTORING_SUMMARY", "md"),
            "summary-documentation-refactoring.md"
        );
        assert_eq!(name("IMPLEMENTATION_RUBRIC", "md"), "rubric-implementation.md");
        assert_eq!(name("setup-environment", "sh"), "script-setup-environment.sh");
        assert_eq!(name("STATUS_REPORT_Q2", "md"), "report-status-q2.md");
    }

    #[test]
    fn test_noise_duplicates_and_identifiers() {
        assert_eq!(name("Final_Status_Update_Q3_copy", "MD"), "status-q3.md");
        assert_eq!(name("the_API_API_guide", "md"), "guide-api.md");
        assert_eq!(name("SUMMARY", "md"), "summary.md");
    }

    #[test]
    fn test_phrase_keywords_dropped_from_names() {
        assert_eq!(name("HOW_TO_DEPLOY", "md"), "guide-deploy.md");
        assert_eq!(name("IMPLEMENTATION_COMPLETE", "md"), "report-implementation.md");
        // a lone "to" is not part of the phrase
        assert_eq!(name("guide_to_deploy", "md"), "guide-to-deploy.md");
    }

    #[test]
    fn test_non_ascii_untouched() {
        assert_eq!(name("Résumé_SUMMARY", "md"), "summary-résumé.md");
        assert_eq!(name("笔记_Guide", "md"), "guide-笔记.md");
    }

    #[test]
    fn test_canonical_name_is_fixpoint() {
        for stem in [
            "DOCUMENTATION_REFACTORING_SUMMARY",
            "IMPLEMENTATION_RUBRIC",
            "STATUS_REPORT_Q2",
            "Final_Status_Update_Q3_copy",
            "GUIDE_SUMMARY",
            "HOW_TO_DEPLOY",
            "IMPLEMENTATION_COMPLETE",
        ] {
            let once = name(stem, "md");
            let once_stem = once.trim_end_matches(".md");
            assert_eq!(name(once_stem, "md"), once, "not a fixpoint: {}", stem);
        }

        let script = name("setup-environment", "sh");
        assert_eq!(name(script.trim_end_matches(".sh"), "sh"), script);
    }

    #[test]
    fn test_unknown_keeps_name() {
        assert_eq!(name("notes", "md"), "notes.md");
    }

    #[test]
    fn test_suffix_helper() {
        assert_eq!(with_suffix("report-q2.md", 2), "report-q2-2.md");
        assert_eq!(with_suffix("report", 3), "report-3");
        assert_eq!(with_suffix(".md", 2), ".md-2");
    }

    #[test]
    fn test_earliest_claimant_wins() {
        let claims = vec![
            claim("/r/b.md", 200, "report-status-q2.md"),
            claim("/r/a.md", 100, "report-status-q2.md"),
        ];
        let assigned = assign_unique(&claims, &HashSet::new());
        assert_eq!(assigned, vec!["report-status-q2-2.md", "report-status-q2.md"]);
    }

    #[test]
    fn test_ties_broken_by_file_name() {
        let claims = vec![
            claim("/r/zeta.md", 100, "summary.md"),
            claim("/r/alpha.md", 100, "summary.md"),
        ];
        let assigned = assign_unique(&claims, &HashSet::new());
        assert_eq!(assigned, vec!["summary-2.md", "summary.md"]);
    }

    #[test]
    fn test_suffix_skips_occupied_and_desired_names() {
        let occupied: HashSet<String> = ["summary.md".to_string()].into_iter().collect();
        let claims = vec![
            claim("/r/a.md", 100, "summary.md"),
            claim("/r/b.md", 200, "summary-2.md"),
        ];
        let assigned = assign_unique(&claims, &occupied);
        assert_eq!(assigned, vec!["summary-3.md", "summary-2.md"]);
    }

    #[test]
    fn test_occupied_compared_case_insensitively() {
        let occupied: HashSet<String> = ["guide.md".to_string()].into_iter().collect();
        let claims = vec![claim("/r/GUIDE.MD", 100, "Guide.md")];
        assert_eq!(assign_unique(&claims, &occupied), vec!["Guide-2.md"]);
    }

    #[test]
    fn test_resolve_collisions_uses_disk() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("summary.md"), "not part of the batch").unwrap();
        fs::write(root.join("SUMMARY_FINAL.md"), "x").unwrap();

        let mut records = vec![FileRecord::new(
            root,
            root.join("SUMMARY_FINAL.md"),
            Utc.timestamp_opt(0, 0).unwrap(),
            1,
        )];
        records[0].category = Category::Summary;
        let namer = Namer::default();
        namer.name_records(&mut records);
        assert_eq!(records[0].canonical_name, "summary.md");

        namer.resolve_collisions(&mut records);
        assert_eq!(records[0].canonical_name, "summary-2.md");
    }
}
