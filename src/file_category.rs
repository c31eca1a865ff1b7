//! Document categories and the keyword lexicon used to recognise them.
//!
//! The lexicon is an ordered table: the position of an entry is its priority,
//! so when a file name carries keywords for several categories the earliest
//! entry wins. It is built once and handed to the classifier and the namer.
//!
//! # Examples
//!
//! ```
//! use maid::file_category::{Category, Lexicon};
//!
//! let lexicon = Lexicon::default();
//! assert_eq!(lexicon.priority_of(Category::Rubric), Some(0));
//! assert!(lexicon.priority_of(Category::Rubric) < lexicon.priority_of(Category::Summary));
//! assert_eq!(lexicon.priority_of(Category::Script), None);
//! ```
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Represents the kind of document a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Grading or evaluation rubrics.
    Rubric,
    /// Reports, analyses and audits.
    Report,
    /// Summaries, overviews and recaps.
    Summary,
    /// Guides, manuals and tutorials.
    Guide,
    /// Status updates and progress notes.
    StatusUpdate,
    /// Shell scripts with no more specific category.
    Script,
    /// Anything that could not be recognised.
    Unknown,
}

impl Category {
    /// Prefix used for canonical file names.
    ///
    /// ```
    /// use maid::file_category::Category;
    ///
    /// assert_eq!(Category::Summary.slug(), "summary");
    /// assert_eq!(Category::StatusUpdate.slug(), "status");
    /// ```
    pub fn slug(&self) -> &'static str {
        match self {
            Category::Rubric => "rubric",
            Category::Report => "report",
            Category::Summary => "summary",
            Category::Guide => "guide",
            Category::StatusUpdate => "status",
            Category::Script => "script",
            Category::Unknown => "unknown",
        }
    }

    /// Returns the directory name used in restructure mode.
    ///
    /// `Unknown` files are never relocated, so they have none.
    ///
    /// ```
    /// use maid::file_category::Category;
    ///
    /// assert_eq!(Category::Summary.dir_name(), Some("summaries"));
    /// assert_eq!(Category::Unknown.dir_name(), None);
    /// ```
    pub fn dir_name(&self) -> Option<&'static str> {
        match self {
            Category::Rubric => Some("rubrics"),
            Category::Report => Some("reports"),
            Category::Summary => Some("summaries"),
            Category::Guide => Some("guides"),
            Category::StatusUpdate => Some("status-updates"),
            Category::Script => Some("scripts"),
            Category::Unknown => None,
        }
    }

    /// Returns a human-readable description of this category.
    pub fn description(&self) -> &'static str {
        match self {
            Category::Rubric => "Rubric",
            Category::Report => "Report",
            Category::Summary => "Summary",
            Category::Guide => "Guide",
            Category::StatusUpdate => "Status update",
            Category::Script => "Script",
            Category::Unknown => "Unknown",
        }
    }

    /// Script and Unknown are decided outside the lexicon.
    fn is_reserved(&self) -> bool {
        matches!(self, Category::Script | Category::Unknown)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors raised while building a lexicon.
#[derive(Debug, Clone, Error)]
pub enum LexiconError {
    /// Script and Unknown cannot be matched by keywords.
    #[error("category '{0}' cannot have keywords")]
    ReservedCategory(Category),
    /// A category may only appear once, otherwise its priority is ambiguous.
    #[error("category '{0}' appears more than once in the lexicon")]
    DuplicateCategory(Category),
    /// A keyword pattern failed to compile.
    #[error("invalid keyword pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// A keyword: one or more whole-token patterns matched against consecutive
/// tokens, so `how to` matches the tokens `How`, `To`.
#[derive(Debug, Clone)]
pub struct Keyword {
    source: String,
    parts: Vec<Regex>,
    kept_in_name: bool,
}

impl Keyword {
    fn new(source: &str, kept_in_name: bool) -> Result<Self, LexiconError> {
        let invalid = |reason: String| LexiconError::InvalidPattern {
            pattern: source.to_string(),
            reason,
        };

        let parts = source
            .split_whitespace()
            .map(|part| {
                Regex::new(&format!("^(?i:{})$", part)).map_err(|e| invalid(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if parts.is_empty() {
            return Err(invalid("empty keyword".to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
            kept_in_name,
        })
    }

    /// The pattern as written in the lexicon.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Number of tokens this keyword spans.
    pub fn token_count(&self) -> usize {
        self.parts.len()
    }

    /// Whether `token` alone is this keyword (case-insensitive, whole token).
    pub fn matches(&self, token: &str) -> bool {
        self.parts.len() == 1 && self.parts[0].is_match(token)
    }

    /// Whether the keyword matches the tokens starting at `start`.
    pub fn matches_at(&self, tokens: &[String], start: usize) -> bool {
        tokens
            .get(start..start + self.parts.len())
            .is_some_and(|window| {
                window
                    .iter()
                    .zip(&self.parts)
                    .all(|(token, part)| part.is_match(token))
            })
    }

    /// Identifiers such as quarter markers classify a file but stay in its name.
    pub fn is_kept_in_name(&self) -> bool {
        self.kept_in_name
    }
}

/// One category and the keywords that select it.
#[derive(Debug, Clone)]
pub struct LexiconEntry {
    category: Category,
    keywords: Vec<Keyword>,
}

impl LexiconEntry {
    pub fn category(&self) -> Category {
        self.category
    }

    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    /// Returns true if any single-token keyword of this entry matches `token`.
    pub fn matches(&self, token: &str) -> bool {
        self.keywords.iter().any(|k| k.matches(token))
    }

    /// Number of keyword occurrences in `tokens`.
    pub fn hits(&self, tokens: &[String]) -> usize {
        self.spans(tokens, false).len()
    }

    /// Returns true if `token` is a keyword that the category name already implies.
    pub fn is_boilerplate(&self, token: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_kept_in_name() && k.matches(token))
    }

    /// Non-overlapping keyword occurrences, scanning left to right and
    /// preferring the longest keyword at each position.
    fn spans(&self, tokens: &[String], boilerplate_only: bool) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        let mut start = 0;
        while start < tokens.len() {
            let longest = self
                .keywords
                .iter()
                .filter(|k| !(boilerplate_only && k.is_kept_in_name()))
                .filter(|k| k.matches_at(tokens, start))
                .map(Keyword::token_count)
                .max();
            match longest {
                Some(len) => {
                    spans.push(start..start + len);
                    start += len;
                }
                None => start += 1,
            }
        }
        spans
    }
}

/// Ordered keyword table plus the noise words stripped from canonical names.
#[derive(Debug, Clone)]
pub struct Lexicon {
    entries: Vec<LexiconEntry>,
    noise: Vec<String>,
}

impl Lexicon {
    /// Creates a lexicon with no entries and no noise words.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            noise: Vec::new(),
        }
    }

    /// Creates the built-in lexicon.
    ///
    /// Priority: Rubric > Report > Summary > Guide > StatusUpdate.
    pub fn standard() -> Self {
        let mut lexicon = Self::with_standard_noise();
        lexicon.populate_standard_entries();
        lexicon
    }

    /// Creates a lexicon with the built-in noise words and no entries, the
    /// starting point for a user-supplied keyword table.
    pub fn with_standard_noise() -> Self {
        let mut lexicon = Self::empty();
        for word in ["final", "latest", "copy", "new", "the", "a", "an"] {
            lexicon.add_noise_word(word);
        }
        lexicon
    }

    fn populate_standard_entries(&mut self) {
        let standard: [(Category, &[&str], &[&str]); 5] = [
            (
                Category::Rubric,
                &["rubrics?", "criteria", "scoring", "grading"],
                &[],
            ),
            (
                Category::Report,
                &[
                    "reports?",
                    "analysis",
                    "assessment",
                    "audit",
                    "findings",
                    "complete",
                    "completed",
                    "completion",
                ],
                &[],
            ),
            (
                Category::Summary,
                &[
                    "summary",
                    "summaries",
                    "overview",
                    "recap",
                    "synopsis",
                    "in conclusion",
                ],
                &[],
            ),
            (
                Category::Guide,
                &[
                    "guides?",
                    "howto",
                    "how to",
                    "step by step",
                    "manual",
                    "tutorial",
                    "instructions",
                    "walkthrough",
                ],
                &[],
            ),
            (
                Category::StatusUpdate,
                &["status", "updates?", "progress"],
                &["q[0-9]"],
            ),
        ];

        for (category, keywords, identifiers) in standard {
            self.push_entry(category, keywords, identifiers)
                .expect("standard lexicon entries are valid");
        }
    }

    /// Appends a category at the lowest priority so far.
    ///
    /// `keywords` are dropped from canonical names, `identifiers` are kept.
    ///
    /// # Errors
    ///
    /// Fails for Script/Unknown, for a category already present, or for a
    /// pattern that does not compile.
    pub fn push_entry<K, I>(
        &mut self,
        category: Category,
        keywords: &[K],
        identifiers: &[I],
    ) -> Result<(), LexiconError>
    where
        K: AsRef<str>,
        I: AsRef<str>,
    {
        if category.is_reserved() {
            return Err(LexiconError::ReservedCategory(category));
        }
        if self.entry_for(category).is_some() {
            return Err(LexiconError::DuplicateCategory(category));
        }

        let mut compiled = Vec::with_capacity(keywords.len() + identifiers.len());
        for keyword in keywords {
            compiled.push(Keyword::new(keyword.as_ref(), false)?);
        }
        for identifier in identifiers {
            compiled.push(Keyword::new(identifier.as_ref(), true)?);
        }

        self.entries.push(LexiconEntry {
            category,
            keywords: compiled,
        });
        Ok(())
    }

    /// Adds a word that is stripped from canonical names.
    pub fn add_noise_word(&mut self, word: &str) {
        let word = word.to_ascii_lowercase();
        if !self.noise.contains(&word) {
            self.noise.push(word);
        }
    }

    /// Entries in priority order.
    pub fn entries(&self) -> &[LexiconEntry] {
        &self.entries
    }

    /// Position of `category` in the priority order, lower wins.
    pub fn priority_of(&self, category: Category) -> Option<usize> {
        self.entries.iter().position(|e| e.category == category)
    }

    pub fn entry_for(&self, category: Category) -> Option<&LexiconEntry> {
        self.entries.iter().find(|e| e.category == category)
    }

    pub fn is_noise(&self, token: &str) -> bool {
        self.noise.iter().any(|w| w.eq_ignore_ascii_case(token))
    }

    /// Returns true if `token` adds nothing to a name that already starts with
    /// the category slug.
    pub fn is_boilerplate(&self, category: Category, token: &str) -> bool {
        token.eq_ignore_ascii_case(category.slug())
            || self
                .entry_for(category)
                .is_some_and(|entry| entry.is_boilerplate(token))
    }

    /// Marks the tokens a canonical name for `category` drops: the slug and
    /// every token covered by a boilerplate keyword, phrases included.
    pub fn boilerplate_mask(&self, category: Category, tokens: &[String]) -> Vec<bool> {
        let mut mask: Vec<bool> = tokens
            .iter()
            .map(|token| token.eq_ignore_ascii_case(category.slug()))
            .collect();
        if let Some(entry) = self.entry_for(category) {
            for span in entry.spans(tokens, true) {
                mask[span].iter_mut().for_each(|dropped| *dropped = true);
            }
        }
        mask
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::standard()
    }
}
