//! Name-based document classification.
//!
//! A file name is split into tokens and matched against the [`Lexicon`]. The
//! earliest-priority category with a hit wins. Shell scripts with no keyword
//! fall back to [`Category::Script`], everything else to [`Category::Unknown`].
//! When the name carries no keyword, the same search runs over the first
//! lines of the file. A content hit can recognise an unknown file, or a script
//! whose comments describe it, but never changes a category that came from a
//! keyword in the name.

use crate::file_category::{Category, Lexicon};
use crate::scanner::{FileRecord, read_excerpt};
use serde::{Deserialize, Serialize};

/// Extensions treated as scripts when no keyword matches.
const SCRIPT_EXTENSIONS: &[&str] = &["sh", "bash"];

/// Ordinal strength of a classification, reported with every record.
///
/// It is not a probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
}

/// What the category was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBasis {
    Name,
    Extension,
    Content,
    Fallback,
}

/// Result of classifying one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub confidence: Confidence,
    pub basis: MatchBasis,
}

impl Classification {
    fn unknown() -> Self {
        Self {
            category: Category::Unknown,
            confidence: Confidence::None,
            basis: MatchBasis::Fallback,
        }
    }
}

/// Splits a file stem into tokens.
///
/// ASCII punctuation and whitespace separate tokens, as do case transitions
/// (`camelCase`, `HTTPServer`). Letters and digits stay together so `Q2` is a
/// single token. Non-ASCII characters never split.
///
/// ```
/// use maid::classifier::tokenize;
///
/// assert_eq!(
///     tokenize("DOCUMENTATION_REFACTORING_SUMMARY"),
///     vec!["DOCUMENTATION", "REFACTORING", "SUMMARY"]
/// );
/// assert_eq!(tokenize("HTTPServerGuide"), vec!["HTTP", "Server", "Guide"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.split(|c: char| c.is_ascii() && !c.is_ascii_alphanumeric()) {
        if !word.is_empty() {
            split_case_transitions(word, &mut tokens);
        }
    }
    tokens
}

fn split_case_transitions(word: &str, tokens: &mut Vec<String>) {
    let chars: Vec<char> = word.chars().collect();
    let mut start = 0;

    for i in 1..chars.len() {
        let prev = chars[i - 1];
        let current = chars[i];
        let next = chars.get(i + 1).copied();

        let lower_to_upper =
            (prev.is_ascii_lowercase() || prev.is_ascii_digit()) && current.is_ascii_uppercase();
        let acronym_end = prev.is_ascii_uppercase()
            && current.is_ascii_uppercase()
            && next.is_some_and(|n| n.is_ascii_lowercase());

        if lower_to_upper || acronym_end {
            tokens.push(chars[start..i].iter().collect());
            start = i;
        }
    }

    tokens.push(chars[start..].iter().collect());
}

/// Assigns categories using an ordered lexicon.
#[derive(Debug, Clone)]
pub struct Classifier {
    lexicon: Lexicon,
}

impl Classifier {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Classifies a file from its stem, extension and optional content excerpt.
    ///
    /// This is a pure function of its inputs.
    ///
    /// ```
    /// use maid::classifier::{Classifier, Confidence};
    /// use maid::file_category::Category;
    ///
    /// let classifier = Classifier::default();
    /// let result = classifier.classify("IMPLEMENTATION_RUBRIC", Some("md"), None);
    /// assert_eq!(result.category, Category::Rubric);
    /// assert_eq!(result.confidence, Confidence::Medium);
    /// ```
    pub fn classify(
        &self,
        stem: &str,
        extension: Option<&str>,
        excerpt: Option<&str>,
    ) -> Classification {
        let result = self.classify_name(stem, extension);
        if result.basis == MatchBasis::Name {
            return result;
        }

        let Some(text) = excerpt else {
            return result;
        };
        // scripts: comments only
        let searched = if result.basis == MatchBasis::Extension {
            comment_lines(text)
        } else {
            text.to_string()
        };

        match self.best_match(&tokenize(&searched)) {
            Some((category, _)) => Classification {
                category,
                confidence: Confidence::Low,
                basis: MatchBasis::Content,
            },
            None => result,
        }
    }

    /// Classifies using the name only.
    pub fn classify_name(&self, stem: &str, extension: Option<&str>) -> Classification {
        if let Some((category, hits)) = self.best_match(&tokenize(stem)) {
            return Classification {
                category,
                confidence: if hits > 1 {
                    Confidence::High
                } else {
                    Confidence::Medium
                },
                basis: MatchBasis::Name,
            };
        }

        if let Some(ext) = extension
            && SCRIPT_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext))
        {
            return Classification {
                category: Category::Script,
                confidence: Confidence::Low,
                basis: MatchBasis::Extension,
            };
        }

        Classification::unknown()
    }

    /// Whether content inspection could improve this result.
    pub fn needs_excerpt(&self, classification: &Classification) -> bool {
        classification.basis != MatchBasis::Name
    }

    /// Classifies a scanned record in place, reading an excerpt only when the
    /// name is not conclusive.
    pub fn classify_record(&self, record: &mut FileRecord, excerpt_lines: usize) {
        let mut result = self.classify_name(&record.base_name, record.extension.as_deref());

        if self.needs_excerpt(&result)
            && excerpt_lines > 0
            && let Some(excerpt) = read_excerpt(&record.path, excerpt_lines)
        {
            result = self.classify(
                &record.base_name,
                record.extension.as_deref(),
                Some(&excerpt),
            );
        }

        log::debug!(
            "classified {} as {} ({:?}, {:?})",
            record.path.display(),
            result.category,
            result.confidence,
            result.basis
        );

        record.category = result.category;
        record.confidence = result.confidence;
    }

    /// Returns the highest-priority category with at least one hit, and the
    /// number of hits for it.
    fn best_match(&self, tokens: &[String]) -> Option<(Category, usize)> {
        self.lexicon.entries().iter().find_map(|entry| {
            let hits = entry.hits(tokens);
            (hits > 0).then_some((entry.category(), hits))
        })
    }
}

/// `#` comment lines of a script, without the shebang.
fn comment_lines(text: &str) -> String {
    text.lines()
        .map(str::trim_start)
        .filter(|line| line.starts_with('#') && !line.starts_with("#!"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Lexicon::standard())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(stem: &str, ext: &str) -> Classification {
        Classifier::default().classify(stem, Some(ext), None)
    }

    #[test]
    fn test_tokenize_separators_and_case() {
        assert_eq!(tokenize("setup-environment"), vec!["setup", "environment"]);
        assert_eq!(tokenize("weeklyStatusQ2"), vec!["weekly", "Status", "Q2"]);
        assert_eq!(tokenize("v2Final"), vec!["v2", "Final"]);
        assert_eq!(tokenize("__a..b  c__"), vec!["a", "b", "c"]);
        assert!(tokenize("").is_empty());
        assert!(tokenize("___").is_empty());
    }

    #[test]
    fn test_tokenize_keeps_non_ascii() {
        assert_eq!(tokenize("résumé_SUMMARY"), vec!["résumé", "SUMMARY"]);
        assert_eq!(tokenize("笔记-guide"), vec!["笔记", "guide"]);
    }

    #[test]
    fn test_summary_example() {
        let result = classify("DOCUMENTATION_REFACTORING_SUMMARY", "md");
        assert_eq!(result.category, Category::Summary);
        assert_eq!(result.basis, MatchBasis::Name);
    }

    #[test]
    fn test_rubric_outranks_summary_and_guide() {
        assert_eq!(classify("IMPLEMENTATION_RUBRIC", "md").category, Category::Rubric);
        assert_eq!(classify("RUBRIC_SUMMARY_GUIDE", "md").category, Category::Rubric);
        assert_eq!(classify("GUIDE_SUMMARY", "md").category, Category::Summary);
    }

    #[test]
    fn test_report_outranks_status() {
        assert_eq!(classify("STATUS_REPORT_Q2", "md").category, Category::Report);
        assert_eq!(classify("STATUS_Q2", "md").category, Category::StatusUpdate);
        assert_eq!(classify("q3", "md").category, Category::StatusUpdate);
    }

    #[test]
    fn test_repeated_keywords_raise_confidence_only() {
        let single = classify("PROJECT_SUMMARY", "md");
        let double = classify("SUMMARY_OVERVIEW", "md");
        assert_eq!(single.category, Category::Summary);
        assert_eq!(double.category, Category::Summary);
        assert_eq!(single.confidence, Confidence::Medium);
        assert_eq!(double.confidence, Confidence::High);
    }

    #[test]
    fn test_script_fallback() {
        let result = classify("setup-environment", "sh");
        assert_eq!(result.category, Category::Script);
        assert_eq!(result.confidence, Confidence::Low);

        // keywords beat the extension
        assert_eq!(classify("deploy_guide", "sh").category, Category::Guide);
    }

    #[test]
    fn test_unknown_fallbacks() {
        assert_eq!(classify("", "md").category, Category::Unknown);
        assert_eq!(classify("20240611", "md").category, Category::Unknown);
        assert_eq!(classify("notes", "md").confidence, Confidence::None);
    }

    #[test]
    fn test_non_ascii_does_not_block_classification() {
        assert_eq!(classify("résumé_SUMMARY", "md").category, Category::Summary);
    }

    #[test]
    fn test_content_recognises_unknown() {
        let classifier = Classifier::default();
        let result = classifier.classify("notes", Some("md"), Some("# Installation Guide\n\nStep one"));
        assert_eq!(result.category, Category::Guide);
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.basis, MatchBasis::Content);
    }

    #[test]
    fn test_content_never_overrides_name() {
        let classifier = Classifier::default();
        let result = classifier.classify("PROJECT_SUMMARY", Some("md"), Some("# Rubric"));
        assert_eq!(result.category, Category::Summary);
        assert_eq!(result.confidence, Confidence::Medium);
        assert_eq!(result.basis, MatchBasis::Name);
    }

    #[test]
    fn test_script_comments_decide_category() {
        let classifier = Classifier::default();
        let result = classifier.classify("deploy", Some("sh"), Some("# Deployment Guide"));
        assert_eq!(result.category, Category::Guide);
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.basis, MatchBasis::Content);

        let with_shebang = classifier.classify(
            "install",
            Some("sh"),
            Some("#!/bin/bash\n# Installation guide\nset -e\n"),
        );
        assert_eq!(with_shebang.category, Category::Guide);
    }

    #[test]
    fn test_script_body_is_not_searched() {
        let classifier = Classifier::default();
        let result = classifier.classify(
            "bootstrap",
            Some("sh"),
            Some("#!/bin/sh\napt-get update\n./run_report.sh\n"),
        );
        assert_eq!(result.category, Category::Script);
        assert_eq!(result.basis, MatchBasis::Extension);
    }

    #[test]
    fn test_phrases_in_names_and_content() {
        assert_eq!(classify("HOW_TO_DEPLOY", "md").category, Category::Guide);
        assert_eq!(classify("IMPLEMENTATION_COMPLETE", "md").category, Category::Report);

        let classifier = Classifier::default();
        let result = classifier.classify("notes", Some("md"), Some("Step by step:\n1. clone"));
        assert_eq!(result.category, Category::Guide);
        let result = classifier.classify("notes", Some("md"), Some("In conclusion, it works."));
        assert_eq!(result.category, Category::Summary);
    }

    #[test]
    fn test_classify_is_stable() {
        let classifier = Classifier::default();
        let first = classifier.classify("weird_Name-42", Some("md"), Some("# Overview"));
        for _ in 0..5 {
            assert_eq!(
                classifier.classify("weird_Name-42", Some("md"), Some("# Overview")),
                first
            );
        }
    }
}
