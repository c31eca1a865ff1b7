//! Configuration loading, validation and compilation.
//!
//! Settings live in a TOML file. `[scan]` says what to scan (extensions,
//! excerpt length and the file filters). `[restructure]` tunes the directory
//! layout of `clean --restructure`, `[retention]` lists the rules `keep`
//! applies, and `[[lexicon]]` optionally replaces the keyword lexicon.
//!
//! # Configuration File Format
//!
//! ```toml
//! [scan]
//! extensions = ["md", "markdown", "txt", "sh", "bash"]
//! excerpt_lines = 20
//! enable_hidden_files = false
//!
//! [scan.exclude]
//! filenames = ["CHANGELOG.md"]
//! patterns = ["node_modules/**"]
//! extensions = ["bak"]
//! regex = []
//!
//! [scan.include]
//! patterns = []
//!
//! [restructure]
//! script_subdirs = false
//!
//! [retention]
//! rules = ["recent_modification", "canonical_name_present", "explicit_marker_token"]
//! recent_days = 7
//! markers = ["keep", "important", "pinned"]
//! protected_categories = ["guide"]
//!
//! [[lexicon]]
//! category = "rubric"
//! keywords = ["rubrics?", "criteria"]
//! identifiers = []
//! ```

use crate::file_category::{Category, Lexicon, LexiconError};
use crate::retention::RetentionRule;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const CONFIG_FILE_NAME: &str = ".maidrc.toml";

/// Errors that can occur during configuration loading and compilation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    #[error("invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    /// The lexicon override cannot be built.
    #[error("invalid lexicon: {0}")]
    InvalidLexicon(#[from] LexiconError),
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaidConfig {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub restructure: RestructureConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Replaces the built-in lexicon when non-empty, in priority order.
    #[serde(default)]
    pub lexicon: Vec<LexiconEntryConfig>,
}

/// Which files are considered and how much of them is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Lines read when the name alone does not classify a file. 0 disables.
    #[serde(default = "default_excerpt_lines")]
    pub excerpt_lines: usize,
    #[serde(default)]
    pub enable_hidden_files: bool,
    #[serde(default)]
    pub exclude: ExcludeRules,
    #[serde(default)]
    pub include: IncludeRules,
}

fn default_extensions() -> Vec<String> {
    ["md", "markdown", "txt", "sh", "bash"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_excerpt_lines() -> usize {
    20
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            excerpt_lines: default_excerpt_lines(),
            enable_hidden_files: false,
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., "README.md").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns, matched against the path relative to the root.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Layout options for `clean --restructure`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RestructureConfig {
    /// Sort scripts into `scripts/setup`, `scripts/tests` and `scripts/build`.
    #[serde(default)]
    pub script_subdirs: bool,
}

/// Allow-list used by `keep`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_rules")]
    pub rules: Vec<RetentionRule>,
    /// Files modified within this many days are kept by `recent_modification`.
    #[serde(default = "default_recent_days")]
    pub recent_days: u32,
    /// Reserved file-name tokens that pin a file.
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
    /// Categories kept whole by `protected_category`.
    #[serde(default = "default_protected_categories")]
    pub protected_categories: Vec<Category>,
}

fn default_rules() -> Vec<RetentionRule> {
    vec![
        RetentionRule::RecentModification,
        RetentionRule::CanonicalNamePresent,
        RetentionRule::ExplicitMarkerToken,
    ]
}

fn default_recent_days() -> u32 {
    7
}

fn default_markers() -> Vec<String> {
    ["keep", "important", "pinned"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_protected_categories() -> Vec<Category> {
    vec![Category::Guide]
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            recent_days: default_recent_days(),
            markers: default_markers(),
            protected_categories: default_protected_categories(),
        }
    }
}

/// One lexicon entry as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconEntryConfig {
    pub category: Category,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub identifiers: Vec<String>,
}

/// Validated configuration, ready to drive a run.
pub struct CompiledConfig {
    pub filters: CompiledFilters,
    pub lexicon: Lexicon,
    pub restructure: RestructureConfig,
    pub retention: RetentionConfig,
    pub extensions: Vec<String>,
    pub excerpt_lines: usize,
}

impl MaidConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.maidrc.toml` in the root being processed
    /// 3. Look for `~/.config/maid/config.toml`
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but
    /// cannot be read, or if any discovered file is invalid.
    pub fn load(config_path: Option<&Path>, root: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = root.join(CONFIG_FILE_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("maid")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        log::debug!("loading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Validates patterns and builds the lexicon.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex, glob or lexicon entry is invalid.
    pub fn compile(self) -> Result<CompiledConfig, ConfigError> {
        let lexicon = if self.lexicon.is_empty() {
            Lexicon::standard()
        } else {
            let mut lexicon = Lexicon::with_standard_noise();
            for entry in &self.lexicon {
                lexicon.push_entry(entry.category, &entry.keywords, &entry.identifiers)?;
            }
            lexicon
        };

        let filters = CompiledFilters::new(&self.scan)?;

        Ok(CompiledConfig {
            filters,
            lexicon,
            restructure: self.restructure,
            retention: self.retention,
            extensions: self.scan.extensions,
            excerpt_lines: self.scan.excerpt_lines,
        })
    }
}

/// Compiled filter structures for efficient file matching.
#[derive(Clone)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(scan: &ScanConfig) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern)
                        .map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_regexes = scan
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: scan.enable_hidden_files,
            exclude_filenames: scan.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: scan
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&scan.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&scan.include.patterns)?,
        })
    }

    pub fn hidden_files_enabled(&self) -> bool {
        self.enable_hidden_files
    }

    /// Check if a file should be processed.
    ///
    /// `relative_path` is the path relative to the root. Checks run in this
    /// order, first match decides:
    /// 1. Include patterns (whitelist)
    /// 2. Hidden file filter
    /// 3. Exact filename
    /// 4. File extension
    /// 5. Glob patterns
    /// 6. Regex patterns
    /// 7. Default: include
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn filters_from(toml: &str) -> CompiledFilters {
        MaidConfig::from_toml(toml).unwrap().compile().unwrap().filters
    }

    #[test]
    fn test_defaults() {
        let config = MaidConfig::default();
        assert!(!config.scan.enable_hidden_files);
        assert_eq!(config.scan.excerpt_lines, 20);
        assert!(config.scan.extensions.contains(&"md".to_string()));
        assert_eq!(config.retention.recent_days, 7);
        assert_eq!(config.retention.rules.len(), 3);
        assert!(config.lexicon.is_empty());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = MaidConfig::from_toml("").unwrap();
        assert_eq!(config.scan.extensions, default_extensions());
        assert_eq!(config.retention.markers, default_markers());
    }

    #[test]
    fn test_hidden_file_excluded_by_default() {
        let filters = filters_from("");
        assert!(!filters.should_include(Path::new(".notes.md")));
        assert!(filters.should_include(Path::new("notes.md")));
    }

    #[test]
    fn test_hidden_file_included_when_enabled() {
        let filters = filters_from("[scan]\nenable_hidden_files = true\n");
        assert!(filters.should_include(Path::new(".notes.md")));
    }

    #[test]
    fn test_exclude_exact_filename_and_extension() {
        let filters = filters_from(
            r#"
            [scan.exclude]
            filenames = ["README.md"]
            extensions = ["BAK"]
            "#,
        );
        assert!(!filters.should_include(Path::new("README.md")));
        assert!(!filters.should_include(Path::new("docs/README.md")));
        assert!(!filters.should_include(Path::new("old.bak")));
        assert!(filters.should_include(Path::new("GUIDE.md")));
    }

    #[test]
    fn test_exclude_glob_respects_directory_boundaries() {
        let filters = filters_from(
            r#"
            [scan.exclude]
            patterns = ["**/vendor/**"]
            "#,
        );
        assert!(!filters.should_include(Path::new("vendor/GUIDE.md")));
        assert!(!filters.should_include(Path::new("app/vendor/GUIDE.md")));
        assert!(filters.should_include(Path::new("my_vendor/GUIDE.md")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let filters = filters_from(
            r#"
            [scan.exclude]
            regex = ["^DRAFT_"]
            [scan.include]
            patterns = ["DRAFT_KEEP*"]
            "#,
        );
        assert!(!filters.should_include(Path::new("DRAFT_REPORT.md")));
        assert!(filters.should_include(Path::new("DRAFT_KEEP_REPORT.md")));
    }

    #[test]
    fn test_invalid_patterns_return_errors() {
        let bad_regex = MaidConfig::from_toml("[scan.exclude]\nregex = [\"[invalid(\"]\n")
            .unwrap()
            .compile();
        assert!(matches!(bad_regex, Err(ConfigError::InvalidRegexPattern { .. })));

        let bad_glob = MaidConfig::from_toml("[scan.exclude]\npatterns = [\"[invalid\"]\n")
            .unwrap()
            .compile();
        assert!(matches!(bad_glob, Err(ConfigError::InvalidGlobPattern(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let result = MaidConfig::from_toml("[scan\nextensions = 3");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_retention_rules_parse() {
        let config = MaidConfig::from_toml(
            r#"
            [retention]
            rules = ["explicit_marker_token", "latest_per_category"]
            recent_days = 30
            "#,
        )
        .unwrap();
        assert_eq!(
            config.retention.rules,
            vec![
                RetentionRule::ExplicitMarkerToken,
                RetentionRule::LatestPerCategory
            ]
        );
        assert_eq!(config.retention.recent_days, 30);
        assert_eq!(config.retention.protected_categories, vec![Category::Guide]);
    }

    #[test]
    fn test_content_rules_and_layout_parse() {
        let compiled = MaidConfig::from_toml(
            r#"
            [restructure]
            script_subdirs = true

            [retention]
            rules = ["duplicate_content", "most_comprehensive_per_category", "protected_category"]
            protected_categories = ["rubric", "guide"]
            "#,
        )
        .unwrap()
        .compile()
        .unwrap();

        assert!(compiled.restructure.script_subdirs);
        assert_eq!(
            compiled.retention.rules,
            vec![
                RetentionRule::DuplicateContent,
                RetentionRule::MostComprehensivePerCategory,
                RetentionRule::ProtectedCategory
            ]
        );
        assert_eq!(
            compiled.retention.protected_categories,
            vec![Category::Rubric, Category::Guide]
        );
        assert!(!MaidConfig::default().restructure.script_subdirs);
    }

    #[test]
    fn test_lexicon_override_replaces_priority() {
        let compiled = MaidConfig::from_toml(
            r#"
            [[lexicon]]
            category = "guide"
            keywords = ["guide"]

            [[lexicon]]
            category = "rubric"
            keywords = ["rubric"]
            "#,
        )
        .unwrap()
        .compile()
        .unwrap();

        assert_eq!(compiled.lexicon.priority_of(Category::Guide), Some(0));
        assert_eq!(compiled.lexicon.priority_of(Category::Rubric), Some(1));
        assert_eq!(compiled.lexicon.priority_of(Category::Summary), None);
    }

    #[test]
    fn test_lexicon_override_rejects_script() {
        let result = MaidConfig::from_toml(
            r#"
            [[lexicon]]
            category = "script"
            keywords = ["sh"]
            "#,
        )
        .unwrap()
        .compile();
        assert!(matches!(result, Err(ConfigError::InvalidLexicon(_))));
    }

    #[test]
    fn test_load_prefers_root_config() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[scan]\nexcerpt_lines = 3\n",
        )
        .unwrap();

        let config = MaidConfig::load(None, temp_dir.path()).unwrap();
        assert_eq!(config.scan.excerpt_lines, 3);
    }

    #[test]
    fn test_load_missing_explicit_config() {
        let temp_dir = TempDir::new().unwrap();
        let result = MaidConfig::load(Some(&temp_dir.path().join("nope.toml")), temp_dir.path());
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }
}
