//! maid - tidy up directories of loosely-named generated documents
//!
//! This library classifies documents and scripts by their names (and, when
//! the name says little, their first lines), gives them canonical names,
//! optionally regroups them into per-category directories, and moves files
//! nobody needs into a recoverable trash.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod file_category;
pub mod namer;
pub mod output;
pub mod planner;
pub mod restore;
pub mod retention;
pub mod scanner;
pub mod trash;

pub use classifier::{Classification, Classifier, Confidence};
pub use config::{CompiledConfig, CompiledFilters, ConfigError, MaidConfig};
pub use error::MaidError;
pub use executor::{ExecutionReport, Executor, Operation, OperationKind, OperationStatus};
pub use file_category::{Category, Lexicon};
pub use namer::Namer;
pub use planner::{PlanMode, Planner};
pub use restore::{RestoreError, TrashRestorer};
pub use retention::{RetentionPolicy, RetentionRule, Verdict};
pub use scanner::{FileRecord, RootError, Scanner};

pub use cli::{MaidCommand, OutputOptions, run_cli, run_cli_with_config};
pub use output::{RunCommand, RunReport};
