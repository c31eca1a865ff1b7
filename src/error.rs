//! Errors that abort a whole run.
//!
//! Per-file problems never show up here; they are recorded in the execution
//! report and the run carries on.

use crate::config::ConfigError;
use crate::planner::PlanError;
use crate::restore::RestoreError;
use crate::scanner::RootError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaidError {
    #[error(transparent)]
    RootInaccessible(#[from] RootError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Restore(#[from] RestoreError),
    #[error("cannot serialize report: {0}")]
    Report(#[from] serde_json::Error),
}
