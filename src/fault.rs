//! Engine fault taxonomy.
//!
//! Validation and execution faults are handled locally through the
//! recovery paths and never abort the process. Environment faults and
//! exhausted recovery budgets are escalated to the operator.

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::engine::validate::Rejection;
use crate::ports::OracleError;

/// Top-level faults surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineFault {
    /// A batch failed validation and the corrective budget ran out
    /// without producing a usable replacement.
    #[error("task batch rejected: {}", format_rejections(.0))]
    Validation(Vec<Rejection>),
    /// An oracle round-trip or response parse failed.
    #[error(transparent)]
    Oracle(#[from] OracleError),
    /// A required tool is missing at startup; fatal to the run.
    #[error("required tool missing: {0}")]
    Environment(String),
    /// Reading or writing a checkpoint failed.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    /// The operator prompt channel failed.
    #[error("operator prompt failed: {0}")]
    Operator(String),
}

fn format_rejections(rejections: &[Rejection]) -> String {
    rejections.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
