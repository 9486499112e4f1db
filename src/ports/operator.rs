//! Operator prompt port.
//!
//! After each iteration the engine presents a review of project state
//! and waits for a signal. The menu itself is an adapter concern; the
//! engine only consumes the returned signal.

use std::path::PathBuf;

use crate::assess::CompletenessReport;

/// The operator's decision after reviewing an iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorSignal {
    /// Keep iterating toward production readiness.
    Continue,
    /// Add a named feature, then keep iterating.
    AddFeature(String),
    /// Stop iterating and finalize the project.
    Stop,
    /// Checkpoint and exit; the run resumes later.
    Pause,
}

/// Snapshot of project state shown to the operator between iterations.
#[derive(Debug, Clone)]
pub struct IterationReview {
    /// The iteration that just completed.
    pub iteration: u32,
    /// Project root, if one has been created.
    pub project_root: Option<PathBuf>,
    /// Implemented feature tags.
    pub features: Vec<String>,
    /// Number of files the engine has created.
    pub files_created: usize,
    /// Installed dependency specs.
    pub installed_deps: Vec<String>,
    /// The freshly recomputed completeness report, including issues that
    /// must be surfaced before the project can be considered done.
    pub report: CompletenessReport,
}

/// Presents iteration reviews and collects the operator's signal.
pub trait Operator: Send + Sync {
    /// Shows the review and waits for a decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt channel is closed or unreadable.
    fn review(
        &self,
        review: &IterationReview,
    ) -> Result<OperatorSignal, Box<dyn std::error::Error + Send + Sync>>;
}
