//! Task validator: screens a raw oracle batch before anything executes.
//!
//! Screening parses each raw task into the closed action set and then
//! checks it against project state. Any single rejection invalidates
//! the entire batch; the engine responds by requesting a corrective
//! batch. The only side effects here are the on-demand linter install
//! attempt and logging.

use std::path::{Component, Path};

use thiserror::Error;

use crate::context::ServiceContext;
use crate::state::{FingerprintStore, ProjectState};
use crate::task::{Action, Language, Task, TaskBatch};

/// Why a task was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// The raw object does not match any supported action kind.
    #[error("does not match any supported action: {0}")]
    Malformed(String),
    /// The path resolves outside the project root.
    #[error("path {0} is outside the project root")]
    PathOutsideRoot(String),
    /// The path contains characters illegal in a filesystem path.
    #[error("path {0} contains illegal characters")]
    IllegalPath(String),
    /// A dependency index falls outside the batch.
    #[error("dependency index {dep} out of range for a batch of {len}")]
    DependencyOutOfRange {
        /// The offending index.
        dep: usize,
        /// The batch length.
        len: usize,
    },
    /// The lint tool is not the mandated linter for the language.
    #[error("linter {tool} is not supported for {language}")]
    LinterMismatch {
        /// The requested tool.
        tool: String,
        /// The current project language.
        language: Language,
    },
    /// The linter is absent and on-demand installation failed.
    #[error("linter {tool} unavailable: {message}")]
    LinterUnavailable {
        /// The requested tool.
        tool: String,
        /// Why installation failed.
        message: String,
    },
    /// A feature-introducing task targets an already-implemented feature.
    #[error("feature {0} is already implemented")]
    RedundantFeature(String),
    /// Modifying the file would not change its content.
    #[error("modification of {0} would be a no-op")]
    NoOpModification(String),
}

/// A rejected task: its batch index and the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Batch-local index of the rejected task.
    pub index: usize,
    /// Why it was rejected.
    pub reason: RejectReason,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task {}: {}", self.index, self.reason)
    }
}

/// Parses and validates a raw batch.
///
/// Returns the fully typed batch when every task is acceptable, or the
/// complete list of rejections otherwise.
///
/// # Errors
///
/// Returns every [`Rejection`] found; one rejection is enough to
/// invalidate the batch.
pub fn screen_batch(
    ctx: &ServiceContext,
    state: &ProjectState,
    raw: &[serde_json::Value],
) -> Result<TaskBatch, Vec<Rejection>> {
    let mut tasks = Vec::with_capacity(raw.len());
    let mut rejections = Vec::new();

    for (index, value) in raw.iter().enumerate() {
        match serde_json::from_value::<Task>(value.clone()) {
            Ok(task) => tasks.push(task),
            Err(err) => {
                rejections.push(Rejection {
                    index,
                    reason: RejectReason::Malformed(err.to_string()),
                });
            }
        }
    }
    // Malformed entries make index-based dependency checks meaningless.
    if !rejections.is_empty() {
        log_rejections(&rejections);
        return Err(rejections);
    }

    for (index, task) in tasks.iter().enumerate() {
        if let Err(reason) = validate(ctx, state, task, tasks.len()) {
            rejections.push(Rejection { index, reason });
        }
    }
    if rejections.is_empty() {
        Ok(TaskBatch { tasks })
    } else {
        log_rejections(&rejections);
        Err(rejections)
    }
}

/// Validates a single typed task against project state.
///
/// # Errors
///
/// Returns the first [`RejectReason`] that applies.
pub fn validate(
    ctx: &ServiceContext,
    state: &ProjectState,
    task: &Task,
    batch_len: usize,
) -> Result<(), RejectReason> {
    if let Some(path) = task.action.path() {
        let display = path.display().to_string();
        if has_illegal_chars(&display) {
            return Err(RejectReason::IllegalPath(display));
        }
        if escapes_root(path, state.project_root.as_deref()) {
            return Err(RejectReason::PathOutsideRoot(display));
        }
    }

    for &dep in &task.depends_on {
        if dep >= batch_len {
            return Err(RejectReason::DependencyOutOfRange { dep, len: batch_len });
        }
    }

    if let Action::RunLint { tool, .. } = &task.action {
        let expected = state.language.linter();
        if tool != expected {
            return Err(RejectReason::LinterMismatch {
                tool: tool.clone(),
                language: state.language,
            });
        }
        ensure_linter_available(ctx, state, tool)?;
    }

    if task.action.introduces_feature() {
        if let Some(feature) = &task.feature {
            if state.features.contains(feature) {
                tracing::warn!(feature, "feature already implemented, task is redundant");
                return Err(RejectReason::RedundantFeature(feature.clone()));
            }
        }
    }

    if let Action::ModifyFile { path, .. } = &task.action {
        if let Some(recorded) = state.fingerprints.get(path) {
            if let Ok(current) = ctx.fs.read_to_string(path) {
                if FingerprintStore::hash(&current) == recorded {
                    tracing::warn!(path = %path.display(), "file unchanged, modification is a no-op");
                    return Err(RejectReason::NoOpModification(path.display().to_string()));
                }
            }
        }
    }

    Ok(())
}

/// Characters that are illegal in a filesystem path, plus control chars.
fn has_illegal_chars(path: &str) -> bool {
    path.chars()
        .any(|c| c.is_control() || matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*'))
}

/// Whether a path escapes the project root.
///
/// Absolute paths must sit under the root when one is set. Relative
/// paths are resolved lexically; climbing above the current directory
/// counts as an escape.
fn escapes_root(path: &Path, root: Option<&Path>) -> bool {
    if path.is_absolute() {
        return root.is_some_and(|root| !path.starts_with(root));
    }
    let mut depth: i64 = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Probes for the linter binary and installs it on demand.
///
/// Installation failure is a hard validation failure, never silently
/// ignored.
fn ensure_linter_available(
    ctx: &ServiceContext,
    state: &ProjectState,
    tool: &str,
) -> Result<(), RejectReason> {
    let probe = ctx.process.run(tool, &["--version"], None);
    if matches!(&probe, Ok(output) if output.success()) {
        return Ok(());
    }
    tracing::warn!(tool, "linter not installed, attempting to install");

    let result = match state.language {
        Language::Python => {
            let python = state.env_python();
            let python = python.display().to_string();
            ctx.process.run(&python, &["-m", "pip", "install", "flake8", "autopep8"], None)
        }
        Language::Nodejs => ctx.process.run("npm", &["install", "-g", tool], None),
    };
    match result {
        Ok(output) if output.success() => {
            tracing::info!(tool, "installed linter");
            Ok(())
        }
        Ok(output) => Err(RejectReason::LinterUnavailable {
            tool: tool.to_string(),
            message: output.stderr.trim().to_string(),
        }),
        Err(err) => Err(RejectReason::LinterUnavailable {
            tool: tool.to_string(),
            message: err.to_string(),
        }),
    }
}

fn log_rejections(rejections: &[Rejection]) {
    for rejection in rejections {
        tracing::error!(index = rejection.index, reason = %rejection.reason, "task rejected");
    }
}
