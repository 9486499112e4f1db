//! The iteration engine: plan, validate, execute, recover, checkpoint.
//!
//! One iteration asks the oracle for a batch, screens it as a whole,
//! executes it in order, and checkpoints the updated state before
//! handing control to the operator. Validation failures discard the
//! batch and request a corrective one; execution failures request a
//! targeted recovery batch and then continue with the remaining tasks.
//! Both recovery paths share a bounded depth budget so a persistently
//! unusable oracle cannot recurse forever.

pub mod execute;
pub mod validate;

use std::future::Future;
use std::pin::Pin;

use crate::cancel::CancelFlag;
use crate::checkpoint::CheckpointStore;
use crate::context::ServiceContext;
use crate::digest;
use crate::engine::execute::BatchResults;
use crate::fault::EngineFault;
use crate::finalize;
use crate::ports::{IterationReview, OperatorSignal, OracleError, PlanRequest, PlanResponse};
use crate::state::ProjectState;
use crate::task::Language;

/// Maximum corrective rounds per originating batch or task.
pub const MAX_RECOVERY_DEPTH: usize = 3;

/// Why the run loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The operator stopped the run and the project was finalized.
    Finalized,
    /// A pause or interrupt was observed; state is checkpointed.
    Paused,
    /// The run ended without ever creating a project.
    Abandoned,
}

/// How one batch (or recovery sub-batch) finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchStatus {
    /// Every task was attempted.
    Completed,
    /// The batch was discarded without a usable replacement.
    Abandoned,
    /// Cancellation was observed between tasks.
    Cancelled,
}

/// The engine owning project state for the duration of a run.
pub struct Engine<'a> {
    ctx: &'a ServiceContext,
    store: CheckpointStore,
    cancel: CancelFlag,
    state: ProjectState,
}

impl<'a> Engine<'a> {
    /// Creates an engine over existing (fresh or resumed) state.
    #[must_use]
    pub fn new(
        ctx: &'a ServiceContext,
        store: CheckpointStore,
        cancel: CancelFlag,
        state: ProjectState,
    ) -> Self {
        Self { ctx, store, cancel, state }
    }

    /// Read access to the engine's state, mainly for tests.
    #[must_use]
    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    /// Consumes the engine, returning its final state.
    #[must_use]
    pub fn into_state(self) -> ProjectState {
        self.state
    }

    /// Runs the iteration loop until the operator stops or pauses.
    ///
    /// # Errors
    ///
    /// Returns [`EngineFault::Environment`] before the first iteration
    /// when a required tool is missing, and checkpoint or operator
    /// faults when persistence or the prompt channel fail. Validation,
    /// execution, and oracle faults are handled through the recovery
    /// paths and never abort the run.
    pub async fn run(&mut self, command: String) -> Result<RunOutcome, EngineFault> {
        self.validate_environment()?;
        if self.state.command.is_none() {
            self.state.command = Some(command.clone());
        }
        let mut command = command;

        loop {
            if self.cancel.is_set() {
                return self.pause().map(|()| RunOutcome::Paused);
            }
            self.state.iteration += 1;
            tracing::info!(iteration = self.state.iteration, %command, "starting iteration");

            let response = match self.plan(&command, None, false).await {
                Ok(response) => response,
                Err(err) => {
                    // A transport or parse fault is not a completion
                    // signal; surface it and let the operator decide.
                    tracing::error!(%err, "planning failed");
                    match self.operator_review()? {
                        OperatorSignal::Stop => break,
                        OperatorSignal::Pause => {
                            return self.pause().map(|()| RunOutcome::Paused)
                        }
                        signal => {
                            command = self.next_command(&signal);
                            continue;
                        }
                    }
                }
            };

            if response.tasks.is_empty() {
                tracing::info!("oracle returned no tasks, project may be complete");
                match self.operator_review()? {
                    OperatorSignal::Stop => break,
                    OperatorSignal::Pause => return self.pause().map(|()| RunOutcome::Paused),
                    signal => {
                        command = self.next_command(&signal);
                        continue;
                    }
                }
            }

            // Batch-level faults are surfaced at the review, not fatal.
            let status = match self.run_batch(response.tasks, command.clone(), 0).await {
                Ok(status) => status,
                Err(err) => {
                    tracing::error!(%err, "batch abandoned");
                    BatchStatus::Abandoned
                }
            };
            if status == BatchStatus::Cancelled {
                return self.pause().map(|()| RunOutcome::Paused);
            }

            self.verify_recorded_files();
            self.checkpoint()?;

            match self.operator_review()? {
                OperatorSignal::Stop => break,
                OperatorSignal::Pause => return self.pause().map(|()| RunOutcome::Paused),
                signal => command = self.next_command(&signal),
            }
        }

        if self.state.project_root.is_some() {
            if let Err(err) = finalize::finalize(self.ctx, &mut self.state) {
                tracing::warn!(%err, "finalization incomplete");
            }
            self.store.clear(&*self.ctx.fs)?;
            Ok(RunOutcome::Finalized)
        } else {
            tracing::error!("run ended without a project root");
            Ok(RunOutcome::Abandoned)
        }
    }

    /// Screens and executes one raw batch, recursing into corrective
    /// and recovery batches under the shared depth budget.
    fn run_batch(
        &mut self,
        raw: Vec<serde_json::Value>,
        command: String,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = Result<BatchStatus, EngineFault>> + Send + '_>> {
        Box::pin(async move {
            let batch = match validate::screen_batch(self.ctx, &self.state, &raw) {
                Ok(batch) => batch,
                Err(rejections) => {
                    if depth >= MAX_RECOVERY_DEPTH {
                        return Err(EngineFault::Validation(rejections));
                    }
                    tracing::warn!(
                        rejected = rejections.len(),
                        "invalid batch, requesting a corrective batch"
                    );
                    let corrective = self.plan(&command, None, true).await?;
                    if corrective.tasks.is_empty() {
                        tracing::error!("corrective batch was empty, abandoning iteration");
                        return Ok(BatchStatus::Abandoned);
                    }
                    return self.run_batch(corrective.tasks, command, depth + 1).await;
                }
            };

            let mut results = BatchResults::default();
            for (index, task) in batch.tasks.iter().enumerate() {
                if self.cancel.is_set() {
                    return Ok(BatchStatus::Cancelled);
                }
                if execute::execute(self.ctx, &mut self.state, task, index, &mut results) {
                    continue;
                }
                // One task's failure never aborts the rest of the batch.
                if depth >= MAX_RECOVERY_DEPTH {
                    tracing::error!(index, "recovery budget exhausted, continuing");
                    continue;
                }
                let failed = task.describe();
                tracing::info!(index, "task failed, querying for recovery");
                let recovery_command = format!("Recover from failed task: {failed}");
                let recovery =
                    match self.plan(&recovery_command, Some(failed), false).await {
                        Ok(response) => response,
                        Err(err) => {
                            tracing::error!(%err, "recovery planning failed");
                            continue;
                        }
                    };
                if recovery.tasks.is_empty() {
                    tracing::warn!(index, "no recovery tasks provided");
                    continue;
                }
                let status =
                    self.run_batch(recovery.tasks, recovery_command, depth + 1).await?;
                if status == BatchStatus::Cancelled {
                    return Ok(BatchStatus::Cancelled);
                }
            }
            Ok(BatchStatus::Completed)
        })
    }

    /// Builds the digest and sends a planning request.
    async fn plan(
        &mut self,
        command: &str,
        failed_task: Option<String>,
        retry: bool,
    ) -> Result<PlanResponse, OracleError> {
        let digest = digest::build(&mut self.state, &*self.ctx.fs);
        let request = PlanRequest {
            command: command.to_string(),
            iteration: self.state.iteration,
            failed_task,
            retry,
            digest,
        };
        self.ctx.oracle.plan(&request).await
    }

    /// Probes for the tools the run cannot proceed without.
    fn validate_environment(&self) -> Result<(), EngineFault> {
        let mut required = vec!["git"];
        required.push(match self.state.language {
            Language::Python => "python3",
            Language::Nodejs => "node",
        });
        let missing: Vec<&str> = required
            .into_iter()
            .filter(|tool| {
                !matches!(
                    self.ctx.process.run(tool, &["--version"], None),
                    Ok(output) if output.success()
                )
            })
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EngineFault::Environment(missing.join(", ")))
        }
    }

    /// Checks that files recorded in state still exist, logging drift.
    fn verify_recorded_files(&self) {
        if let Some(root) = &self.state.project_root {
            if !self.ctx.fs.exists(root) {
                tracing::error!(root = %root.display(), "project root missing from disk");
            }
        }
        for file in &self.state.created_files {
            if !self.ctx.fs.exists(file) {
                tracing::error!(file = %file.display(), "file listed in state does not exist");
            }
        }
    }

    /// Recomputes the digest and persists both checkpoint files.
    fn checkpoint(&mut self) -> Result<(), EngineFault> {
        let digest = digest::build(&mut self.state, &*self.ctx.fs);
        self.store
            .save(&*self.ctx.fs, &self.state, &digest, self.ctx.clock.now())
            .map_err(EngineFault::from)
    }

    /// Checkpoints ahead of a pause or interrupt exit.
    fn pause(&mut self) -> Result<(), EngineFault> {
        tracing::info!("pausing: state checkpointed for resume");
        self.checkpoint()
    }

    /// Presents the iteration review and returns the operator's signal.
    fn operator_review(&self) -> Result<OperatorSignal, EngineFault> {
        let report = crate::assess::assess(&self.state);
        let review = IterationReview {
            iteration: self.state.iteration,
            project_root: self.state.project_root.clone(),
            features: self.state.features.iter().cloned().collect(),
            files_created: self.state.created_files.len(),
            installed_deps: self.state.installed_deps.clone(),
            report,
        };
        self.ctx
            .operator
            .review(&review)
            .map_err(|err| EngineFault::Operator(err.to_string()))
    }

    /// The command driving the next iteration, derived from the signal.
    fn next_command(&self, signal: &OperatorSignal) -> String {
        let original = self.state.command.clone().unwrap_or_default();
        match signal {
            OperatorSignal::AddFeature(feature) => {
                format!("Add {feature} to project: {original}")
            }
            _ => format!("Enhance project to be production-ready: {original}"),
        }
    }
}
