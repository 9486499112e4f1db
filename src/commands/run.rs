//! `forge run` command.

use std::path::Path;

use uuid::Uuid;

use crate::cancel::CancelFlag;
use crate::checkpoint::CheckpointStore;
use crate::context::ServiceContext;
use crate::engine::{Engine, RunOutcome};
use crate::ports::OracleKind;
use crate::state::ProjectState;

/// Execute the `run` command: a fresh project from a fresh state.
///
/// Any stale checkpoint in the state directory is cleared first, as a
/// new command supersedes whatever run left it behind.
///
/// # Errors
///
/// Returns an error string when the environment check, checkpointing,
/// or the operator channel fails.
pub async fn run(command: &str, oracle: OracleKind, state_dir: &Path) -> Result<(), String> {
    let ctx = ServiceContext::live(oracle);
    let store = CheckpointStore::new(state_dir);
    store.clear(&*ctx.fs).map_err(|e| e.to_string())?;

    let cancel = CancelFlag::new();
    cancel.listen_for_interrupt();

    let state = ProjectState::new(oracle, Uuid::new_v4());
    let mut engine = Engine::new(&ctx, store, cancel, state);

    match engine.run(command.to_string()).await.map_err(|e| e.to_string())? {
        RunOutcome::Finalized => {
            println!("Project finalized. See PROJECT_SUMMARY.md in the project directory.");
            Ok(())
        }
        RunOutcome::Paused => {
            println!("Work paused. State saved; resume with `forge resume`.");
            Ok(())
        }
        RunOutcome::Abandoned => Err("project creation failed; check logs".to_string()),
    }
}
