//! `forge resume` command.

use std::path::Path;

use crate::adapters::live::filesystem::LiveFileSystem;
use crate::cancel::CancelFlag;
use crate::checkpoint::CheckpointStore;
use crate::context::ServiceContext;
use crate::engine::{Engine, RunOutcome};
use crate::ports::OracleKind;

/// Execute the `resume` command: pick up a paused run.
///
/// # Errors
///
/// Returns an error string when no checkpoint exists, the checkpoint
/// is unusable, or the resumed run itself fails.
pub async fn run(oracle: Option<OracleKind>, state_dir: &Path) -> Result<(), String> {
    let store = CheckpointStore::new(state_dir);
    let Some(mut state) = store.load(&LiveFileSystem).map_err(|e| e.to_string())? else {
        return Err(format!(
            "no saved state in {}; start with `forge run`",
            state_dir.display()
        ));
    };
    let Some(command) = state.command.clone() else {
        return Err("saved state has no command; start with `forge run`".to_string());
    };

    if let Some(kind) = oracle {
        state.oracle = kind;
    }
    let ctx = ServiceContext::live(state.oracle);
    println!(
        "Resuming work on project: {command} (iteration {}) using {}",
        state.iteration, state.oracle
    );

    let cancel = CancelFlag::new();
    cancel.listen_for_interrupt();

    let mut engine = Engine::new(&ctx, store, cancel, state);
    match engine.run(command).await.map_err(|e| e.to_string())? {
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
