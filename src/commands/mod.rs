//! Command dispatch and handlers.

pub mod resume;
pub mod run;
pub mod status;

use crate::cli::Command;

/// Dispatch a parsed command to its handler.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub async fn dispatch(command: Command) -> Result<(), String> {
    match command {
        Command::Run { command, oracle, state_dir } => {
            run::run(&command, oracle, &state_dir).await
        }
        Command::Resume { oracle, state_dir } => resume::run(oracle, &state_dir).await,
        Command::Status { state_dir } => status::run(&state_dir),
    }
}
