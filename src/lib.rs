//! Core library entry for the `forge` CLI.

pub mod adapters;
pub mod assess;
pub mod cancel;
pub mod checkpoint;
pub mod cli;
pub mod commands;
pub mod context;
pub mod digest;
pub mod engine;
pub mod fault;
pub mod finalize;
pub mod logging;
pub mod ports;
pub mod state;
pub mod task;

use clap::Parser;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing, runtime setup, or
/// command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    let runtime = tokio::runtime::Runtime::new().map_err(|err| err.to_string())?;
    runtime.block_on(commands::dispatch(cli.command))
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn run_executes_status_on_an_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().to_str().unwrap();

        let result = run(["forge", "status", "--state-dir", state_dir]);
        assert!(result.is_ok());
    }

    #[test]
    fn run_errors_on_unknown_subcommand() {
        let result = run(["forge", "unknown"]);
        assert!(result.is_err());
    }
}
