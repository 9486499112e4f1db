//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::ports::OracleKind;

/// Top-level CLI parser for `forge`.
#[derive(Debug, Parser)]
#[command(name = "forge", version, about = "Iteratively build a project with an oracle")]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a fresh project from a natural-language command.
    Run {
        /// What to build, e.g. "build a web app".
        command: String,
        /// Planning backend to use.
        #[arg(long, value_enum, default_value_t = OracleKind::Grok)]
        oracle: OracleKind,
        /// Directory holding the checkpoint files.
        #[arg(long, default_value = ".")]
        state_dir: PathBuf,
    },
    /// Resume a paused run from its checkpoint.
    Resume {
        /// Override the planning backend recorded in the checkpoint.
        #[arg(long, value_enum)]
        oracle: Option<OracleKind>,
        /// Directory holding the checkpoint files.
        #[arg(long, default_value = ".")]
        state_dir: PathBuf,
    },
    /// Show the state of a paused run without resuming it.
    Status {
        /// Directory holding the checkpoint files.
        #[arg(long, default_value = ".")]
        state_dir: PathBuf,
    },
}
