//! Process runner port for invoking external tools.

use std::path::Path;

/// The captured output of a finished subprocess.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// The exit code of the process.
    pub exit_code: i32,
    /// The captured standard output.
    pub stdout: String,
    /// The captured standard error.
    pub stderr: String,
}

impl ProcessOutput {
    /// Returns `true` if the process exited with code zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external programs (git, pip, npm, test runners, linters).
///
/// Every tool invocation the engine performs goes through this port so
/// that executor behavior can be tested with scripted outputs.
pub trait ProcessRunner: Send + Sync {
    /// Runs a program with the given arguments, waiting for it to exit.
    ///
    /// When `cwd` is provided the process runs in that directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be spawned (e.g. the
    /// binary is not installed). A non-zero exit is not an error here;
    /// callers inspect [`ProcessOutput::success`].
    fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> Result<ProcessOutput, Box<dyn std::error::Error + Send + Sync>>;
}
