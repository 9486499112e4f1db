//! Live process runner using `std::process::Command`.

use std::path::Path;
use std::process::Command;

use crate::ports::{ProcessOutput, ProcessRunner};

/// Live process runner that spawns real subprocesses.
pub struct LiveProcessRunner;

impl ProcessRunner for LiveProcessRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> Result<ProcessOutput, Box<dyn std::error::Error + Send + Sync>> {
        let mut command = Command::new(program);
        command.args(args);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        let output = command.output()?;
        Ok(ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
