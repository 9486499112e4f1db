//! Dependency-aware executor: runs a validated batch in order.
//!
//! Execution proceeds strictly in declaration order; there is no
//! parallel dispatch and no topological sort, so a dependency must be
//! declared at a lower index than its dependents to ever be satisfied.
//! Every capability fault becomes a structured failure recorded in the
//! history rather than a propagated panic.

use std::collections::HashMap;
use std::path::Path;

use crate::context::ServiceContext;
use crate::state::{ProjectState, TaskHistoryEntry};
use crate::task::{Action, Language, Task};

/// Per-batch results: batch-local index to success.
#[derive(Debug, Default, Clone)]
pub struct BatchResults {
    results: HashMap<usize, bool>,
}

impl BatchResults {
    /// Records the outcome of one task attempt.
    pub fn record(&mut self, index: usize, success: bool) {
        self.results.insert(index, success);
    }

    /// Returns `true` only when the task at `index` has a recorded
    /// successful result.
    #[must_use]
    pub fn is_success(&self, index: usize) -> bool {
        self.results.get(&index).copied().unwrap_or(false)
    }

    /// The recorded outcome for `index`, if the task was attempted.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<bool> {
        self.results.get(&index).copied()
    }
}

/// Executes one task from a batch that passed validation as a whole.
///
/// Returns `true` on success. Dependency satisfaction is re-checked
/// first: if any listed dependency lacks a successful result, the task
/// is marked failed without any capability being invoked. Either way a
/// history entry is appended and both the batch-local and global
/// results are recorded.
pub fn execute(
    ctx: &ServiceContext,
    state: &mut ProjectState,
    task: &Task,
    index: usize,
    results: &mut BatchResults,
) -> bool {
    if !dependencies_met(task, results) {
        tracing::warn!(index, "task skipped: dependencies not met");
        record(ctx, state, task, index, results, Err("dependencies not met".to_string()));
        return false;
    }

    let outcome = dispatch(ctx, state, task);
    if let Err(err) = &outcome {
        tracing::error!(
            index,
            action = task.action.kind(),
            error = %err,
            "task execution failed"
        );
    }
    let success = outcome.is_ok();
    record(ctx, state, task, index, results, outcome);
    success
}

fn dependencies_met(task: &Task, results: &BatchResults) -> bool {
    task.depends_on.iter().all(|&dep| results.is_success(dep))
}

fn record(
    ctx: &ServiceContext,
    state: &mut ProjectState,
    task: &Task,
    index: usize,
    results: &mut BatchResults,
    outcome: Result<(), String>,
) {
    let success = outcome.is_ok();
    state.push_history(TaskHistoryEntry {
        task: task.clone(),
        index,
        action: task.action.kind().to_string(),
        success,
        error: outcome.err(),
        oracle: state.oracle,
        timestamp: ctx.clock.now(),
    });
    state.record_global_result(success);
    results.record(index, success);
}

/// Dispatches a task to its capability, translating faults to strings.
fn dispatch(ctx: &ServiceContext, state: &mut ProjectState, task: &Task) -> Result<(), String> {
    let feature = task.feature.as_deref();
    match &task.action {
        Action::CreateDirectory { path } => {
            ctx.fs.create_dir_all(path).map_err(|e| e.to_string())?;
            if state.project_root.is_none() {
                state.project_root = Some(path.clone());
            }
            tracing::info!(path = %path.display(), "created directory");
            Ok(())
        }
        Action::CreateVenv { path, name } => {
            let env_path = path.join(name.as_deref().unwrap_or(".venv"));
            let target = env_path.display().to_string();
            let output = ctx
                .process
                .run("python3", &["-m", "venv", &target], None)
                .map_err(|e| e.to_string())?;
            if !output.success() {
                return Err(format!("venv creation failed: {}", output.stderr.trim()));
            }
            state.env_path = Some(env_path);
            tracing::info!(path = %target, "created virtual environment");
            Ok(())
        }
        Action::SetLanguage { language } => {
            state.language = *language;
            tracing::info!(%language, "set project language");
            Ok(())
        }
        Action::CreateFile { path, content }
        | Action::CreateTest { path, content }
        | Action::GenerateDocs { path, content } => {
            ctx.fs.write(path, content).map_err(|e| e.to_string())?;
            state.record_created_file(path);
            state.add_feature(feature);
            state.fingerprints.record(path, content);
            tracing::info!(path = %path.display(), feature, "created file");
            Ok(())
        }
        Action::ModifyFile { path, content } => {
            if !ctx.fs.exists(path) {
                tracing::warn!(path = %path.display(), "file does not exist, creating it");
            }
            ctx.fs.write(path, content).map_err(|e| e.to_string())?;
            state.record_created_file(path);
            state.add_feature(feature);
            state.fingerprints.record(path, content);
            tracing::info!(path = %path.display(), feature, "modified file");
            Ok(())
        }
        Action::DeleteFile { path } => {
            if ctx.fs.exists(path) {
                ctx.fs.remove_file(path).map_err(|e| e.to_string())?;
                state.remove_created_file(path);
                state.fingerprints.forget(path);
                tracing::info!(path = %path.display(), "deleted file");
            } else {
                tracing::warn!(path = %path.display(), "file does not exist");
            }
            Ok(())
        }
        Action::InstallDependency { package, version } => {
            install_dependency(ctx, state, package, version.as_deref())
        }
        Action::InitGit { path } => {
            if !ctx.fs.exists(path) {
                ctx.fs.create_dir_all(path).map_err(|e| e.to_string())?;
            }
            run_checked(ctx, "git", &["init"], Some(path.as_path()), "git init")?;
            tracing::info!(path = %path.display(), "initialized git repository");
            Ok(())
        }
        Action::GitCommit { path, message } => {
            let message = message.as_deref().unwrap_or("Automated commit");
            run_checked(ctx, "git", &["add", "."], Some(path.as_path()), "git add")?;
            run_checked(ctx, "git", &["commit", "-m", message], Some(path.as_path()), "git commit")?;
            tracing::info!(path = %path.display(), commit_message = message, "committed changes");
            Ok(())
        }
        Action::GitBranch { path, branch } => {
            run_checked(ctx, "git", &["checkout", "-b", branch], Some(path.as_path()), "git branch")?;
            tracing::info!(branch, "created and switched branch");
            Ok(())
        }
        Action::GitPush { path, remote, branch } => {
            run_checked(ctx, "git", &["push", remote, branch], Some(path.as_path()), "git push")?;
            tracing::info!(remote, branch, "pushed branch");
            Ok(())
        }
        Action::RunScript { path } => run_script(ctx, state, path),
        Action::RunTest { path } => run_test(ctx, state, path),
        Action::RunLint { path, tool, fix } => {
            run_lint(ctx, state, path, tool, *fix)?;
            state.add_feature(feature);
            Ok(())
        }
    }
}

fn run_checked(
    ctx: &ServiceContext,
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    what: &str,
) -> Result<(), String> {
    let output = ctx.process.run(program, args, cwd).map_err(|e| e.to_string())?;
    if output.success() {
        Ok(())
    } else {
        Err(format!("{what} failed: {}", output.stderr.trim()))
    }
}

fn install_dependency(
    ctx: &ServiceContext,
    state: &mut ProjectState,
    package: &str,
    version: Option<&str>,
) -> Result<(), String> {
    let cwd = state.project_root.clone();
    let output = match state.language {
        Language::Python => {
            let spec = version.map_or_else(|| package.to_string(), |v| format!("{package}=={v}"));
            let python = state.env_python().display().to_string();
            ctx.process
                .run(&python, &["-m", "pip", "install", &spec], cwd.as_deref())
                .map_err(|e| e.to_string())?
        }
        Language::Nodejs => {
            let spec = version.map_or_else(|| package.to_string(), |v| format!("{package}@{v}"));
            ctx.process
                .run("npm", &["install", &spec], cwd.as_deref())
                .map_err(|e| e.to_string())?
        }
    };
    if !output.success() {
        return Err(format!("failed to install {package}: {}", output.stderr.trim()));
    }
    let recorded =
        version.map_or_else(|| package.to_string(), |v| format!("{package}=={v}"));
    state.installed_deps.push(recorded);
    tracing::info!(package, version, "installed dependency");
    Ok(())
}

fn run_script(ctx: &ServiceContext, state: &ProjectState, path: &Path) -> Result<(), String> {
    let cwd = state.project_root.as_deref();
    let target = path.display().to_string();
    let output = match state.language {
        Language::Python => {
            let python = state.env_python().display().to_string();
            ctx.process.run(&python, &[&target], cwd).map_err(|e| e.to_string())?
        }
        Language::Nodejs => {
            ctx.process.run("node", &[&target], cwd).map_err(|e| e.to_string())?
        }
    };
    if output.success() {
        tracing::info!(path = %target, "ran script");
        Ok(())
    } else {
        Err(format!("script {target} failed: {}", output.stderr.trim()))
    }
}

fn run_test(ctx: &ServiceContext, state: &mut ProjectState, path: &Path) -> Result<(), String> {
    let cwd = state.project_root.clone();
    let target = path.display().to_string();
    let output = match state.language {
        Language::Python => {
            let python = state.env_python().display().to_string();
            ctx.process
                .run(&python, &["-m", "pytest", &target], cwd.as_deref())
                .map_err(|e| e.to_string())?
        }
        Language::Nodejs => ctx
            .process
            .run("npm", &["test", "--", &target], cwd.as_deref())
            .map_err(|e| e.to_string())?,
    };
    let verdict = if output.success() { "Passed" } else { "Failed" };
    state.test_results.push(format!("Tests for {target}: {verdict}\n{}", output.stdout));
    if output.success() {
        tracing::info!(path = %target, "tests passed");
        Ok(())
    } else {
        Err(format!("tests failed for {target}: {}", output.stderr.trim()))
    }
}

fn run_lint(
    ctx: &ServiceContext,
    state: &mut ProjectState,
    path: &Path,
    tool: &str,
    fix: bool,
) -> Result<(), String> {
    let cwd = state.project_root.clone();
    let target = path.display().to_string();
    let mut lint_result = format!("Linting {target} with {tool}: ");

    let output = match state.language {
        Language::Python => {
            let python = state.env_python().display().to_string();
            if fix {
                let fixed = ctx
                    .process
                    .run(&python, &["-m", "autopep8", "--in-place", &target], cwd.as_deref())
                    .map_err(|e| e.to_string())?;
                if fixed.success() {
                    lint_result.push_str("Fixed issues with autopep8. ");
                } else {
                    lint_result
                        .push_str(&format!("Autopep8 failed: {}. ", fixed.stderr.trim()));
                }
            }
            ctx.process
                .run(&python, &["-m", "flake8", &target], cwd.as_deref())
                .map_err(|e| e.to_string())?
        }
        Language::Nodejs => {
            let mut args = vec![target.as_str()];
            if fix {
                args.push("--fix");
            }
            ctx.process.run(tool, &args, cwd.as_deref()).map_err(|e| e.to_string())?
        }
    };
    if output.success() {
        lint_result.push_str("Passed");
    } else {
        lint_result.push_str(&format!("Issues found: {}", output.stdout.trim()));
    }
    tracing::info!(result = %lint_result, "lint finished");
    state.linting_results.push(lint_result);
    Ok(())
}
