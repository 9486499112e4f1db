//! Task and batch types produced by the planning oracle.
//!
//! The oracle's wire format is a JSON object per task, discriminated by
//! an `action` tag. The closed [`Action`] enum replaces the original
//! free-form field bag: each variant carries only the fields relevant to
//! its action kind, and dispatch is an exhaustive match.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The project language, which selects toolchains and linters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python projects (pip, pytest, flake8).
    #[default]
    Python,
    /// Node.js projects (npm, jest, eslint).
    Nodejs,
}

impl Language {
    /// The linter mandated for this language.
    #[must_use]
    pub fn linter(self) -> &'static str {
        match self {
            Self::Python => "flake8",
            Self::Nodejs => "eslint",
        }
    }

    /// Source file extension for this language.
    #[must_use]
    pub fn source_extension(self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::Nodejs => "js",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Nodejs => write!(f, "nodejs"),
        }
    }
}

/// One build action, discriminated by the `action` tag on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Create a directory; the first one becomes the project root.
    CreateDirectory {
        /// Directory to create.
        path: PathBuf,
    },
    /// Create an isolated environment under the given directory.
    CreateVenv {
        /// Directory the environment lives under.
        path: PathBuf,
        /// Environment directory name, defaulting to `.venv`.
        #[serde(default)]
        name: Option<String>,
    },
    /// Switch the project language.
    SetLanguage {
        /// The new language.
        language: Language,
    },
    /// Write a source file.
    CreateFile {
        /// File path.
        path: PathBuf,
        /// File contents.
        #[serde(default)]
        content: String,
    },
    /// Overwrite an existing file with new content.
    ModifyFile {
        /// File path.
        path: PathBuf,
        /// Replacement contents.
        #[serde(default)]
        content: String,
    },
    /// Delete a file.
    DeleteFile {
        /// File path.
        path: PathBuf,
    },
    /// Install a package through the language's dependency manager.
    InstallDependency {
        /// Package name.
        package: String,
        /// Exact version, when pinned.
        #[serde(default)]
        version: Option<String>,
    },
    /// Initialize a git repository.
    InitGit {
        /// Repository path.
        path: PathBuf,
    },
    /// Stage everything and commit.
    GitCommit {
        /// Repository path.
        path: PathBuf,
        /// Commit message, defaulting to an automated one.
        #[serde(default)]
        message: Option<String>,
    },
    /// Create and switch to a branch.
    GitBranch {
        /// Repository path.
        path: PathBuf,
        /// Branch name.
        branch: String,
    },
    /// Push a branch to a remote.
    GitPush {
        /// Repository path.
        path: PathBuf,
        /// Remote name or URL.
        remote: String,
        /// Branch to push.
        branch: String,
    },
    /// Run a script with the language's interpreter.
    RunScript {
        /// Script path.
        path: PathBuf,
    },
    /// Write a test file.
    CreateTest {
        /// Test file path.
        path: PathBuf,
        /// Test contents.
        #[serde(default)]
        content: String,
    },
    /// Run the language's test runner against a file.
    RunTest {
        /// Test file path.
        path: PathBuf,
    },
    /// Write a documentation file.
    GenerateDocs {
        /// Documentation path.
        path: PathBuf,
        /// Documentation contents.
        #[serde(default)]
        content: String,
    },
    /// Run the language's linter, optionally auto-fixing first.
    RunLint {
        /// File to lint.
        path: PathBuf,
        /// Linter tool name; must match the language's mandated linter.
        tool: String,
        /// Whether to attempt automatic fixes.
        #[serde(default)]
        fix: bool,
    },
}

impl Action {
    /// The wire name of this action kind, used in history and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateDirectory { .. } => "create_directory",
            Self::CreateVenv { .. } => "create_venv",
            Self::SetLanguage { .. } => "set_language",
            Self::CreateFile { .. } => "create_file",
            Self::ModifyFile { .. } => "modify_file",
            Self::DeleteFile { .. } => "delete_file",
            Self::InstallDependency { .. } => "install_dependency",
            Self::InitGit { .. } => "init_git",
            Self::GitCommit { .. } => "git_commit",
            Self::GitBranch { .. } => "git_branch",
            Self::GitPush { .. } => "git_push",
            Self::RunScript { .. } => "run_script",
            Self::CreateTest { .. } => "create_test",
            Self::RunTest { .. } => "run_test",
            Self::GenerateDocs { .. } => "generate_docs",
            Self::RunLint { .. } => "run_lint",
        }
    }

    /// The filesystem path this action targets, when it has one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::CreateDirectory { path }
            | Self::CreateVenv { path, .. }
            | Self::CreateFile { path, .. }
            | Self::ModifyFile { path, .. }
            | Self::DeleteFile { path }
            | Self::InitGit { path }
            | Self::GitCommit { path, .. }
            | Self::GitBranch { path, .. }
            | Self::GitPush { path, .. }
            | Self::RunScript { path }
            | Self::CreateTest { path, .. }
            | Self::RunTest { path }
            | Self::GenerateDocs { path, .. }
            | Self::RunLint { path, .. } => Some(path),
            Self::SetLanguage { .. } | Self::InstallDependency { .. } => None,
        }
    }

    /// Whether this action introduces a feature when tagged with one.
    ///
    /// Feature-introducing tasks for an already-implemented feature are
    /// rejected as redundant at validation time.
    #[must_use]
    pub fn introduces_feature(&self) -> bool {
        matches!(self, Self::CreateFile { .. } | Self::InstallDependency { .. })
    }
}

/// One task in a batch: an action plus batch-local dependency indices
/// and an optional feature tag.
///
/// A task's identity is its position within the batch that issued it;
/// tasks are immutable once issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// The action to perform.
    #[serde(flatten)]
    pub action: Action,
    /// Indices of tasks in the same batch that must succeed first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<usize>,
    /// Feature tag grouping this task with others implementing one capability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
}

impl Task {
    /// A one-line JSON description of the task, used in recovery prompts
    /// and failure logs.
    #[must_use]
    pub fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.action.kind().to_string())
    }
}

/// An ordered batch of typed tasks from one oracle call.
///
/// `depends_on` indices are positional within this batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskBatch {
    /// Tasks in declaration order.
    pub tasks: Vec<Task>,
}

impl TaskBatch {
    /// Number of tasks in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if the batch contains no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
