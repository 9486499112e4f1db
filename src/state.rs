//! The engine's aggregate state and its append-only history.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::ports::OracleKind;
use crate::task::{Language, Task};

/// Content-hash registry used for idempotency checks.
///
/// Entries are updated only by successful file-producing actions and by
/// the summarizer when it reads a file for the context digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintStore {
    entries: BTreeMap<PathBuf, String>,
}

impl FingerprintStore {
    /// SHA-256 hex digest of file content.
    #[must_use]
    pub fn hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let mut hex = String::with_capacity(64);
        for byte in hasher.finalize() {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }

    /// Records the fingerprint of `content` for `path`.
    pub fn record(&mut self, path: &Path, content: &str) {
        self.entries.insert(path.to_path_buf(), Self::hash(content));
    }

    /// Returns the recorded fingerprint for `path`, if any.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Returns `true` if the recorded fingerprint for `path` matches the
    /// hash of `content`, meaning a write would be a no-op.
    #[must_use]
    pub fn matches(&self, path: &Path, content: &str) -> bool {
        self.get(path) == Some(Self::hash(content).as_str())
    }

    /// Drops the fingerprint for a deleted file.
    pub fn forget(&mut self, path: &Path) {
        self.entries.remove(path);
    }
}

/// One immutable entry in the audit trail.
///
/// Appended after every task attempt, never mutated or removed; the last
/// few entries feed the context digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHistoryEntry {
    /// The task as issued.
    pub task: Task,
    /// Batch-local index of the task.
    pub index: usize,
    /// Wire name of the action kind.
    pub action: String,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Fault description for failed attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Which oracle issued the batch.
    pub oracle: OracleKind,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
}

/// The aggregate root owned exclusively by the engine process.
///
/// Created at the first command, mutated by every executed task,
/// persisted wholesale at each checkpoint, and cleared on finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    /// Root directory of the project under construction.
    pub project_root: Option<PathBuf>,
    /// Current project language.
    pub language: Language,
    /// Isolated environment path, once one is created.
    pub env_path: Option<PathBuf>,
    /// Global task results keyed by execution sequence number.
    pub task_results: BTreeMap<u64, bool>,
    /// Next global sequence number.
    pub next_seq: u64,
    /// Files the engine has created, in creation order without duplicates.
    pub created_files: Vec<PathBuf>,
    /// Installed dependency specs (`package` or `package==version`).
    pub installed_deps: Vec<String>,
    /// Lint run outcomes, newest last.
    pub linting_results: Vec<String>,
    /// Test run outcomes, newest last.
    pub test_results: Vec<String>,
    /// Implemented feature tags.
    pub features: BTreeSet<String>,
    /// Append-only audit trail.
    pub task_history: Vec<TaskHistoryEntry>,
    /// Content-hash registry for idempotency checks.
    pub fingerprints: FingerprintStore,
    /// Completed iteration count.
    pub iteration: u32,
    /// The original operator command.
    pub command: Option<String>,
    /// The oracle backend chosen for this run.
    pub oracle: OracleKind,
    /// Identifier for this run, carried across resume.
    pub run_id: Uuid,
}

impl ProjectState {
    /// Creates fresh state for a new run.
    #[must_use]
    pub fn new(oracle: OracleKind, run_id: Uuid) -> Self {
        Self {
            project_root: None,
            language: Language::default(),
            env_path: None,
            task_results: BTreeMap::new(),
            next_seq: 0,
            created_files: Vec::new(),
            installed_deps: Vec::new(),
            linting_results: Vec::new(),
            test_results: Vec::new(),
            features: BTreeSet::new(),
            task_history: Vec::new(),
            fingerprints: FingerprintStore::default(),
            iteration: 0,
            command: None,
            oracle,
            run_id,
        }
    }

    /// Records a created file, keeping the list an ordered set.
    pub fn record_created_file(&mut self, path: &Path) {
        if !self.created_files.iter().any(|p| p == path) {
            self.created_files.push(path.to_path_buf());
        }
    }

    /// Removes a file from the created set (after deletion).
    pub fn remove_created_file(&mut self, path: &Path) {
        self.created_files.retain(|p| p != path);
    }

    /// Adds a feature tag; re-adding an existing tag is a no-op.
    pub fn add_feature(&mut self, feature: Option<&str>) {
        if let Some(feature) = feature {
            self.features.insert(feature.to_string());
        }
    }

    /// Records a global task result and advances the sequence counter.
    pub fn record_global_result(&mut self, success: bool) {
        self.task_results.insert(self.next_seq, success);
        self.next_seq += 1;
    }

    /// Appends an immutable history entry.
    pub fn push_history(&mut self, entry: TaskHistoryEntry) {
        self.task_history.push(entry);
    }

    /// Path to the interpreter inside the isolated environment, falling
    /// back to the system interpreter when no environment exists.
    #[must_use]
    pub fn env_python(&self) -> PathBuf {
        match &self.env_path {
            Some(env) => {
                if cfg!(windows) {
                    env.join("Scripts").join("python.exe")
                } else {
                    env.join("bin").join("python")
                }
            }
            None => PathBuf::from("python3"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Action;

    fn sample_state() -> ProjectState {
        ProjectState::new(OracleKind::Grok, Uuid::new_v4())
    }

    #[test]
    fn fingerprint_detects_unchanged_content() {
        let mut store = FingerprintStore::default();
        let path = Path::new("app.py");
        store.record(path, "print('hi')");

        assert!(store.matches(path, "print('hi')"));
        assert!(!store.matches(path, "print('bye')"));
    }

    #[test]
    fn fingerprint_forget_removes_entry() {
        let mut store = FingerprintStore::default();
        let path = Path::new("app.py");
        store.record(path, "x = 1");
        store.forget(path);

        assert!(store.get(path).is_none());
    }

    #[test]
    fn hash_is_hex_sha256() {
        let digest = FingerprintStore::hash("");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn created_files_is_an_ordered_set() {
        let mut state = sample_state();
        state.record_created_file(Path::new("a.py"));
        state.record_created_file(Path::new("b.py"));
        state.record_created_file(Path::new("a.py"));

        assert_eq!(state.created_files, vec![PathBuf::from("a.py"), PathBuf::from("b.py")]);
    }

    #[test]
    fn re_adding_a_feature_is_a_no_op() {
        let mut state = sample_state();
        state.add_feature(Some("authentication"));
        state.add_feature(Some("authentication"));

        assert_eq!(state.features.len(), 1);
    }

    #[test]
    fn global_results_advance_the_sequence() {
        let mut state = sample_state();
        state.record_global_result(true);
        state.record_global_result(false);

        assert_eq!(state.task_results.get(&0), Some(&true));
        assert_eq!(state.task_results.get(&1), Some(&false));
        assert_eq!(state.next_seq, 2);
    }

    #[test]
    fn env_python_falls_back_to_system_interpreter() {
        let state = sample_state();
        assert_eq!(state.env_python(), PathBuf::from("python3"));
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = sample_state();
        state.project_root = Some(PathBuf::from("my_app"));
        state.record_created_file(Path::new("my_app/app.py"));
        state.add_feature(Some("logging"));
        state.record_global_result(true);
        state.push_history(TaskHistoryEntry {
            task: Task {
                action: Action::CreateFile { path: "my_app/app.py".into(), content: String::new() },
                depends_on: Vec::new(),
                feature: Some("core".into()),
            },
            index: 0,
            action: "create_file".into(),
            success: true,
            error: None,
            oracle: OracleKind::Grok,
            timestamp: Utc::now(),
        });

        let text = serde_json::to_string(&state).unwrap();
        let back: ProjectState = serde_json::from_str(&text).unwrap();
        assert_eq!(state, back);
    }
}
