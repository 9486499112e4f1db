//! Checkpoint manager: durable snapshots of engine state.
//!
//! Two JSON documents are maintained side by side: the full
//! [`ProjectState`] and the bounded context digest. Both are written
//! with a write-to-temp-then-rename discipline so that a concurrent
//! reader never observes a half-written file. A single engine process
//! is assumed to own both files exclusively.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::digest::ContextDigest;
use crate::ports::FileSystem;
use crate::state::ProjectState;

/// File name of the persisted state document.
pub const STATE_FILE: &str = "forge_state.json";
/// File name of the persisted context digest.
pub const CONTEXT_FILE: &str = "forge_context.json";

/// Faults raised by checkpoint operations.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Reading or writing a checkpoint file failed.
    #[error("checkpoint I/O failed: {0}")]
    Io(String),
    /// A checkpoint file exists but does not parse.
    #[error("checkpoint file is corrupt: {0}")]
    Corrupt(String),
    /// The recorded project root no longer exists; resuming would land
    /// in a broken state, so a fresh command is required.
    #[error("recorded project root {0} no longer exists")]
    MissingProjectRoot(PathBuf),
}

/// The persisted state document: the full state plus a save timestamp.
///
/// The state sits under its own key; flattening it would break the
/// integer-keyed result map on reload.
#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    state: ProjectState,
    last_updated: DateTime<Utc>,
}

/// Reads and writes the checkpoint files in a fixed directory.
pub struct CheckpointStore {
    state_path: PathBuf,
    context_path: PathBuf,
}

impl CheckpointStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self { state_path: dir.join(STATE_FILE), context_path: dir.join(CONTEXT_FILE) }
    }

    /// Returns `true` if a state file exists.
    #[must_use]
    pub fn has_checkpoint(&self, fs: &dyn FileSystem) -> bool {
        fs.exists(&self.state_path)
    }

    /// Persists the full state and the context digest.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Io`] if serialization or either write
    /// fails. The state file is written before the digest; a failure in
    /// between leaves the previous digest intact rather than a torn one.
    pub fn save(
        &self,
        fs: &dyn FileSystem,
        state: &ProjectState,
        digest: &ContextDigest,
        now: DateTime<Utc>,
    ) -> Result<(), CheckpointError> {
        let document = StateDocument { state: state.clone(), last_updated: now };
        let state_json = serde_json::to_string_pretty(&document)
            .map_err(|e| CheckpointError::Io(format!("serialize state: {e}")))?;
        write_atomic(fs, &self.state_path, &state_json)?;

        let digest_json = serde_json::to_string_pretty(digest)
            .map_err(|e| CheckpointError::Io(format!("serialize digest: {e}")))?;
        write_atomic(fs, &self.context_path, &digest_json)?;

        tracing::info!(path = %self.state_path.display(), "checkpoint saved");
        Ok(())
    }

    /// Loads the persisted state, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Corrupt`] when the file does not
    /// parse, and [`CheckpointError::MissingProjectRoot`] when the
    /// recorded project root has disappeared.
    pub fn load(&self, fs: &dyn FileSystem) -> Result<Option<ProjectState>, CheckpointError> {
        if !fs.exists(&self.state_path) {
            return Ok(None);
        }
        let contents = fs
            .read_to_string(&self.state_path)
            .map_err(|e| CheckpointError::Io(e.to_string()))?;
        let document: StateDocument = serde_json::from_str(&contents)
            .map_err(|e| CheckpointError::Corrupt(e.to_string()))?;
        if let Some(root) = &document.state.project_root {
            if !fs.exists(root) {
                return Err(CheckpointError::MissingProjectRoot(root.clone()));
            }
        }
        tracing::info!(path = %self.state_path.display(), "checkpoint loaded");
        Ok(Some(document.state))
    }

    /// Removes both checkpoint files after finalization or abandonment.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Io`] if a removal fails.
    pub fn clear(&self, fs: &dyn FileSystem) -> Result<(), CheckpointError> {
        for path in [&self.state_path, &self.context_path] {
            if fs.exists(path) {
                fs.remove_file(path).map_err(|e| CheckpointError::Io(e.to_string()))?;
            }
        }
        Ok(())
    }
}

fn write_atomic(
    fs: &dyn FileSystem,
    path: &Path,
    contents: &str,
) -> Result<(), CheckpointError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs.write(&tmp, contents).map_err(|e| CheckpointError::Io(e.to_string()))?;
    fs.rename(&tmp, path).map_err(|e| CheckpointError::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::live::filesystem::LiveFileSystem;
    use crate::digest;
    use crate::ports::OracleKind;
    use uuid::Uuid;

    fn sample_state(root: Option<PathBuf>) -> ProjectState {
        let mut state = ProjectState::new(OracleKind::Gemini, Uuid::new_v4());
        state.project_root = root;
        state.command = Some("build a web app".into());
        state.iteration = 3;
        state.record_created_file(Path::new("app.py"));
        state.add_feature(Some("logging"));
        state.record_global_result(true);
        state
    }

    #[test]
    fn save_then_load_round_trips_state() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LiveFileSystem;
        let store = CheckpointStore::new(dir.path());

        let mut state = sample_state(Some(dir.path().to_path_buf()));
        let digest = digest::build(&mut state, &fs);
        store.save(&fs, &state, &digest, Utc::now()).unwrap();

        let loaded = store.load(&fs).unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn load_without_checkpoint_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());

        assert!(store.load(&LiveFileSystem).unwrap().is_none());
    }

    #[test]
    fn load_fails_when_project_root_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LiveFileSystem;
        let store = CheckpointStore::new(dir.path());

        let gone = dir.path().join("vanished_project");
        let mut state = sample_state(Some(gone));
        let digest = digest::build(&mut state, &fs);
        store.save(&fs, &state, &digest, Utc::now()).unwrap();

        let result = store.load(&fs);
        assert!(matches!(result, Err(CheckpointError::MissingProjectRoot(_))));
    }

    #[test]
    fn corrupt_state_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LiveFileSystem;
        let store = CheckpointStore::new(dir.path());
        fs.write(&dir.path().join(STATE_FILE), "{not json").unwrap();

        assert!(matches!(store.load(&fs), Err(CheckpointError::Corrupt(_))));
    }

    #[test]
    fn no_temp_files_remain_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LiveFileSystem;
        let store = CheckpointStore::new(dir.path());

        let mut state = sample_state(Some(dir.path().to_path_buf()));
        let digest = digest::build(&mut state, &fs);
        store.save(&fs, &state, &digest, Utc::now()).unwrap();

        let leftovers: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.unwrap().file_name().into_string().ok())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
    }

    #[test]
    fn clear_removes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LiveFileSystem;
        let store = CheckpointStore::new(dir.path());

        let mut state = sample_state(Some(dir.path().to_path_buf()));
        let digest = digest::build(&mut state, &fs);
        store.save(&fs, &state, &digest, Utc::now()).unwrap();
        store.clear(&fs).unwrap();

        assert!(!fs.exists(&dir.path().join(STATE_FILE)));
        assert!(!fs.exists(&dir.path().join(CONTEXT_FILE)));
    }
}
