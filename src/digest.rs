//! Context summarizer: a size-bounded project digest for the oracle.
//!
//! The digest is what every planning request carries in lieu of full
//! state: summaries of a handful of interesting files, the last few
//! history entries, and the completeness report. Its size is bounded
//! regardless of how large the project grows.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assess::{self, CompletenessReport};
use crate::ports::FileSystem;
use crate::state::{FingerprintStore, ProjectState, TaskHistoryEntry};
use crate::task::Language;

/// Files shorter than this are included in full.
const SMALL_FILE_LIMIT: usize = 500;
/// Lines quoted from the head of a truncated file.
const HEAD_LINES: usize = 5;
/// Declaration signatures extracted from a truncated file.
const MAX_SIGNATURES: usize = 3;
/// Recently touched files included beyond the key files.
const RECENT_FILES: usize = 3;
/// History entries included in the digest.
const RECENT_TASKS: usize = 5;

/// Summary of one file of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    /// The file path as recorded in state.
    pub path: String,
    /// Full content, for small files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Head lines plus extracted signatures, for large files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Content fingerprint at the time of reading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Compact project metadata repeated in every digest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestMetadata {
    /// Project root directory.
    pub project_root: Option<PathBuf>,
    /// Project language.
    pub language: Language,
    /// Implemented feature tags.
    pub features: Vec<String>,
    /// Installed dependency specs.
    pub dependencies: Vec<String>,
    /// Completed iteration count.
    pub iteration: u32,
    /// The operator command that started the run.
    pub original_command: Option<String>,
}

/// The bounded digest sent to the oracle on every planning call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextDigest {
    /// Project metadata.
    pub metadata: DigestMetadata,
    /// The freshly recomputed completeness report.
    pub completeness: CompletenessReport,
    /// Summaries of key and recently touched files.
    pub file_summaries: Vec<FileSummary>,
    /// The most recent history entries.
    pub recent_tasks: Vec<TaskHistoryEntry>,
    /// Outstanding issues, duplicated from the report for prompt emphasis.
    pub issues: Vec<String>,
    /// Missing catalog features, likewise duplicated.
    pub missing_features: Vec<String>,
}

/// Builds the digest from current state.
///
/// Reading a file for the digest records its fingerprint, which is what
/// later lets the validator flag no-op modifications.
pub fn build(state: &mut ProjectState, fs: &dyn FileSystem) -> ContextDigest {
    let completeness = assess::assess(state);

    let files = files_of_interest(state);
    let language = state.language;
    let mut file_summaries = Vec::with_capacity(files.len());
    for path in files {
        file_summaries.push(summarize_file(state, fs, &path, language));
    }

    let recent_tasks: Vec<TaskHistoryEntry> = state
        .task_history
        .iter()
        .rev()
        .take(RECENT_TASKS)
        .rev()
        .cloned()
        .collect();

    ContextDigest {
        metadata: DigestMetadata {
            project_root: state.project_root.clone(),
            language: state.language,
            features: state.features.iter().cloned().collect(),
            dependencies: state.installed_deps.clone(),
            iteration: state.iteration,
            original_command: state.command.clone(),
        },
        issues: completeness.issues.clone(),
        missing_features: completeness.missing_features.clone(),
        completeness,
        file_summaries,
        recent_tasks,
    }
}

/// Key files by naming convention plus the most recently touched files,
/// deduplicated while preserving order.
fn files_of_interest(state: &ProjectState) -> Vec<PathBuf> {
    let mut selected: Vec<PathBuf> = state
        .created_files
        .iter()
        .filter(|path| is_key_file(path))
        .cloned()
        .collect();

    let mut recent: Vec<&PathBuf> = state.created_files.iter().collect();
    recent.sort_by_key(|path| {
        std::cmp::Reverse(
            state
                .task_history
                .iter()
                .filter(|entry| entry.task.action.path() == Some(path.as_path()))
                .map(|entry| entry.timestamp)
                .max(),
        )
    });
    for path in recent.into_iter().take(RECENT_FILES) {
        if !selected.iter().any(|p| p == path) {
            selected.push(path.clone());
        }
    }
    selected
}

fn is_key_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.contains("app.") || name.starts_with("test_") || name.ends_with(".md")
}

fn summarize_file(
    state: &mut ProjectState,
    fs: &dyn FileSystem,
    path: &Path,
    language: Language,
) -> FileSummary {
    if !fs.exists(path) {
        return FileSummary {
            path: path.display().to_string(),
            content: None,
            summary: Some("File not found".to_string()),
            hash: None,
        };
    }
    let content = match fs.read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::error!(path = %path.display(), %err, "failed to summarize file");
            return FileSummary {
                path: path.display().to_string(),
                content: None,
                summary: Some("Error summarizing file".to_string()),
                hash: None,
            };
        }
    };

    let hash = FingerprintStore::hash(&content);
    state.fingerprints.record(path, &content);

    if content.len() < SMALL_FILE_LIMIT {
        return FileSummary {
            path: path.display().to_string(),
            content: Some(content),
            summary: None,
            hash: Some(hash),
        };
    }

    let mut summary: String =
        content.lines().take(HEAD_LINES).collect::<Vec<_>>().join("\n");
    summary.push_str("\n... (truncated)\n");
    let signatures = extract_signatures(&content, language);
    if !signatures.is_empty() {
        summary.push_str("Key definitions:\n");
        summary.push_str(&signatures.join("\n"));
        summary.push('\n');
    }

    FileSummary {
        path: path.display().to_string(),
        content: None,
        summary: Some(summary),
        hash: Some(hash),
    }
}

fn extract_signatures(content: &str, language: Language) -> Vec<String> {
    let prefixes: &[&str] = match language {
        Language::Python => &["def ", "class "],
        Language::Nodejs => &["function ", "class ", "const "],
    };
    content
        .lines()
        .map(str::trim)
        .filter(|line| prefixes.iter().any(|p| line.starts_with(p)))
        .take(MAX_SIGNATURES)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::MemFs;
    use crate::ports::OracleKind;
    use crate::task::{Action, Task};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn mem_fs(files: &[(&str, &str)]) -> MemFs {
        let fs = MemFs::default();
        for (path, content) in files {
            fs.write(Path::new(path), content).unwrap();
        }
        fs
    }

    fn state_with_files(files: &[&str]) -> ProjectState {
        let mut state = ProjectState::new(OracleKind::Grok, Uuid::new_v4());
        for file in files {
            state.record_created_file(Path::new(file));
        }
        state
    }

    #[test]
    fn small_files_are_included_in_full() {
        let fs = mem_fs(&[("app.py", "print('hi')\n")]);
        let mut state = state_with_files(&["app.py"]);

        let digest = build(&mut state, &fs);
        let summary = &digest.file_summaries[0];
        assert_eq!(summary.content.as_deref(), Some("print('hi')\n"));
        assert!(summary.summary.is_none());
    }

    #[test]
    fn large_files_are_truncated_with_signatures() {
        let mut content = String::new();
        for i in 0..40 {
            content.push_str(&format!("# filler line {i}\n"));
        }
        content.push_str("def handler(request):\n    pass\n");
        content.push_str("class Store:\n    pass\n");
        let fs = mem_fs(&[("app.py", &content)]);
        let mut state = state_with_files(&["app.py"]);

        let digest = build(&mut state, &fs);
        let summary = digest.file_summaries[0].summary.as_deref().unwrap();
        assert!(summary.contains("... (truncated)"));
        assert!(summary.contains("def handler(request):"));
        assert!(summary.contains("class Store:"));
        // Only the first five lines of the body are quoted.
        assert!(!summary.contains("filler line 10"));
    }

    #[test]
    fn reading_a_file_records_its_fingerprint() {
        let fs = mem_fs(&[("app.py", "x = 1\n")]);
        let mut state = state_with_files(&["app.py"]);

        build(&mut state, &fs);
        assert!(state.fingerprints.matches(Path::new("app.py"), "x = 1\n"));
    }

    #[test]
    fn missing_files_are_reported_not_fatal() {
        let fs = mem_fs(&[]);
        let mut state = state_with_files(&["app.py"]);

        let digest = build(&mut state, &fs);
        assert_eq!(digest.file_summaries[0].summary.as_deref(), Some("File not found"));
    }

    #[test]
    fn history_is_bounded_to_the_last_five_entries() {
        let fs = mem_fs(&[]);
        let mut state = state_with_files(&[]);
        for index in 0..8 {
            state.push_history(TaskHistoryEntry {
                task: Task {
                    action: Action::SetLanguage { language: Language::Python },
                    depends_on: Vec::new(),
                    feature: None,
                },
                index,
                action: "set_language".into(),
                success: true,
                error: None,
                oracle: OracleKind::Grok,
                timestamp: Utc::now(),
            });
        }

        let digest = build(&mut state, &fs);
        assert_eq!(digest.recent_tasks.len(), 5);
        assert_eq!(digest.recent_tasks[0].index, 3);
        assert_eq!(digest.recent_tasks[4].index, 7);
    }

    #[test]
    fn recently_touched_files_join_the_key_files() {
        let fs = mem_fs(&[
            ("app.py", "a\n"),
            ("util.py", "b\n"),
            ("helper.py", "c\n"),
        ]);
        let mut state = state_with_files(&["app.py", "util.py", "helper.py"]);
        let base = Utc::now();
        for (i, file) in ["util.py", "helper.py"].iter().enumerate() {
            state.push_history(TaskHistoryEntry {
                task: Task {
                    action: Action::CreateFile { path: file.into(), content: String::new() },
                    depends_on: Vec::new(),
                    feature: None,
                },
                index: i,
                action: "create_file".into(),
                success: true,
                error: None,
                oracle: OracleKind::Grok,
                timestamp: base + Duration::seconds(i64::try_from(i).unwrap()),
            });
        }

        let digest = build(&mut state, &fs);
        let paths: Vec<&str> =
            digest.file_summaries.iter().map(|s| s.path.as_str()).collect();
        assert!(paths.contains(&"app.py"));
        assert!(paths.contains(&"util.py"));
        assert!(paths.contains(&"helper.py"));
    }
}
