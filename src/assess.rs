//! Completeness assessor: a fixed rubric over project state.

use serde::{Deserialize, Serialize};

use crate::state::ProjectState;

/// The catalog of production concerns the rubric awards points for.
pub const PRODUCTION_FEATURES: [&str; 5] =
    ["authentication", "database", "logging", "docker", "ci_cd"];

/// Derived completeness report.
///
/// Recomputed on demand from [`ProjectState`]; never persisted as
/// authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletenessReport {
    /// Rubric score, 0 to 100.
    pub score: u8,
    /// Outstanding problems blocking completion.
    pub issues: Vec<String>,
    /// Catalog features not yet implemented.
    pub missing_features: Vec<String>,
    /// True when the score is at least 80 and no issues remain.
    pub is_complete: bool,
}

/// Scores the project against the rubric.
///
/// +20 for a main source file, +20 for a test file, +20 when some test
/// run passed, +20 when every lint run passed or was fixed, and +4 per
/// implemented catalog feature.
#[must_use]
pub fn assess(state: &ProjectState) -> CompletenessReport {
    let mut score = 0u8;
    let mut issues = Vec::new();

    let ext = state.language.source_extension();
    let has_main = state.created_files.iter().any(|path| {
        path.extension().is_some_and(|e| e == ext)
            && !file_name_starts_with(path, "test_")
    });
    if has_main {
        score += 20;
    } else {
        issues.push("No main script found".to_string());
    }

    let has_tests = state.created_files.iter().any(|path| {
        path.extension().is_some_and(|e| e == ext) && file_name_starts_with(path, "test_")
    });
    if has_tests {
        score += 20;
    } else {
        issues.push("No test files found".to_string());
    }

    let tests_passing = state.test_results.iter().any(|r| r.contains("Passed"));
    if tests_passing {
        score += 20;
    } else if has_tests {
        issues.push("Tests are failing".to_string());
    }

    let linting_passed = state
        .linting_results
        .iter()
        .all(|r| r.contains("Passed") || r.contains("Fixed"));
    if linting_passed {
        score += 20;
    } else {
        issues.push("Linting issues detected".to_string());
    }

    let implemented: Vec<&str> = PRODUCTION_FEATURES
        .iter()
        .copied()
        .filter(|f| state.features.contains(*f))
        .collect();
    score += u8::try_from(implemented.len() * 4).unwrap_or(20);
    let missing_features: Vec<String> = PRODUCTION_FEATURES
        .iter()
        .copied()
        .filter(|f| !state.features.contains(*f))
        .map(String::from)
        .collect();
    if !missing_features.is_empty() {
        issues.push(format!("Missing production features: {}", missing_features.join(", ")));
    }

    let is_complete = score >= 80 && issues.is_empty();
    CompletenessReport { score, issues, missing_features, is_complete }
}

fn file_name_starts_with(path: &std::path::Path, prefix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::OracleKind;
    use std::path::Path;
    use uuid::Uuid;

    fn empty_state() -> ProjectState {
        ProjectState::new(OracleKind::Grok, Uuid::new_v4())
    }

    fn full_state() -> ProjectState {
        let mut state = empty_state();
        state.record_created_file(Path::new("my_app/app.py"));
        state.record_created_file(Path::new("my_app/test_app.py"));
        state.test_results.push("Tests for test_app.py: Passed".into());
        state.linting_results.push("Linting app.py with flake8: Passed".into());
        for feature in PRODUCTION_FEATURES {
            state.add_feature(Some(feature));
        }
        state
    }

    #[test]
    fn empty_project_scores_twenty_and_is_incomplete() {
        // Vacuous lint pass still awards its 20 points.
        let report = assess(&empty_state());
        assert_eq!(report.score, 20);
        assert!(!report.is_complete);
        assert!(report.issues.iter().any(|i| i.contains("No main script")));
        assert_eq!(report.missing_features.len(), PRODUCTION_FEATURES.len());
    }

    #[test]
    fn fully_built_project_is_complete() {
        let report = assess(&full_state());
        assert_eq!(report.score, 100);
        assert!(report.issues.is_empty());
        assert!(report.is_complete);
        assert!(report.missing_features.is_empty());
    }

    #[test]
    fn failing_lint_withholds_points_and_raises_an_issue() {
        let mut state = full_state();
        state.linting_results.push("Linting app.py with flake8: Issues found: E501".into());

        let report = assess(&state);
        assert_eq!(report.score, 80);
        assert!(report.issues.iter().any(|i| i.contains("Linting")));
        assert!(!report.is_complete);
    }

    #[test]
    fn fixed_lint_counts_as_passing() {
        let mut state = full_state();
        state.linting_results.push("Linting app.py with flake8: Fixed issues with autopep8. Passed".into());

        assert!(assess(&state).is_complete);
    }

    #[test]
    fn test_files_without_passes_flag_failing_tests() {
        let mut state = empty_state();
        state.record_created_file(Path::new("test_app.py"));
        state.test_results.push("Tests for test_app.py: Failed".into());

        let report = assess(&state);
        assert!(report.issues.iter().any(|i| i.contains("failing")));
    }

    #[test]
    fn score_is_monotonic_in_rubric_inputs() {
        // Flip each rubric input on in sequence; the score must never drop.
        let mut state = empty_state();
        let mut last = assess(&state).score;

        state.record_created_file(Path::new("app.py"));
        let s = assess(&state).score;
        assert!(s >= last);
        last = s;

        state.record_created_file(Path::new("test_app.py"));
        let s = assess(&state).score;
        assert!(s >= last);
        last = s;

        state.test_results.push("Tests for test_app.py: Passed".into());
        let s = assess(&state).score;
        assert!(s >= last);
        last = s;

        for feature in PRODUCTION_FEATURES {
            state.add_feature(Some(feature));
            let s = assess(&state).score;
            assert!(s >= last);
            last = s;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn nodejs_projects_look_for_js_files() {
        let mut state = empty_state();
        state.language = crate::task::Language::Nodejs;
        state.record_created_file(Path::new("app.js"));

        let report = assess(&state);
        assert!(!report.issues.iter().any(|i| i.contains("No main script")));
    }
}
