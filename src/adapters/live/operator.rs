//! Live operator channel over stdin/stdout.

use std::io::{BufRead, Write};

use crate::ports::{IterationReview, Operator, OperatorSignal};

/// Live operator that prompts on the terminal after each iteration.
pub struct LiveOperator;

/// What a first-line answer means before any follow-up prompt.
#[derive(Debug, PartialEq, Eq)]
enum Parsed {
    Signal(OperatorSignal),
    /// Choice 2 without an inline feature name; ask for one.
    AskFeature,
}

impl Operator for LiveOperator {
    fn review(
        &self,
        review: &IterationReview,
    ) -> Result<OperatorSignal, Box<dyn std::error::Error + Send + Sync>> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        write!(out, "{}", format_review(review))?;
        out.flush()?;

        let line = read_line()?;
        match parse_choice(&line) {
            Parsed::Signal(signal) => Ok(signal),
            Parsed::AskFeature => {
                write!(out, "Enter feature to add: ")?;
                out.flush()?;
                let feature = read_line()?;
                Ok(OperatorSignal::AddFeature(feature))
            }
        }
    }
}

fn read_line() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_lowercase())
}

/// Renders the end-of-iteration report and menu.
fn format_review(review: &IterationReview) -> String {
    let or_none = |items: &[String]| {
        if items.is_empty() { "None".to_string() } else { items.join(", ") }
    };
    let directory = review
        .project_root
        .as_ref()
        .map_or_else(|| "None".to_string(), |root| root.display().to_string());
    format!(
        "\nIteration {} completed\n\
         Project State:\n\
         - Directory: {directory}\n\
         - Features: {}\n\
         - Files Created: {}\n\
         - Dependencies: {}\n\
         - Completeness Score: {}/100\n\
         - Issues: {}\n\
         - Suggested Features: {}\n\
         \nOptions:\n\
         1. Continue (oracle suggests next enhancements)\n\
         2. Add specific feature (e.g., 'add authentication')\n\
         3. Stop and finalize project\n\
         4. Pause (resume later)\n\
         Enter choice (1-4) or feature to add: ",
        review.iteration,
        or_none(&review.features),
        review.files_created,
        or_none(&review.installed_deps),
        review.report.score,
        or_none(&review.report.issues),
        or_none(&review.report.missing_features),
    )
}

/// Maps a lowercased first-line answer to a signal.
///
/// Unrecognized input defaults to continue, matching the menu's hint.
fn parse_choice(choice: &str) -> Parsed {
    match choice {
        "1" | "continue" => Parsed::Signal(OperatorSignal::Continue),
        "2" => Parsed::AskFeature,
        "3" | "stop" => Parsed::Signal(OperatorSignal::Stop),
        "4" | "pause" => Parsed::Signal(OperatorSignal::Pause),
        other => {
            if let Some(feature) = other.strip_prefix("add ") {
                Parsed::Signal(OperatorSignal::AddFeature(feature.trim().to_string()))
            } else {
                Parsed::Signal(OperatorSignal::Continue)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assess::CompletenessReport;

    #[test]
    fn numeric_and_word_choices_map_to_signals() {
        assert_eq!(parse_choice("1"), Parsed::Signal(OperatorSignal::Continue));
        assert_eq!(parse_choice("continue"), Parsed::Signal(OperatorSignal::Continue));
        assert_eq!(parse_choice("3"), Parsed::Signal(OperatorSignal::Stop));
        assert_eq!(parse_choice("stop"), Parsed::Signal(OperatorSignal::Stop));
        assert_eq!(parse_choice("4"), Parsed::Signal(OperatorSignal::Pause));
        assert_eq!(parse_choice("pause"), Parsed::Signal(OperatorSignal::Pause));
    }

    #[test]
    fn inline_add_carries_the_feature_name() {
        assert_eq!(
            parse_choice("add authentication"),
            Parsed::Signal(OperatorSignal::AddFeature("authentication".into()))
        );
    }

    #[test]
    fn bare_choice_two_asks_for_a_feature() {
        assert_eq!(parse_choice("2"), Parsed::AskFeature);
    }

    #[test]
    fn garbage_defaults_to_continue() {
        assert_eq!(parse_choice("whatever"), Parsed::Signal(OperatorSignal::Continue));
    }

    #[test]
    fn review_lists_state_and_menu() {
        let review = IterationReview {
            iteration: 4,
            project_root: Some("my_app".into()),
            features: vec!["authentication".into()],
            files_created: 3,
            installed_deps: vec!["flask==3.0.0".into()],
            report: CompletenessReport {
                score: 64,
                issues: vec!["No test files found".into()],
                missing_features: vec!["docker".into()],
                is_complete: false,
            },
        };

        let text = format_review(&review);

        assert!(text.contains("Iteration 4 completed"));
        assert!(text.contains("- Directory: my_app"));
        assert!(text.contains("- Features: authentication"));
        assert!(text.contains("- Completeness Score: 64/100"));
        assert!(text.contains("1. Continue"));
    }
}
