//! `forge status` command.

use std::path::Path;

use crate::adapters::live::filesystem::LiveFileSystem;
use crate::assess;
use crate::checkpoint::CheckpointStore;

/// Execute the `status` command.
///
/// Reads the checkpoint without resuming and prints a short report.
///
/// # Errors
///
/// Returns an error string when the checkpoint exists but is unusable.
pub fn run(state_dir: &Path) -> Result<(), String> {
    let store = CheckpointStore::new(state_dir);
    let Some(state) = store.load(&LiveFileSystem).map_err(|e| e.to_string())? else {
        println!("No saved state in {}.", state_dir.display());
        return Ok(());
    };

    let report = assess::assess(&state);
    let or_none = |items: Vec<String>| {
        if items.is_empty() { "None".to_string() } else { items.join(", ") }
    };

    println!("Command: {}", state.command.as_deref().unwrap_or("None"));
    println!("Iteration: {}", state.iteration);
    println!("Oracle: {}", state.oracle);
    println!(
        "Directory: {}",
        state
            .project_root
            .as_ref()
            .map_or_else(|| "None".to_string(), |root| root.display().to_string())
    );
    println!("Language: {}", state.language);
    println!("Files created: {}", state.created_files.len());
    println!("Features: {}", or_none(state.features.iter().cloned().collect()));
    println!("Dependencies: {}", or_none(state.installed_deps.clone()));
    println!("Completeness: {}/100", report.score);
    println!("Issues: {}", or_none(report.issues));
    Ok(())
}
