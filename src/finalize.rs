//! Finalization: summary document, packaging scaffolding, and archive.
//!
//! Runs once, after the operator stops the loop. Each step is best
//! effort in isolation; a failed archive still leaves a usable project
//! directory and summary behind.

use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde_json::json;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::assess;
use crate::context::ServiceContext;
use crate::state::ProjectState;
use crate::task::Language;

/// File name of the generated summary document.
pub const SUMMARY_FILE: &str = "PROJECT_SUMMARY.md";

/// What finalization produced.
#[derive(Debug)]
pub struct FinalizeReport {
    /// Path of the written summary document.
    pub summary_path: PathBuf,
    /// Path of the zip archive, when archiving succeeded.
    pub archive_path: Option<PathBuf>,
}

/// Finalizes the project in place.
///
/// # Errors
///
/// Returns an error when there is no project root or the summary
/// cannot be written. Packaging scaffolding and archive failures are
/// logged and skipped instead.
pub fn finalize(ctx: &ServiceContext, state: &mut ProjectState) -> Result<FinalizeReport, String> {
    let root = state.project_root.clone().ok_or("no project root to finalize")?;

    if state.language == Language::Nodejs {
        ensure_package_json(ctx, state, &root);
    }
    upgrade_pip(ctx, state);

    let summary_path = root.join(SUMMARY_FILE);
    let summary = render_summary(state);
    ctx.fs
        .write(&summary_path, &summary)
        .map_err(|e| format!("write summary: {e}"))?;
    state.record_created_file(&summary_path);
    tracing::info!(path = %summary_path.display(), "generated project summary");

    let archive_path = match archive(&root) {
        Ok(path) => {
            tracing::info!(path = %path.display(), "created project archive");
            Some(path)
        }
        Err(err) => {
            tracing::warn!(%err, "skipping project archive");
            None
        }
    };

    Ok(FinalizeReport { summary_path, archive_path })
}

/// Writes a minimal `package.json` if the project lacks one.
fn ensure_package_json(ctx: &ServiceContext, state: &mut ProjectState, root: &Path) {
    let path = root.join("package.json");
    if ctx.fs.exists(&path) {
        return;
    }
    let name = root.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let manifest = json!({
        "name": name,
        "version": "1.0.0",
        "main": "app.js",
        "scripts": {"test": "jest"},
    });
    let contents = match serde_json::to_string_pretty(&manifest) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(%err, "could not serialize package.json");
            return;
        }
    };
    match ctx.fs.write(&path, &contents) {
        Ok(()) => {
            state.record_created_file(&path);
            tracing::info!("created package.json");
        }
        Err(err) => tracing::warn!(%err, "could not write package.json"),
    }
}

/// Upgrades pip inside the project environment, if one exists.
fn upgrade_pip(ctx: &ServiceContext, state: &ProjectState) {
    if state.env_path.is_none() {
        return;
    }
    let python = state.env_python().display().to_string();
    match ctx.process.run(&python, &["-m", "pip", "install", "--upgrade", "pip"], None) {
        Ok(output) if output.success() => tracing::info!("upgraded pip in environment"),
        Ok(output) => tracing::warn!(stderr = %output.stderr, "pip upgrade failed"),
        Err(err) => tracing::warn!(%err, "pip upgrade failed"),
    }
}

/// Renders the summary document from the final state.
fn render_summary(state: &ProjectState) -> String {
    let report = assess::assess(state);
    let root = state.project_root.clone().unwrap_or_default();
    let name = root.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let or_none = |items: Vec<String>| {
        if items.is_empty() { "None".to_string() } else { items.join(", ") }
    };

    let mut out = String::from("# Project Summary\n\n");
    out.push_str(&format!("- **Project**: {name}\n"));
    out.push_str(&format!("- **Directory**: {}\n", root.display()));
    out.push_str(&format!("- **Language**: {}\n", state.language));
    out.push_str(&format!("- **Completeness Score**: {}/100\n", report.score));
    out.push_str(&format!(
        "- **Features Implemented**: {}\n",
        or_none(state.features.iter().cloned().collect())
    ));
    out.push_str("- **Files Created**:\n");
    for file in &state.created_files {
        out.push_str(&format!("  - {}: {}\n", file.display(), classify_file(file)));
    }
    out.push_str(&format!(
        "- **Dependencies**: {}\n",
        or_none(state.installed_deps.clone())
    ));
    out.push_str("- **Linting Results**:\n");
    for result in &state.linting_results {
        out.push_str(&format!("  - {}\n", result.lines().next().unwrap_or_default()));
    }
    out.push_str("- **Test Results**:\n");
    for result in &state.test_results {
        out.push_str(&format!("  - {}\n", result.lines().next().unwrap_or_default()));
    }
    out.push_str(&format!("- **Issues**: {}\n", or_none(report.issues)));
    out.push_str("- **Run Instructions**:\n");
    match state.language {
        Language::Python => {
            if let Some(env) = &state.env_path {
                out.push_str(&format!(
                    "  - Activate virtual env: `source {}/bin/activate`\n",
                    env.display()
                ));
            }
            out.push_str("  - Run tests: `pytest`\n");
            out.push_str("  - Run app: `python app.py`\n");
        }
        Language::Nodejs => {
            out.push_str("  - Run tests: `npm test`\n");
            out.push_str("  - Run app: `node app.js`\n");
        }
    }
    out.push_str(&format!(
        "- **Oracle**: {}\n- **Total tasks**: {}\n",
        state.oracle,
        state.task_history.len()
    ));
    out
}

fn classify_file(path: &Path) -> &'static str {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    if name.contains("app.") {
        "Main app"
    } else if name.starts_with("test_") {
        "Test file"
    } else if name.ends_with(".md") {
        "Documentation"
    } else {
        "Other"
    }
}

/// Zips the project directory into a sibling `<root>.zip`.
///
/// Reads the real disk directly; the archive is a deliverable of the
/// live run, not part of engine state.
fn archive(root: &Path) -> Result<PathBuf, String> {
    if !root.is_dir() {
        return Err(format!("{} is not a directory on disk", root.display()));
    }
    let mut zip_path = root.as_os_str().to_owned();
    zip_path.push(".zip");
    let zip_path = PathBuf::from(zip_path);

    let file = File::create(&zip_path).map_err(|e| format!("create archive: {e}"))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    add_dir(&mut writer, root, root, options)?;
    writer.finish().map_err(|e| format!("finish archive: {e}"))?;
    Ok(zip_path)
}

fn add_dir(
    writer: &mut ZipWriter<File>,
    dir: &Path,
    root: &Path,
    options: SimpleFileOptions,
) -> Result<(), String> {
    let entries = std::fs::read_dir(dir).map_err(|e| format!("read {}: {e}", dir.display()))?;
    for entry in entries {
        let entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path();
        if path.is_dir() {
            add_dir(writer, &path, root, options)?;
        } else {
            let relative = path.strip_prefix(root).map_err(|e| e.to_string())?;
            writer
                .start_file(relative.to_string_lossy(), options)
                .map_err(|e| e.to_string())?;
            let contents =
                std::fs::read(&path).map_err(|e| format!("read {}: {e}", path.display()))?;
            writer.write_all(&contents).map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}
