//! Run command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::documents;
use crate::orchestrator::{Orchestrator, StudyRequest};
use crate::relay;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Generate a study plan in the terminal.
pub async fn run_study(
    topic: &str,
    notes: Option<String>,
    notes_file: Option<PathBuf>,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Run, &settings)?;

    let notes = match (notes, notes_file) {
        (Some(notes), _) => notes,
        (None, Some(path)) => read_notes(&path)?,
        (None, None) => String::new(),
    };

    let capacity = settings.server.relay_capacity;
    let orchestrator = Orchestrator::new(settings)?;

    Output::header(&format!("Study plan: {}", topic));
    if !notes.is_empty() {
        Output::kv("Notes", &format!("{} characters", notes.chars().count()));
    }
    println!();

    let (tx, mut rx) = relay::channel(capacity);
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            Output::relay_line(&line);
        }
    });

    let request = StudyRequest {
        topic: topic.to_string(),
        notes,
    };
    let result = orchestrator.run(&request, &tx).await;
    drop(tx);
    printer.await?;

    match result {
        Ok(outcome) => {
            Output::header("Final Report");
            println!("\n{}\n", outcome.report);
            Output::header("Session");
            for line in outcome.memory.context_summary().lines() {
                println!("  {}", line);
            }
            println!();
            Output::success(&format!("Saved to {}", outcome.memory.dir().display()));
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Error during mission: {}", e));
            Err(e.into())
        }
    }
}

fn read_notes(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let spinner = Output::spinner(&format!("Extracting text from {}...", name));
    let text = documents::extract_text(&name, &bytes);
    spinner.finish_and_clear();

    if text.is_empty() {
        Output::warning(&format!("No text could be extracted from {}", path.display()));
    }
    Ok(text)
}
