//! Extract command implementation.

use crate::cli::Output;
use crate::documents;
use anyhow::{Context, Result};
use std::path::Path;

/// Print the plain text of a study document.
pub fn run_extract(file: &Path) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let text = documents::try_extract_text(&name, &bytes)?;
    if text.is_empty() {
        Output::warning(&format!("{} contains no extractable text", file.display()));
    } else {
        println!("{}", text);
    }

    Ok(())
}
