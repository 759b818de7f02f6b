//! Plain-text extraction from uploaded study documents.
//!
//! Supports PDF, DOCX and PPTX; anything else is decoded as UTF-8.

mod office;

pub use office::{extract_docx_text, extract_pptx_text};

use crate::error::{Result, StudyError};
use tracing::{debug, warn};

/// Document formats recognized by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Pptx,
    Text,
}

impl DocumentKind {
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_lowercase();
        if lower.ends_with(".pdf") {
            DocumentKind::Pdf
        } else if lower.ends_with(".docx") || lower.ends_with(".doc") {
            DocumentKind::Docx
        } else if lower.ends_with(".pptx") {
            DocumentKind::Pptx
        } else {
            DocumentKind::Text
        }
    }
}

/// Extract text, failing on unreadable documents.
pub fn try_extract_text(filename: &str, bytes: &[u8]) -> Result<String> {
    let kind = DocumentKind::from_filename(filename);
    debug!("Extracting {:?} text from {} ({} bytes)", kind, filename, bytes.len());

    let text = match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| StudyError::Extraction(format!("PDF: {}", e)))?,
        DocumentKind::Docx => extract_docx_text(bytes)?,
        DocumentKind::Pptx => extract_pptx_text(bytes)?,
        DocumentKind::Text => String::from_utf8_lossy(bytes).into_owned(),
    };

    Ok(text.trim().to_string())
}

/// Extract text, logging failures and returning an empty string instead.
pub fn extract_text(filename: &str, bytes: &[u8]) -> String {
    try_extract_text(filename, bytes).unwrap_or_else(|e| {
        warn!("Could not extract text from {}: {}", filename, e);
        String::new()
    })
}
