//! Error types for studycrew.

use thiserror::Error;

/// Library-level error type for studycrew operations.
#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Quota still exhausted after {attempts} attempt(s): {last_error}")]
    QuotaRetriesExhausted { attempts: u32, last_error: String },

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Task '{task}' failed: {reason}")]
    Task { task: String, reason: String },

    #[error("Session memory error: {0}")]
    Memory(String),

    #[error("Document extraction failed: {0}")]
    Extraction(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for studycrew operations.
pub type Result<T> = std::result::Result<T, StudyError>;
