//! CLI module for studycrew.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// studycrew - multi-agent study plan generator
///
/// Six specialised agents turn a topic and your notes into a summary, a
/// schedule, resources, a quiz, a progress strategy and a final study report.
#[derive(Parser, Debug)]
#[command(name = "studycrew")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a study plan for a topic
    Run {
        /// What to study
        #[arg(short, long)]
        topic: String,

        /// Study notes as text
        #[arg(short, long, conflicts_with = "notes_file")]
        notes: Option<String>,

        /// Read study notes from a file (PDF, DOCX, PPTX, TXT, MD)
        #[arg(long)]
        notes_file: Option<PathBuf>,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Extract plain text from a study document
    Extract {
        /// PDF, DOCX, PPTX or text file
        file: PathBuf,
    },

    /// Inspect stored study sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// List stored sessions
    List,

    /// Show a session's context summary
    Show {
        /// Session ID (e.g. study_1a2b3c4d)
        id: String,
    },

    /// Print agent outputs
    Outputs {
        /// Session ID
        id: String,

        /// Only outputs from this agent (e.g. "Quiz Generator")
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Search agent outputs for a keyword (case-insensitive)
    Search {
        /// Session ID
        id: String,

        /// Keyword to look for
        keyword: String,
    },

    /// Print the conversation history
    History {
        /// Session ID
        id: String,

        /// Only the last N turns
        #[arg(short, long)]
        last: Option<usize>,
    },

    /// Clear outputs, conversation and metadata of a session
    Clear {
        /// Session ID
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
