//! studycrew - Multi-agent study assistant
//!
//! Turns raw study notes into a summary, a study schedule, a curated resource
//! list, a practice quiz, a progress analysis and a final synthesized report by
//! running a fixed pipeline of six LLM agents.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `llm` - Chat model seam, quota-safe retry wrapper and request pacing
//! - `agent` - Agent roles, credential lanes and the tool-calling runner
//! - `search` - Academic paper search used by the resource finder
//! - `materials` - Sandboxed study-material file store
//! - `pipeline` - The six static task definitions
//! - `memory` - File-backed session journals
//! - `relay` - Progress log channel from a run to a streaming consumer
//! - `documents` - Plain-text extraction for uploaded documents
//! - `orchestrator` - Sequential pipeline execution
//!
//! # Example
//!
//! ```rust,no_run
//! use studycrew::config::Settings;
//! use studycrew::orchestrator::{Orchestrator, StudyRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Arc::new(Orchestrator::new(settings)?);
//!
//!     let mut log = orchestrator.start(StudyRequest {
//!         topic: "Linear algebra".to_string(),
//!         notes: "Eigenvalues, eigenvectors, diagonalization".to_string(),
//!     });
//!     while let Some(line) = log.recv().await {
//!         print!("{}", line);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod documents;
pub mod error;
pub mod llm;
pub mod materials;
pub mod memory;
pub mod openai;
pub mod orchestrator;
pub mod pipeline;
pub mod relay;
pub mod search;

pub use error::{Result, StudyError};
