//! Agents, their credential lanes, and the tools they may call.
//!
//! Six fixed roles share two model lanes. Each run builds a fresh set of
//! agents through the [`CredentialRouter`]; an agent answers one task at a
//! time through a bounded tool-calling loop.

mod router;
mod runner;
mod tools;

pub use router::{CredentialRouter, LaneModels};
pub use runner::{Agent, AgentResponse, ToolCallRecord};
pub use tools::{parse_tool_call, tool_definitions, FileAction, ToolCall, ToolContext};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One credential/model pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    A,
    B,
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lane::A => write!(f, "A"),
            Lane::B => write!(f, "B"),
        }
    }
}

/// The six agent roles of the study pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    NoteSummarizer,
    StudyScheduler,
    ResourceFinder,
    QuizGenerator,
    ProgressTracker,
    StudyCoordinator,
}

impl AgentRole {
    pub const ALL: [AgentRole; 6] = [
        AgentRole::NoteSummarizer,
        AgentRole::StudyScheduler,
        AgentRole::ResourceFinder,
        AgentRole::QuizGenerator,
        AgentRole::ProgressTracker,
        AgentRole::StudyCoordinator,
    ];

    /// Human-readable role name, as recorded in session memory.
    pub fn title(&self) -> &'static str {
        match self {
            AgentRole::NoteSummarizer => "Note Summarizer",
            AgentRole::StudyScheduler => "Study Scheduler",
            AgentRole::ResourceFinder => "Resource Finder",
            AgentRole::QuizGenerator => "Quiz Generator",
            AgentRole::ProgressTracker => "Progress Tracker",
            AgentRole::StudyCoordinator => "Study Coordinator",
        }
    }

    /// Tools this role is allowed to call.
    pub fn capabilities(&self) -> BTreeSet<Capability> {
        match self {
            AgentRole::NoteSummarizer => BTreeSet::from([Capability::FileReadWrite]),
            AgentRole::ResourceFinder => BTreeSet::from([Capability::WebSearch]),
            _ => BTreeSet::new(),
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// Tool families an agent can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    WebSearch,
    FileReadWrite,
}
