//! Configuration module for studycrew.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AgentProfile, AgentProfiles, Prompts, TaskPrompt, TaskPrompts};
pub use settings::{
    AgentSettings, GeneralSettings, LaneSet, LaneSettings, PipelineSettings, PromptSettings,
    RoutingSettings, SearchSettings, ServerSettings, Settings,
};
