//! The six study tasks and how they feed each other.
//!
//! Five independent tasks run first; the report compilation task consumes
//! all five outputs as its context.

use crate::agent::AgentRole;
use crate::config::{Prompts, TaskPrompt};
use crate::error::{Result, StudyError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One of the fixed pipeline tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Summarization,
    Scheduling,
    ResourceFinding,
    QuizGeneration,
    ProgressAnalysis,
    ReportCompilation,
}

impl TaskKind {
    /// Execution order.
    pub const ORDER: [TaskKind; 6] = [
        TaskKind::Summarization,
        TaskKind::Scheduling,
        TaskKind::ResourceFinding,
        TaskKind::QuizGeneration,
        TaskKind::ProgressAnalysis,
        TaskKind::ReportCompilation,
    ];

    /// Name recorded in session memory.
    pub fn title(&self) -> &'static str {
        match self {
            TaskKind::Summarization => "Note Summarization",
            TaskKind::Scheduling => "Study Planning",
            TaskKind::ResourceFinding => "Resource Finding",
            TaskKind::QuizGeneration => "Quiz Generation",
            TaskKind::ProgressAnalysis => "Progress Analysis",
            TaskKind::ReportCompilation => "Final Report Compilation",
        }
    }

    pub fn role(&self) -> AgentRole {
        match self {
            TaskKind::Summarization => AgentRole::NoteSummarizer,
            TaskKind::Scheduling => AgentRole::StudyScheduler,
            TaskKind::ResourceFinding => AgentRole::ResourceFinder,
            TaskKind::QuizGeneration => AgentRole::QuizGenerator,
            TaskKind::ProgressAnalysis => AgentRole::ProgressTracker,
            TaskKind::ReportCompilation => AgentRole::StudyCoordinator,
        }
    }

    /// Tasks whose outputs this task needs, in context order.
    pub fn dependencies(&self) -> &'static [TaskKind] {
        match self {
            TaskKind::ReportCompilation => &REPORT_INPUTS,
            _ => &[],
        }
    }

    /// Whether the task's prompt receives the student's notes.
    pub fn uses_notes(&self) -> bool {
        matches!(self, TaskKind::Summarization | TaskKind::Scheduling)
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

const REPORT_INPUTS: [TaskKind; 5] = [
    TaskKind::Summarization,
    TaskKind::Scheduling,
    TaskKind::ResourceFinding,
    TaskKind::QuizGeneration,
    TaskKind::ProgressAnalysis,
];

/// A task with its prompt templates.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub kind: TaskKind,
    pub role: AgentRole,
    pub dependencies: &'static [TaskKind],
    pub template: TaskPrompt,
}

impl TaskDefinition {
    pub fn new(kind: TaskKind, prompts: &Prompts) -> Self {
        Self {
            kind,
            role: kind.role(),
            dependencies: kind.dependencies(),
            template: prompts.tasks.get(kind).clone(),
        }
    }

    /// All six tasks in execution order.
    pub fn all(prompts: &Prompts) -> Vec<TaskDefinition> {
        TaskKind::ORDER
            .into_iter()
            .map(|kind| Self::new(kind, prompts))
            .collect()
    }

    /// Render the prompt text the agent receives.
    pub fn render(&self, topic: &str, notes: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("topic".to_string(), topic.to_string());
        if self.kind.uses_notes() {
            let notes = if notes.trim().is_empty() {
                "(no notes provided)"
            } else {
                notes
            };
            vars.insert("notes".to_string(), notes.to_string());
        }

        let description = Prompts::render(&self.template.description, &vars);
        let expected = Prompts::render(&self.template.expected_output, &vars);
        if expected.trim().is_empty() {
            description
        } else {
            format!("{}\n\nExpected output:\n{}", description, expected)
        }
    }
}

/// Build the report compiler's context from the upstream outputs.
///
/// Outputs appear in fixed task order regardless of how `outputs` is
/// ordered. Fails if any prerequisite is missing.
pub fn synthesis_context(outputs: &[(TaskKind, String)]) -> Result<String> {
    let sections = TaskKind::ReportCompilation
        .dependencies()
        .iter()
        .map(|kind| {
            let output = outputs
                .iter()
                .find(|(k, _)| k == kind)
                .map(|(_, output)| output)
                .ok_or_else(|| StudyError::Task {
                    task: TaskKind::ReportCompilation.title().to_string(),
                    reason: format!("missing output from {}", kind.title()),
                })?;
            Ok(format!("### {} ({})\n{}", kind.title(), kind.role().title(), output))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(sections.join("\n\n"))
}
