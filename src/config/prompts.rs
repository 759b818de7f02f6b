//! Prompt templates for studycrew.
//!
//! Task and agent prompts can be customized by placing `tasks.toml` and
//! `agents.toml` in the custom prompts directory. Templates use `{{name}}`
//! placeholders.

use crate::agent::AgentRole;
use crate::pipeline::TaskKind;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").unwrap());

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub tasks: TaskPrompts,
    pub agents: AgentProfiles,
}

/// Description and expected output of one task.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TaskPrompt {
    pub description: String,
    pub expected_output: String,
}

impl TaskPrompt {
    fn new(description: &str, expected_output: &str) -> Self {
        Self {
            description: description.to_string(),
            expected_output: expected_output.to_string(),
        }
    }
}

/// Prompts for the six pipeline tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPrompts {
    pub summarization: TaskPrompt,
    pub scheduling: TaskPrompt,
    pub resource_finding: TaskPrompt,
    pub quiz_generation: TaskPrompt,
    pub progress_analysis: TaskPrompt,
    pub report_compilation: TaskPrompt,
}

impl Default for TaskPrompts {
    fn default() -> Self {
        Self {
            summarization: TaskPrompt::new(
                r#"Summarize the following study notes about {{topic}} for exam preparation.

Notes:
{{notes}}

Extract the key concepts, definitions, formulas and exam-critical facts. Drop filler and repetition.
If the notes are empty, summarize the core syllabus of {{topic}} instead."#,
                "A concise, exam-focused summary in markdown with headed sections, bullet points for key concepts, and a short list of must-remember facts.",
            ),
            scheduling: TaskPrompt::new(
                r#"Create a realistic study schedule for {{topic}} based on these notes:

{{notes}}

Use spaced repetition and short focused sessions. Balance new material, review and practice."#,
                "A day-by-day study schedule in markdown with time blocks, the subtopic for each block, and review checkpoints.",
            ),
            resource_finding: TaskPrompt::new(
                r#"Find high-quality, free learning resources for {{topic}}.

Use the academic search tool for research papers, then add well-known open courseware, lecture notes and practice problem sources.
Prefer credible, peer-reviewed or university-hosted material."#,
                "A curated markdown list of 5-10 resources, each with title, link, type (paper, video, course, problems) and one line on why it helps.",
            ),
            quiz_generation: TaskPrompt::new(
                r#"Write an exam-style practice quiz for {{topic}}.

Mix recall, application and analysis questions. Target common misconceptions."#,
                "A markdown quiz with 8-10 numbered questions (multiple choice and short answer) followed by an answer key with brief explanations.",
            ),
            progress_analysis: TaskPrompt::new(
                r#"Prepare a progress analysis for a student studying {{topic}}.

No prior quiz results or performance data are available yet. Do not invent scores.
Identify the areas where students of {{topic}} typically have knowledge gaps, and describe how the student should measure progress once quiz results exist."#,
                "A markdown gap analysis: likely weak areas, self-assessment checkpoints, and targeted improvement strategies.",
            ),
            report_compilation: TaskPrompt::new(
                r#"Compile a comprehensive, actionable study plan for {{topic}}.

Integrate the summary, schedule, resources, quiz and progress analysis produced by the other agents (provided as context). Resolve overlaps and keep the best of each."#,
                "A complete markdown study report with sections: Overview, Key Concepts, Study Schedule, Resources, Practice Quiz, Progress Strategy, Next Steps.",
            ),
        }
    }
}

impl TaskPrompts {
    pub fn get(&self, kind: TaskKind) -> &TaskPrompt {
        match kind {
            TaskKind::Summarization => &self.summarization,
            TaskKind::Scheduling => &self.scheduling,
            TaskKind::ResourceFinding => &self.resource_finding,
            TaskKind::QuizGeneration => &self.quiz_generation,
            TaskKind::ProgressAnalysis => &self.progress_analysis,
            TaskKind::ReportCompilation => &self.report_compilation,
        }
    }
}

/// Goal and persona of one agent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentProfile {
    pub goal: String,
    pub backstory: String,
}

impl AgentProfile {
    fn new(goal: &str, backstory: &str) -> Self {
        Self {
            goal: goal.to_string(),
            backstory: backstory.to_string(),
        }
    }
}

/// Profiles for the six agent roles plus the shared system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentProfiles {
    /// System prompt template. Receives `role`, `backstory` and `goal`.
    pub system: String,
    pub note_summarizer: AgentProfile,
    pub study_scheduler: AgentProfile,
    pub resource_finder: AgentProfile,
    pub quiz_generator: AgentProfile,
    pub progress_tracker: AgentProfile,
    pub study_coordinator: AgentProfile,
}

impl Default for AgentProfiles {
    fn default() -> Self {
        Self {
            system: r#"You are {{role}}. {{backstory}}

Your personal goal is: {{goal}}

Work on the task you are given. Use your tools only when they add information you do not already have.
When you are done, reply with the final answer only, formatted as requested."#
                .to_string(),
            note_summarizer: AgentProfile::new(
                "Transform raw study materials about {{topic}} into concise, high-yield summaries highlighting key concepts, definitions, formulas, and exam-critical information",
                "Former senior textbook editor with 15+ years of experience distilling complex academic subjects into memorable, exam-focused content. Master of identifying high-yield information while eliminating cognitive clutter.",
            ),
            study_scheduler: AgentProfile::new(
                "Create optimal daily/weekly study schedules for {{topic}} that balance depth, retention, and exam preparation with realistic time allocation",
                "Certified learning strategist who has designed study plans for 10,000+ students. Expert in spaced repetition, the Pomodoro technique and cognitive load optimization.",
            ),
            resource_finder: AgentProfile::new(
                "Discover and curate high-quality, free academic resources for {{topic}} including research papers, video lectures, and practice problems",
                "Digital librarian and academic research specialist with deep knowledge of open-access educational resources. Prioritizes credible, peer-reviewed sources over commercial content.",
            ),
            quiz_generator: AgentProfile::new(
                "Design challenging, exam-style practice questions for {{topic}} that expose common misconceptions and test deep understanding",
                "Former exam question writer and test-prep instructor specializing in diagnostic assessments, active recall and higher-order thinking questions.",
            ),
            progress_tracker: AgentProfile::new(
                "Analyze student performance on {{topic}}, identify knowledge gaps, and recommend targeted improvement strategies",
                "Educational data scientist with a background in learning analytics. Expert at diagnosing misconceptions and giving actionable, evidence-based feedback.",
            ),
            study_coordinator: AgentProfile::new(
                "Synthesize insights from all agents into a comprehensive, actionable study plan for {{topic}} that integrates summaries, schedules, quizzes, resources, and progress tracking",
                "Senior academic advisor and curriculum designer with a PhD in Educational Psychology. Known for integrating multiple learning modalities into cohesive study programs.",
            ),
        }
    }
}

impl AgentProfiles {
    pub fn get(&self, role: AgentRole) -> &AgentProfile {
        match role {
            AgentRole::NoteSummarizer => &self.note_summarizer,
            AgentRole::StudyScheduler => &self.study_scheduler,
            AgentRole::ResourceFinder => &self.resource_finder,
            AgentRole::QuizGenerator => &self.quiz_generator,
            AgentRole::ProgressTracker => &self.progress_tracker,
            AgentRole::StudyCoordinator => &self.study_coordinator,
        }
    }
}

impl Prompts {
    /// Load prompts, applying overrides from the custom directory if given.
    pub fn load(custom_dir: Option<&str>) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let tasks_path = custom_path.join("tasks.toml");
            if tasks_path.exists() {
                let content = std::fs::read_to_string(&tasks_path)?;
                prompts.tasks = toml::from_str(&content)?;
            }

            let agents_path = custom_path.join("agents.toml");
            if agents_path.exists() {
                let content = std::fs::read_to_string(&agents_path)?;
                prompts.agents = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Substitution is a single pass over the template, so values are
    /// inserted literally. Unknown placeholders are left as written.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts_cover_every_task_and_role() {
        let prompts = Prompts::default();
        for kind in TaskKind::ORDER {
            assert!(!prompts.tasks.get(kind).description.is_empty());
            assert!(!prompts.tasks.get(kind).expected_output.is_empty());
        }
        for role in AgentRole::ALL {
            assert!(prompts.agents.get(role).goal.contains("{{topic}}"));
        }
    }

    #[test]
    fn test_render_template() {
        let template = "Study {{topic}} using {{notes}}.";
        let mut vars = HashMap::new();
        vars.insert("topic".to_string(), "Graphs".to_string());
        vars.insert("notes".to_string(), "BFS, DFS".to_string());

        assert_eq!(Prompts::render(template, &vars), "Study Graphs using BFS, DFS.");
    }

    #[test]
    fn test_render_inserts_values_literally() {
        let template = "Notes about {{topic}}:\n{{notes}}";
        let mut vars = HashMap::new();
        vars.insert("topic".to_string(), "{{notes}}".to_string());
        vars.insert("notes".to_string(), "see {{topic}} and {{missing}}".to_string());

        for _ in 0..50 {
            assert_eq!(
                Prompts::render(template, &vars),
                "Notes about {{notes}}:\nsee {{topic}} and {{missing}}"
            );
        }
        assert_eq!(Prompts::render("{{unknown}} stays", &vars), "{{unknown}} stays");
    }

    #[test]
    fn test_custom_tasks_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tasks.toml"),
            "[quiz_generation]\ndescription = \"Three questions on {{topic}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(Some(dir.path().to_str().unwrap())).unwrap();
        assert_eq!(prompts.tasks.quiz_generation.description, "Three questions on {{topic}}");
        // Sections missing from the file fall back to their defaults.
        assert!(!prompts.tasks.summarization.description.is_empty());
    }
}
