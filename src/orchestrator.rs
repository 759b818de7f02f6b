//! Pipeline orchestrator for studycrew.
//!
//! Drives one study run from request to final report: opens a fresh
//! session, runs the five preparation tasks and the report compilation in
//! order with a cooldown after each, and journals every output.

use crate::agent::{Agent, AgentRole, CredentialRouter, LaneModels, ToolContext};
use crate::config::{Prompts, Settings};
use crate::error::{Result, StudyError};
use crate::llm::RetryPolicy;
use crate::materials::MaterialStore;
use crate::memory::{new_session_id, Role, SessionMemory};
use crate::pipeline::{synthesis_context, TaskDefinition, TaskKind};
use crate::relay::{self, RelayReceiver, RelaySender};
use crate::search::ArxivSearch;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// A request for a study plan.
#[derive(Debug, Clone, Deserialize)]
pub struct StudyRequest {
    pub topic: String,
    #[serde(default)]
    pub notes: String,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub report: String,
    pub memory: SessionMemory,
}

/// Where a run is. Every task is followed by a cooldown.
enum RunState {
    RunTask(usize),
    Cooldown(Box<RunState>),
    Synthesize,
    Persist(String),
    Done(String),
}

/// The main orchestrator for the study pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    router: CredentialRouter,
    tools: Arc<ToolContext>,
    memory_root: PathBuf,
}

impl Orchestrator {
    /// Create an orchestrator backed by the configured lanes and arXiv.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(settings.prompts.custom_dir.as_deref())?;

        let router = CredentialRouter::new(
            settings.routing.clone(),
            LaneModels::from_settings(&settings)?,
            RetryPolicy::from_settings(&settings.pipeline),
            settings.agents.clone(),
        )?;

        let tools = Arc::new(ToolContext::new(
            Arc::new(ArxivSearch::new(&settings.search)?),
            MaterialStore::new(settings.materials_dir())?,
        ));

        Self::with_components(settings, prompts, router, tools)
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        router: CredentialRouter,
        tools: Arc<ToolContext>,
    ) -> Result<Self> {
        let memory_root = settings.memory_dir();
        std::fs::create_dir_all(&memory_root)?;

        Ok(Self {
            settings,
            prompts,
            router,
            tools,
            memory_root,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn memory_root(&self) -> &PathBuf {
        &self.memory_root
    }

    /// Start a run in the background and return its log stream.
    ///
    /// The stream carries progress lines, then either a `[FINAL_REPORT]` and
    /// a `[MEMORY_SUMMARY]` block or an error line, and then ends.
    pub fn start(self: &Arc<Self>, request: StudyRequest) -> RelayReceiver {
        let (tx, rx) = relay::channel(self.settings.server.relay_capacity);
        let orchestrator = Arc::clone(self);

        tokio::spawn(async move {
            match orchestrator.run(&request, &tx).await {
                Ok(outcome) => {
                    tx.emit(format!("\n[FINAL_REPORT]\n{}", outcome.report)).await;
                    tx.emit(format!("\n[MEMORY_SUMMARY]\n{}", outcome.memory.context_summary()))
                        .await;
                }
                Err(e) => {
                    error!("Study run for '{}' failed: {}", request.topic, e);
                    tx.emit(format!("Error during mission: {}", e)).await;
                }
            }
            tx.finish().await;
        });

        rx
    }

    /// Run the full pipeline for one request in a fresh session.
    ///
    /// On failure the session is marked failed and keeps whatever outputs
    /// were recorded before the error.
    #[instrument(skip(self, request, relay), fields(topic = %request.topic))]
    pub async fn run(&self, request: &StudyRequest, relay: &RelaySender) -> Result<PipelineOutcome> {
        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(StudyError::InvalidInput("Topic must not be empty".to_string()));
        }

        let session_id = new_session_id();
        let mut memory = SessionMemory::open(&self.memory_root, &session_id)?;
        memory.set_session_context(topic, &request.notes, Some(status("initialized")))?;
        memory.add_conversation_turn(Role::User, &user_turn(topic, &request.notes))?;

        info!("Session {} started for '{}'", session_id, topic);
        relay
            .emit(format!("[SESSION] {} started for topic: {}", session_id, topic))
            .await;

        match self.execute(topic, &request.notes, &mut memory, relay).await {
            Ok(report) => Ok(PipelineOutcome { report, memory }),
            Err(e) => {
                let mut metadata = status("failed");
                metadata.insert("error".to_string(), Value::from(e.to_string()));
                if let Err(mark_err) = memory.set_session_context(topic, &request.notes, Some(metadata)) {
                    warn!("Could not mark session {} as failed: {}", session_id, mark_err);
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        topic: &str,
        notes: &str,
        memory: &mut SessionMemory,
        relay: &RelaySender,
    ) -> Result<String> {
        let tasks = TaskDefinition::all(&self.prompts);
        let agents = self
            .router
            .agents(topic, &self.prompts, self.tools.clone(), relay);
        let mut outputs: Vec<(TaskKind, String)> = Vec::new();

        let mut state = RunState::RunTask(0);
        loop {
            state = match state {
                RunState::RunTask(i) => {
                    let task = &tasks[i];
                    let output = self.run_task(task, &agents, topic, notes, None, relay).await?;
                    memory.add_agent_output(task.role.title(), task.kind.title(), &output)?;
                    outputs.push((task.kind, output));

                    let next = if i + 1 < tasks.len() - 1 {
                        RunState::RunTask(i + 1)
                    } else {
                        RunState::Synthesize
                    };
                    RunState::Cooldown(Box::new(next))
                }
                RunState::Cooldown(next) => {
                    self.cooldown(relay).await;
                    *next
                }
                RunState::Synthesize => {
                    let context = synthesis_context(&outputs)?;
                    let task = &tasks[tasks.len() - 1];
                    let report = self
                        .run_task(task, &agents, topic, notes, Some(&context), relay)
                        .await?;
                    RunState::Cooldown(Box::new(RunState::Persist(report)))
                }
                RunState::Persist(report) => {
                    let kind = TaskKind::ReportCompilation;
                    memory.add_agent_output(kind.role().title(), kind.title(), &report)?;
                    memory.add_conversation_turn(Role::Assistant, &report)?;
                    memory.set_session_context(topic, notes, Some(status("completed")))?;
                    info!("Session persisted:\n{}", memory.context_summary());
                    RunState::Done(report)
                }
                RunState::Done(report) => return Ok(report),
            };
        }
    }

    async fn run_task(
        &self,
        task: &TaskDefinition,
        agents: &HashMap<AgentRole, Agent>,
        topic: &str,
        notes: &str,
        context: Option<&str>,
        relay: &RelaySender,
    ) -> Result<String> {
        let agent = agents.get(&task.role).ok_or_else(|| StudyError::Task {
            task: task.kind.title().to_string(),
            reason: format!("no agent for role {}", task.role),
        })?;

        relay
            .emit(format!(
                "\n[AGENT] {} (lane {}) working on: {}",
                task.role,
                agent.lane(),
                task.kind
            ))
            .await;

        let prompt = task.render(topic, notes);
        let response = agent.run(&prompt, context).await.map_err(|e| StudyError::Task {
            task: task.kind.title().to_string(),
            reason: e.to_string(),
        })?;

        for call in &response.tool_calls {
            relay.emit(format!("  [TOOL] {}", call)).await;
        }
        relay
            .emit(format!(
                "[AGENT] {} finished {} in {} step(s)",
                task.role, task.kind, response.iterations
            ))
            .await;
        debug!("{} output: {} chars", task.kind, response.content.len());

        Ok(response.content)
    }

    async fn cooldown(&self, relay: &RelaySender) {
        let wait: Duration = self.settings.pipeline.task_cooldown();
        relay
            .emit(format!(
                "\n[QUOTA_SAFETY] Task completed. Waiting {}s before next agent...",
                wait.as_secs()
            ))
            .await;
        tokio::time::sleep(wait).await;
    }
}

fn status(value: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("status".to_string(), Value::from(value));
    metadata
}

fn user_turn(topic: &str, notes: &str) -> String {
    if notes.trim().is_empty() {
        format!("Create a study plan for: {}", topic)
    } else {
        format!("Create a study plan for: {}\n\nNotes:\n{}", topic, notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentSettings, RoutingSettings};
    use crate::llm::{ChatMessage, ChatModel, ChatRequest, Completion};
    use crate::search::{Paper, PaperSearch};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers by task, recording the user message of every request.
    struct EchoModel {
        name: &'static str,
        fail_on: Option<&'static str>,
        seen: Mutex<Vec<String>>,
    }

    impl EchoModel {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail_on: None,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing_on(name: &'static str, marker: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail_on: Some(marker),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
            let user = request
                .messages
                .iter()
                .find_map(|m| match m {
                    ChatMessage::User(text) => Some(text.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            self.seen.lock().unwrap().push(user.clone());

            if let Some(marker) = self.fail_on {
                if user.contains(marker) {
                    return Err(StudyError::OpenAI("HTTP 400: invalid request".to_string()));
                }
            }
            if user.starts_with("Context:") {
                return Ok(Completion::text("FINAL REPORT"));
            }
            Ok(Completion::text(format!("{} says: {}", self.name, first_line(&user))))
        }

        fn model_name(&self) -> &str {
            self.name
        }
    }

    fn first_line(text: &str) -> &str {
        text.lines().next().unwrap_or_default()
    }

    struct NoSearch;

    #[async_trait]
    impl PaperSearch for NoSearch {
        async fn search(&self, _query: &str) -> Result<Vec<Paper>> {
            Ok(Vec::new())
        }
    }

    fn orchestrator(dir: &std::path::Path, a: Arc<EchoModel>, b: Arc<EchoModel>) -> Orchestrator {
        let mut settings = Settings::default();
        settings.general.data_dir = dir.to_string_lossy().to_string();
        settings.pipeline.task_cooldown_secs = 0;
        settings.agents.max_requests_per_minute = None;

        let router = CredentialRouter::new(
            RoutingSettings::default(),
            LaneModels { a, b },
            RetryPolicy::default().with_cooldown(Duration::ZERO),
            AgentSettings {
                max_requests_per_minute: None,
                ..AgentSettings::default()
            },
        )
        .unwrap();
        let tools = Arc::new(ToolContext::new(
            Arc::new(NoSearch),
            MaterialStore::new(dir.join("materials")).unwrap(),
        ));

        Orchestrator::with_components(settings, Prompts::default(), router, tools).unwrap()
    }

    fn request() -> StudyRequest {
        StudyRequest {
            topic: "Thermodynamics".to_string(),
            notes: "Entropy never decreases.".to_string(),
        }
    }

    async fn drain(mut rx: RelayReceiver) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_full_run_records_six_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), EchoModel::new("lane-a"), EchoModel::new("lane-b"));
        let (tx, rx) = relay::channel(256);

        let outcome = orch.run(&request(), &tx).await.unwrap();
        drop(tx);
        let lines = drain(rx).await;

        assert_eq!(outcome.report, "FINAL REPORT");
        let outputs = outcome.memory.agent_outputs(None);
        assert_eq!(outputs.len(), 6);
        let tasks: Vec<_> = outputs.iter().map(|o| o.task.as_str()).collect();
        assert_eq!(tasks, TaskKind::ORDER.map(|k| k.title()).to_vec());
        assert_eq!(outputs[5].agent, "Study Coordinator");

        assert_eq!(outcome.memory.context().metadata["status"], "completed");
        let turns = outcome.memory.conversation_history(None);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, "FINAL REPORT");

        let cooldowns = lines.iter().filter(|l| l.contains("[QUOTA_SAFETY]")).count();
        assert_eq!(cooldowns, 6);
    }

    #[tokio::test]
    async fn test_tasks_use_routed_lanes_and_exact_context() {
        let dir = tempfile::tempdir().unwrap();
        let a = EchoModel::new("lane-a");
        let b = EchoModel::new("lane-b");
        let orch = orchestrator(dir.path(), a.clone(), b.clone());
        let (tx, _rx) = relay::channel(256);

        let outcome = orch.run(&request(), &tx).await.unwrap();

        assert_eq!(a.seen.lock().unwrap().len(), 3);
        assert_eq!(b.seen.lock().unwrap().len(), 3);

        let outputs = outcome.memory.agent_outputs(None);
        let upstream: Vec<(TaskKind, String)> = TaskKind::ORDER[..5]
            .iter()
            .zip(outputs.iter())
            .map(|(k, o)| (*k, o.output.clone()))
            .collect();
        let expected_context = synthesis_context(&upstream).unwrap();

        let seen_b = b.seen.lock().unwrap();
        let synthesis = seen_b.last().unwrap();
        assert!(synthesis.starts_with(&format!("Context:\n{}\n\nTask:\n", expected_context)));
    }

    #[tokio::test]
    async fn test_failure_aborts_and_keeps_partial_records() {
        let dir = tempfile::tempdir().unwrap();
        let a = EchoModel::new("lane-a");
        let b = EchoModel::failing_on("lane-b", "practice quiz");
        let orch = orchestrator(dir.path(), a.clone(), b);
        let (tx, _rx) = relay::channel(256);

        let err = orch.run(&request(), &tx).await.unwrap_err();
        assert!(matches!(err, StudyError::Task { .. }));
        assert!(err.to_string().contains("Quiz Generation"));

        // Progress analysis never ran.
        assert_eq!(a.seen.lock().unwrap().len(), 2);

        let sessions = crate::memory::list_sessions(orch.memory_root()).unwrap();
        assert_eq!(sessions.len(), 1);
        let memory = SessionMemory::open(orch.memory_root(), &sessions[0]).unwrap();
        assert_eq!(memory.agent_outputs(None).len(), 3);
        assert_eq!(memory.context().metadata["status"], "failed");
        assert!(memory.context().metadata["error"]
            .as_str()
            .unwrap()
            .contains("invalid request"));
    }

    #[tokio::test]
    async fn test_start_streams_report_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Arc::new(orchestrator(dir.path(), EchoModel::new("lane-a"), EchoModel::new("lane-b")));

        let lines = drain(orch.start(request())).await;

        let report = lines.iter().position(|l| l.starts_with("\n[FINAL_REPORT]\n")).unwrap();
        let summary = lines.iter().position(|l| l.starts_with("\n[MEMORY_SUMMARY]\n")).unwrap();
        assert!(report < summary);
        assert!(lines[report].ends_with("FINAL REPORT"));
        assert!(lines[summary].contains("Agent Outputs: 6 tasks completed"));
        assert!(lines[summary].contains("Topic: Thermodynamics"));
    }

    #[tokio::test]
    async fn test_start_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Arc::new(orchestrator(dir.path(), EchoModel::new("lane-a"), EchoModel::new("lane-b")));

        let lines = drain(orch.start(StudyRequest {
            topic: "   ".to_string(),
            notes: String::new(),
        }))
        .await;

        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Error during mission:"));
        assert!(!lines.iter().any(|l| l.contains("[FINAL_REPORT]")));
    }

    #[test]
    fn test_request_notes_default() {
        let request: StudyRequest = serde_json::from_str(r#"{"topic": "Optics"}"#).unwrap();
        assert_eq!(request.topic, "Optics");
        assert!(request.notes.is_empty());
    }
}
