//! Agent runner with tool calling loop.

use super::tools::{parse_tool_call, tool_definitions, ToolContext};
use super::{AgentRole, Capability, Lane};
use crate::error::{Result, StudyError};
use crate::llm::{ChatMessage, ChatModel, ChatRequest, Completion, RequestPacer, ToolInvocation};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sent when the tool budget is spent and the model must answer.
const FINAL_ANSWER_NUDGE: &str =
    "You have used your tool budget for this task. Give your best final answer now, without calling tools.";

/// An agent bound to one role and one lane.
pub struct Agent {
    role: AgentRole,
    lane: Lane,
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolContext>,
    capabilities: BTreeSet<Capability>,
    max_iterations: usize,
    system_prompt: String,
    pacer: RequestPacer,
}

impl Agent {
    /// Create an agent with the role's default capabilities.
    pub fn new(role: AgentRole, lane: Lane, model: Arc<dyn ChatModel>, tools: Arc<ToolContext>) -> Self {
        Self {
            role,
            lane,
            model,
            tools,
            capabilities: role.capabilities(),
            max_iterations: 3,
            system_prompt: format!("You are {}.", role.title()),
            pacer: RequestPacer::unlimited(),
        }
    }

    /// Set a custom system prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Set maximum model round-trips per task (at least one).
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Set the request pacer.
    pub fn with_pacer(mut self, pacer: RequestPacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    /// Run the agent on one task, with optional upstream context.
    ///
    /// Tools are offered on every round-trip except the last, which forces
    /// a plain answer once the iteration budget is spent.
    pub async fn run(&self, task: &str, context: Option<&str>) -> Result<AgentResponse> {
        let user_message = match context {
            Some(ctx) => format!("Context:\n{}\n\nTask:\n{}", ctx, task),
            None => task.to_string(),
        };

        let mut messages = vec![
            ChatMessage::System(self.system_prompt.clone()),
            ChatMessage::User(user_message),
        ];

        let available_tools = tool_definitions(&self.capabilities);
        let mut tool_calls_made = Vec::new();

        for iteration in 1..=self.max_iterations {
            let last = iteration == self.max_iterations;
            let tools = if last { Vec::new() } else { available_tools.clone() };

            if last && !tool_calls_made.is_empty() {
                messages.push(ChatMessage::User(FINAL_ANSWER_NUDGE.to_string()));
            }

            debug!("{} iteration {}/{}", self.role, iteration, self.max_iterations);

            self.pacer.acquire().await;
            let request = ChatRequest {
                messages: messages.clone(),
                tools,
            };
            let completion = self.model.complete(&request).await?;

            if completion.tool_calls.is_empty() {
                return self.build_response(completion, tool_calls_made, iteration);
            }

            // Tools were not offered, so calls on the last round-trip are never run.
            if last {
                warn!(
                    "{} requested {} tool call(s) after its budget was spent; ignoring them",
                    self.role,
                    completion.tool_calls.len()
                );
                let has_answer = completion
                    .content
                    .as_deref()
                    .is_some_and(|c| !c.trim().is_empty());
                if has_answer {
                    return self.build_response(completion, tool_calls_made, iteration);
                }
                break;
            }

            messages.push(ChatMessage::Assistant {
                content: completion.content.clone(),
                tool_calls: completion.tool_calls.clone(),
            });

            for tool_call in &completion.tool_calls {
                let record = self.execute_tool_call(tool_call).await;
                messages.push(ChatMessage::Tool {
                    call_id: tool_call.id.clone(),
                    content: record.result.clone(),
                });
                tool_calls_made.push(record);
            }
        }

        Err(StudyError::Agent(format!(
            "{} exceeded maximum iterations ({}) without a final answer",
            self.role, self.max_iterations
        )))
    }

    /// Execute a single tool call and return a record of it.
    async fn execute_tool_call(&self, tool_call: &ToolInvocation) -> ToolCallRecord {
        let name = &tool_call.name;
        let arguments = &tool_call.arguments;

        info!("{} calling tool: {} with args: {}", self.role, name, arguments);

        let result = match parse_tool_call(name, arguments) {
            Ok(tool) => self.tools.execute(&tool, &self.capabilities).await,
            Err(e) => format!("Failed to parse tool call: {}", e),
        };

        ToolCallRecord {
            name: name.clone(),
            arguments: arguments.clone(),
            result,
        }
    }

    /// Build the final agent response.
    fn build_response(
        &self,
        completion: Completion,
        tool_calls: Vec<ToolCallRecord>,
        iterations: usize,
    ) -> Result<AgentResponse> {
        let content = completion.content.unwrap_or_default();
        if content.trim().is_empty() {
            return Err(StudyError::Agent(format!("{} returned an empty answer", self.role)));
        }

        Ok(AgentResponse {
            content,
            tool_calls,
            iterations,
        })
    }
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final response content from the agent.
    pub content: String,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of iterations (LLM calls) used.
    pub iterations: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::MaterialStore;
    use crate::search::{Paper, PaperSearch};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays completions and remembers every request it saw.
    struct ScriptedModel {
        script: Mutex<VecDeque<Completion>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        fn new(script: Vec<Completion>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.script.lock().unwrap().pop_front().unwrap_or_default())
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct OnePaper;

    #[async_trait]
    impl PaperSearch for OnePaper {
        async fn search(&self, query: &str) -> Result<Vec<Paper>> {
            Ok(vec![Paper {
                title: format!("A survey of {}", query),
                authors: vec!["A. Author".to_string()],
                url: "http://arxiv.org/abs/0000.00000".to_string(),
                published: "2024-01-01".to_string(),
            }])
        }
    }

    fn tool_call(name: &str, args: &str) -> Completion {
        Completion {
            content: None,
            tool_calls: vec![ToolInvocation {
                id: "call_0".to_string(),
                name: name.to_string(),
                arguments: args.to_string(),
            }],
        }
    }

    fn tools(dir: &std::path::Path) -> Arc<ToolContext> {
        Arc::new(ToolContext::new(Arc::new(OnePaper), MaterialStore::new(dir).unwrap()))
    }

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "academic_search".to_string(),
            arguments: r#"{"query": "test"}"#.to_string(),
            result: "Found results".to_string(),
        };
        assert_eq!(format!("{}", record), r#"academic_search({"query": "test"})"#);
    }

    #[tokio::test]
    async fn test_tool_result_fed_back_to_model() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![
            tool_call("academic_search", r#"{"query": "graph theory"}"#),
            Completion::text("Resources: A survey of graph theory"),
        ]));
        let agent = Agent::new(AgentRole::ResourceFinder, Lane::A, model.clone(), tools(dir.path()));

        let response = agent.run("Find resources", None).await.unwrap();

        assert_eq!(response.iterations, 2);
        assert_eq!(response.tool_calls.len(), 1);
        assert!(response.tool_calls[0].result.contains("A survey of graph theory"));

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].tools.len(), 1);
        assert!(matches!(requests[1].messages.last(), Some(ChatMessage::Tool { .. })));
    }

    #[tokio::test]
    async fn test_last_iteration_offers_no_tools() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![
            tool_call("academic_search", r#"{"query": "a"}"#),
            tool_call("academic_search", r#"{"query": "b"}"#),
            Completion::text("final"),
        ]));
        let agent = Agent::new(AgentRole::ResourceFinder, Lane::A, model.clone(), tools(dir.path()))
            .with_max_iterations(3);

        let response = agent.run("Find resources", None).await.unwrap();
        assert_eq!(response.content, "final");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].tools.is_empty());
        assert!(matches!(
            requests[2].messages.last(),
            Some(ChatMessage::User(text)) if text == FINAL_ANSWER_NUDGE
        ));
    }

    #[tokio::test]
    async fn test_tool_calls_on_last_iteration_are_not_run() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![tool_call(
            "study_material",
            r#"{"action": "write", "filename": "late.md", "content": "x"}"#,
        )]));
        let agent = Agent::new(AgentRole::NoteSummarizer, Lane::A, model.clone(), tools(dir.path()))
            .with_max_iterations(1);

        let err = agent.run("Summarize", None).await.unwrap_err();
        assert!(err.to_string().contains("maximum iterations"));
        assert!(!dir.path().join("late.md").exists());
        assert_eq!(model.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_last_iteration_keeps_content_beside_tool_calls() {
        let dir = tempfile::tempdir().unwrap();
        let mut completion = tool_call(
            "study_material",
            r#"{"action": "write", "filename": "late.md", "content": "x"}"#,
        );
        completion.content = Some("Summary: entropy rises.".to_string());
        let model = Arc::new(ScriptedModel::new(vec![completion]));
        let agent = Agent::new(AgentRole::NoteSummarizer, Lane::A, model, tools(dir.path()))
            .with_max_iterations(1);

        let response = agent.run("Summarize", None).await.unwrap();
        assert_eq!(response.content, "Summary: entropy rises.");
        assert!(response.tool_calls.is_empty());
        assert!(!dir.path().join("late.md").exists());
    }

    #[tokio::test]
    async fn test_agent_without_capabilities_gets_no_tools() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![Completion::text("quiz")]));
        let agent = Agent::new(AgentRole::QuizGenerator, Lane::B, model.clone(), tools(dir.path()));

        agent.run("Write a quiz", Some("upstream")).await.unwrap();

        let requests = model.requests.lock().unwrap();
        assert!(requests[0].tools.is_empty());
        assert!(matches!(
            &requests[0].messages[1],
            ChatMessage::User(text) if text.starts_with("Context:\nupstream")
        ));
    }

    #[tokio::test]
    async fn test_empty_answer_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![Completion::text("   ")]));
        let agent = Agent::new(AgentRole::StudyScheduler, Lane::B, model, tools(dir.path()));

        assert!(matches!(agent.run("Plan", None).await, Err(StudyError::Agent(_))));
    }
}
