//! Tool definitions and implementations for the agent system.
//!
//! Tool failures never abort a task: they come back to the model as
//! descriptive text so the pipeline continues with degraded output.

use super::Capability;
use crate::error::{Result, StudyError};
use crate::llm::ToolSpec;
use crate::materials::MaterialStore;
use crate::search::{format_papers, PaperSearch};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

/// Available tools for the agents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ToolCall {
    /// Search arXiv for papers on a topic.
    AcademicSearch { query: String },

    /// Read or write a file in the study materials sandbox.
    StudyMaterial {
        action: FileAction,
        filename: String,
        content: Option<String>,
    },
}

impl ToolCall {
    /// Capability required to run this tool.
    pub fn capability(&self) -> Capability {
        match self {
            ToolCall::AcademicSearch { .. } => Capability::WebSearch,
            ToolCall::StudyMaterial { .. } => Capability::FileReadWrite,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::AcademicSearch { .. } => "academic_search",
            ToolCall::StudyMaterial { .. } => "study_material",
        }
    }
}

/// File operation for the study material tool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Read,
    Write,
}

impl std::str::FromStr for FileAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(FileAction::Read),
            "write" => Ok(FileAction::Write),
            other => Err(format!("Unsupported action '{}'. Use 'write' or 'read'", other)),
        }
    }
}

/// Tool execution context shared by the agents of a run.
pub struct ToolContext {
    pub search: Arc<dyn PaperSearch>,
    pub materials: MaterialStore,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(search: Arc<dyn PaperSearch>, materials: MaterialStore) -> Self {
        Self { search, materials }
    }

    /// Execute a tool call and return the result as text.
    ///
    /// Calls outside the agent's capabilities and tool failures are reported
    /// as text rather than errors.
    pub async fn execute(&self, tool: &ToolCall, capabilities: &BTreeSet<Capability>) -> String {
        if !capabilities.contains(&tool.capability()) {
            return format!("Tool '{}' is not available to this agent.", tool.name());
        }

        let result = match tool {
            ToolCall::AcademicSearch { query } => self.execute_search(query).await,
            ToolCall::StudyMaterial {
                action,
                filename,
                content,
            } => self.execute_material(*action, filename, content.as_deref()),
        };

        result.unwrap_or_else(|e| {
            warn!("Tool {} failed: {}", tool.name(), e);
            match tool {
                ToolCall::AcademicSearch { .. } => {
                    format!("Search error: {}. Try simpler search terms.", e)
                }
                ToolCall::StudyMaterial { .. } => format!("File operation error: {}", e),
            }
        })
    }

    async fn execute_search(&self, query: &str) -> Result<String> {
        let query = self.search.effective_query(query);
        let papers = self.search.search(&query).await?;
        Ok(format_papers(&query, &papers))
    }

    fn execute_material(&self, action: FileAction, filename: &str, content: Option<&str>) -> Result<String> {
        match action {
            FileAction::Write => {
                let content = content
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| StudyError::InvalidInput("Content is required for write action".to_string()))?;
                let saved = self.materials.write(filename, content)?;
                Ok(format!("Saved {} characters to {}", content.chars().count(), saved))
            }
            FileAction::Read => {
                let (name, text) = self.materials.read(filename)?;
                let total = text.chars().count();
                let preview = if total > 500 {
                    format!("{}...", text.chars().take(500).collect::<String>())
                } else {
                    text
                };
                Ok(format!("{} ({} chars):\n{}", name, total, preview))
            }
        }
    }
}

/// Tool definitions offered to an agent with the given capabilities.
pub fn tool_definitions(capabilities: &BTreeSet<Capability>) -> Vec<ToolSpec> {
    let mut tools = Vec::new();

    if capabilities.contains(&Capability::WebSearch) {
        tools.push(ToolSpec {
            name: "academic_search".to_string(),
            description: "Search arXiv for academic papers related to a study topic. \
                Input: a short research topic (only the first few words are used)."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Research topic to search for"
                    }
                },
                "required": ["query"]
            }),
        });
    }

    if capabilities.contains(&Capability::FileReadWrite) {
        tools.push(ToolSpec {
            name: "study_material".to_string(),
            description: "Read or write study material files. \
                Usage: action='write', filename='notes.txt', content='...' OR action='read', filename='notes.txt'"
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["read", "write"],
                        "description": "Whether to read or write the file"
                    },
                    "filename": {
                        "type": "string",
                        "description": "File name inside the materials folder"
                    },
                    "content": {
                        "type": "string",
                        "description": "Text to write (write only)"
                    }
                },
                "required": ["action", "filename"]
            }),
        });
    }

    tools
}

/// Parse a tool call from the model's function-call format.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolCall> {
    let args: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| StudyError::Agent(format!("Invalid tool arguments: {}", e)))?;

    match name {
        "academic_search" => {
            let query = args["query"]
                .as_str()
                .ok_or_else(|| StudyError::Agent("Missing 'query' argument".to_string()))?
                .to_string();
            Ok(ToolCall::AcademicSearch { query })
        }
        "study_material" => {
            let action = args["action"]
                .as_str()
                .ok_or_else(|| StudyError::Agent("Missing 'action' argument".to_string()))?
                .parse::<FileAction>()
                .map_err(StudyError::Agent)?;
            let filename = args["filename"]
                .as_str()
                .ok_or_else(|| StudyError::Agent("Missing 'filename' argument".to_string()))?
                .to_string();
            let content = args["content"].as_str().map(String::from);
            Ok(ToolCall::StudyMaterial {
                action,
                filename,
                content,
            })
        }
        _ => Err(StudyError::Agent(format!("Unknown tool: {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Paper;
    use async_trait::async_trait;

    struct FailingSearch;

    #[async_trait]
    impl PaperSearch for FailingSearch {
        async fn search(&self, _query: &str) -> Result<Vec<Paper>> {
            Err(StudyError::InvalidInput("arXiv unreachable".to_string()))
        }
    }

    /// Finds nothing and remembers what it was asked.
    #[derive(Default)]
    struct EmptySearch {
        queries: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PaperSearch for EmptySearch {
        async fn search(&self, query: &str) -> Result<Vec<Paper>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(Vec::new())
        }
    }

    fn all_capabilities() -> BTreeSet<Capability> {
        BTreeSet::from([Capability::WebSearch, Capability::FileReadWrite])
    }

    #[test]
    fn test_parse_search_tool() {
        let tool = parse_tool_call("academic_search", r#"{"query": "quantum computing"}"#).unwrap();
        assert_eq!(
            tool,
            ToolCall::AcademicSearch {
                query: "quantum computing".to_string()
            }
        );
    }

    #[test]
    fn test_parse_material_tool() {
        let tool = parse_tool_call(
            "study_material",
            r#"{"action": "WRITE", "filename": "notes.md", "content": "hello"}"#,
        )
        .unwrap();
        match tool {
            ToolCall::StudyMaterial { action, filename, content } => {
                assert_eq!(action, FileAction::Write);
                assert_eq!(filename, "notes.md");
                assert_eq!(content.as_deref(), Some("hello"));
            }
            _ => panic!("Expected StudyMaterial tool"),
        }

        assert!(parse_tool_call("study_material", r#"{"action": "delete", "filename": "x"}"#).is_err());
        assert!(parse_tool_call("shell", "{}").is_err());
    }

    #[test]
    fn test_definitions_follow_capabilities() {
        assert!(tool_definitions(&BTreeSet::new()).is_empty());
        let names: Vec<_> = tool_definitions(&all_capabilities())
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["academic_search", "study_material"]);
    }

    #[tokio::test]
    async fn test_search_failure_becomes_text() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(Arc::new(FailingSearch), MaterialStore::new(dir.path()).unwrap());

        let result = ctx
            .execute(
                &ToolCall::AcademicSearch {
                    query: "graphs".to_string(),
                },
                &all_capabilities(),
            )
            .await;
        assert!(result.starts_with("Search error:"));
        assert!(result.contains("arXiv unreachable"));
    }

    #[tokio::test]
    async fn test_empty_search_names_the_sent_query() {
        let dir = tempfile::tempdir().unwrap();
        let search = Arc::new(EmptySearch::default());
        let ctx = ToolContext::new(search.clone(), MaterialStore::new(dir.path()).unwrap());

        let result = ctx
            .execute(
                &ToolCall::AcademicSearch {
                    query: "  deep reinforcement learning for robotic grasping tasks".to_string(),
                },
                &all_capabilities(),
            )
            .await;

        assert!(result.starts_with("No academic resources found for: deep reinforcement learning for robotic\n"));
        assert!(!result.contains("grasping"));
        assert_eq!(
            *search.queries.lock().unwrap(),
            vec!["deep reinforcement learning for robotic".to_string()]
        );
    }

    #[tokio::test]
    async fn test_material_round_trip_and_capability_check() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(Arc::new(FailingSearch), MaterialStore::new(dir.path()).unwrap());

        let write = ToolCall::StudyMaterial {
            action: FileAction::Write,
            filename: "summary notes.md".to_string(),
            content: Some("Entropy always increases.".to_string()),
        };
        let saved = ctx.execute(&write, &all_capabilities()).await;
        assert_eq!(saved, "Saved 25 characters to summary_notes.md");

        let read = ToolCall::StudyMaterial {
            action: FileAction::Read,
            filename: "summary_notes.md".to_string(),
            content: None,
        };
        let text = ctx.execute(&read, &all_capabilities()).await;
        assert!(text.contains("Entropy always increases."));

        let denied = ctx.execute(&read, &BTreeSet::from([Capability::WebSearch])).await;
        assert!(denied.contains("not available"));

        let empty_write = ToolCall::StudyMaterial {
            action: FileAction::Write,
            filename: "x.md".to_string(),
            content: None,
        };
        let err = ctx.execute(&empty_write, &all_capabilities()).await;
        assert!(err.contains("Content is required"));
    }
}
