//! File-backed session memory.
//!
//! Each session keeps three JSON journals in its own directory:
//! `context.json`, `agent_outputs.json` and `conversation.json`. Every
//! mutation rewrites the affected journal before returning, so a reopened
//! session sees exactly what was recorded.

use crate::error::{Result, StudyError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

const CONTEXT_FILE: &str = "context.json";
const OUTPUTS_FILE: &str = "agent_outputs.json";
const CONVERSATION_FILE: &str = "conversation.json";

/// Generate a fresh session id (`study_` plus 8 hex characters).
pub fn new_session_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("study_{}", &uuid[..8])
}

/// Session ids double as directory names.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StudyError::InvalidInput(format!(
            "Invalid session id '{}': use letters, digits, '_' or '-'",
            session_id
        )))
    }
}

/// Session ids found under a memory root, sorted.
pub fn list_sessions(root: &Path) -> Result<Vec<String>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if validate_session_id(&name).is_ok() && entry.path().join(CONTEXT_FILE).exists() {
            sessions.push(name);
        }
    }
    sessions.sort();
    Ok(sessions)
}

/// The session's topic, notes and free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// One agent's output for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutputRecord {
    pub agent: String,
    pub task: String,
    pub output: String,
    pub timestamp: DateTime<Utc>,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Durable memory for one session.
#[derive(Debug)]
pub struct SessionMemory {
    dir: PathBuf,
    context: SessionContext,
    outputs: Vec<AgentOutputRecord>,
    conversation: Vec<ConversationTurn>,
}

impl SessionMemory {
    /// Open a session under `root`, creating empty journals if none exist.
    pub fn open(root: impl AsRef<Path>, session_id: &str) -> Result<Self> {
        validate_session_id(session_id)?;
        let dir = root.as_ref().join(session_id);
        std::fs::create_dir_all(&dir)?;

        let context_path = dir.join(CONTEXT_FILE);
        let (context, fresh_context) = if context_path.exists() {
            (read_journal::<SessionContext>(&context_path)?, false)
        } else {
            let context = SessionContext {
                session_id: session_id.to_string(),
                created_at: Utc::now(),
                topic: String::new(),
                notes: String::new(),
                metadata: Map::new(),
            };
            (context, true)
        };

        let outputs_path = dir.join(OUTPUTS_FILE);
        let (outputs, fresh_outputs) = if outputs_path.exists() {
            (read_journal(&outputs_path)?, false)
        } else {
            (Vec::new(), true)
        };

        let conversation_path = dir.join(CONVERSATION_FILE);
        let (conversation, fresh_conversation) = if conversation_path.exists() {
            (read_journal(&conversation_path)?, false)
        } else {
            (Vec::new(), true)
        };

        let memory = Self {
            dir,
            context,
            outputs,
            conversation,
        };

        if fresh_context {
            memory.save_context()?;
        }
        if fresh_outputs {
            memory.save_outputs()?;
        }
        if fresh_conversation {
            memory.save_conversation()?;
        }

        debug!(
            "Opened session {} ({} outputs, {} turns)",
            session_id,
            memory.outputs.len(),
            memory.conversation.len()
        );
        Ok(memory)
    }

    /// Open an existing session without creating anything.
    pub fn open_existing(root: impl AsRef<Path>, session_id: &str) -> Result<Self> {
        validate_session_id(session_id)?;
        if !root.as_ref().join(session_id).join(CONTEXT_FILE).exists() {
            return Err(StudyError::Memory(format!("Session not found: {}", session_id)));
        }
        Self::open(root, session_id)
    }

    pub fn session_id(&self) -> &str {
        &self.context.session_id
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Set topic and notes; metadata keys are merged into existing ones.
    pub fn set_session_context(
        &mut self,
        topic: &str,
        notes: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<()> {
        let mut context = self.context.clone();
        context.topic = topic.to_string();
        context.notes = notes.to_string();
        if let Some(metadata) = metadata {
            context.metadata.extend(metadata);
        }
        write_journal(&self.dir.join(CONTEXT_FILE), &context)?;
        self.context = context;
        Ok(())
    }

    /// Append an agent output.
    pub fn add_agent_output(&mut self, agent: &str, task: &str, output: &str) -> Result<()> {
        self.outputs.push(AgentOutputRecord {
            agent: agent.to_string(),
            task: task.to_string(),
            output: output.to_string(),
            timestamp: Utc::now(),
        });
        if let Err(e) = self.save_outputs() {
            self.outputs.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Append a conversation turn.
    pub fn add_conversation_turn(&mut self, role: Role, content: &str) -> Result<()> {
        self.conversation.push(ConversationTurn {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        if let Err(e) = self.save_conversation() {
            self.conversation.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Outputs in recording order, optionally only one agent's.
    pub fn agent_outputs(&self, agent: Option<&str>) -> Vec<&AgentOutputRecord> {
        self.outputs
            .iter()
            .filter(|o| agent.map_or(true, |a| o.agent == a))
            .collect()
    }

    /// Conversation turns, optionally only the last `n`.
    pub fn conversation_history(&self, last_n: Option<usize>) -> &[ConversationTurn] {
        match last_n {
            Some(n) if n > 0 => &self.conversation[self.conversation.len().saturating_sub(n)..],
            _ => &self.conversation,
        }
    }

    /// Outputs whose text contains `keyword`, ignoring case.
    pub fn search_outputs(&self, keyword: &str) -> Vec<&AgentOutputRecord> {
        let keyword = keyword.to_lowercase();
        self.outputs
            .iter()
            .filter(|o| o.output.to_lowercase().contains(&keyword))
            .collect()
    }

    pub fn context_summary(&self) -> String {
        let topic = if self.context.topic.is_empty() {
            "N/A"
        } else {
            self.context.topic.as_str()
        };
        format!(
            "Session ID: {}\nTopic: {}\nCreated: {}\nAgent Outputs: {} tasks completed\nConversation Turns: {}",
            self.context.session_id,
            topic,
            self.context.created_at.to_rfc3339(),
            self.outputs.len(),
            self.conversation.len()
        )
    }

    /// Drop outputs, conversation and metadata. Id, creation time, topic
    /// and notes survive.
    ///
    /// Each journal is cleared in memory only once its file is rewritten.
    pub fn clear_session(&mut self) -> Result<()> {
        let mut context = self.context.clone();
        context.metadata.clear();
        write_journal(&self.dir.join(CONTEXT_FILE), &context)?;
        self.context = context;

        write_journal(&self.dir.join(OUTPUTS_FILE), &Vec::<AgentOutputRecord>::new())?;
        self.outputs.clear();

        write_journal(&self.dir.join(CONVERSATION_FILE), &Vec::<ConversationTurn>::new())?;
        self.conversation.clear();
        Ok(())
    }

    fn save_context(&self) -> Result<()> {
        write_journal(&self.dir.join(CONTEXT_FILE), &self.context)
    }

    fn save_outputs(&self) -> Result<()> {
        write_journal(&self.dir.join(OUTPUTS_FILE), &self.outputs)
    }

    fn save_conversation(&self) -> Result<()> {
        write_journal(&self.dir.join(CONVERSATION_FILE), &self.conversation)
    }
}

fn read_journal<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| StudyError::Memory(format!("Corrupt journal {}: {}", path.display(), e)))
}

/// Write the whole journal to a sibling temp file, then swap it in.
fn write_journal<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
