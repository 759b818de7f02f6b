//! Chat model abstraction.
//!
//! Agents talk to their lane through [`ChatModel`]. The OpenAI-compatible
//! client implements it directly; [`QuotaSafeInvoker`] wraps any model to
//! absorb rate-limit errors.

mod pacing;
mod quota;

pub use pacing::RequestPacer;
pub use quota::{QuotaSafeInvoker, RetryPolicy};

use crate::error::Result;
use async_trait::async_trait;

/// A message in a chat exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolInvocation>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments.
    pub arguments: String,
}

/// A function the model may call.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: serde_json::Value,
}

/// One completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// The model's reply: final text, tool calls, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
}

impl Completion {
    /// A plain text reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// Trait for chat completion backends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion.
    async fn complete(&self, request: &ChatRequest) -> Result<Completion>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}
