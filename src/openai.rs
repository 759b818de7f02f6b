//! OpenAI-compatible chat completion client.
//!
//! Requests are built with `async-openai` types and posted with `reqwest`
//! so the HTTP status is visible: a 429 becomes [`StudyError::QuotaExhausted`]
//! regardless of how the provider shapes its error body.

use crate::config::LaneSettings;
use crate::error::{Result, StudyError};
use crate::llm::{ChatMessage, ChatModel, ChatRequest, Completion, ToolInvocation, ToolSpec};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionTool,
    ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default API base when a lane does not set one.
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Create an HTTP client with a custom timeout.
pub fn create_http_client_with_timeout(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Chat model reached through an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAIChatModel {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAIChatModel {
    /// Build the model for one lane. Fails if no API key is available.
    pub fn from_lane(lane: &LaneSettings) -> Result<Self> {
        let api_key = lane.resolve_api_key().ok_or_else(|| {
            StudyError::Config(format!(
                "No API key found for model {} (checked {})",
                lane.model,
                lane.api_key_env.join(", ")
            ))
        })?;

        let http = create_http_client_with_timeout(Duration::from_secs(lane.timeout_secs))?;
        let base = lane.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            api_key,
            model: lane.model.clone(),
            temperature: lane.temperature,
        })
    }

    fn build_body(&self, request: &ChatRequest) -> Result<serde_json::Value> {
        let messages = request
            .messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .temperature(self.temperature);
        if !request.tools.is_empty() {
            args.tools(request.tools.iter().map(to_tool).collect::<Vec<_>>());
        }

        let body = args.build().map_err(|e| StudyError::Agent(e.to_string()))?;
        Ok(serde_json::to_value(body)?)
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
        let body = self.build_body(request)?;

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StudyError::QuotaExhausted(format!(
                "HTTP 429: {}",
                api_error_message(&text)
            )));
        }
        if !status.is_success() {
            return Err(StudyError::OpenAI(format!(
                "HTTP {}: {}",
                status.as_u16(),
                api_error_message(&text)
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| StudyError::OpenAI("No choices in response".to_string()))?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, call)| ToolInvocation {
                id: call.id.unwrap_or_else(|| format!("call_{}", i)),
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect::<Vec<_>>();

        debug!("Completion returned {} tool call(s)", tool_calls.len());

        Ok(Completion {
            content: message.content,
            tool_calls,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let built: std::result::Result<ChatCompletionRequestMessage, OpenAIError> = match message {
        ChatMessage::System(content) => ChatCompletionRequestSystemMessageArgs::default()
            .content(content.clone())
            .build()
            .map(Into::into),
        ChatMessage::User(content) => ChatCompletionRequestUserMessageArgs::default()
            .content(content.clone())
            .build()
            .map(Into::into),
        ChatMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if let Some(text) = content {
                args.content(text.clone());
            }
            if !tool_calls.is_empty() {
                args.tool_calls(
                    tool_calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect::<Vec<_>>(),
                );
            }
            args.build().map(Into::into)
        }
        ChatMessage::Tool { call_id, content } => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(call_id.clone())
            .content(content.clone())
            .build()
            .map(Into::into),
    };
    built.map_err(|e| StudyError::Agent(e.to_string()))
}

fn to_tool(spec: &ToolSpec) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: spec.name.clone(),
            description: Some(spec.description.clone()),
            parameters: Some(spec.parameters.clone()),
            strict: None,
        },
    }
}

/// Pull a readable message out of an error body.
///
/// Handles `{"error": {...}}` and the `[{"error": {...}}]` envelope some
/// OpenAI-compatible providers return. The provider status (for example
/// `RESOURCE_EXHAUSTED`) is kept so quota markers can match it.
fn api_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let error = if json.is_array() { &json[0]["error"] } else { &json["error"] };
        if let Some(message) = error["message"].as_str() {
            return match error["status"].as_str().or_else(|| error["code"].as_str()) {
                Some(code) => format!("{} ({})", message, code),
                None => message.to_string(),
            };
        }
    }
    body.chars().take(500).collect()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}
