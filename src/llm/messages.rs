//! Messages API with tool calling support
//!
//! Request/response types for the Anthropic `/v1/messages` endpoint and a
//! client implementing [`CodeGenerator`]. Only the parts of the API the
//! agents use are modelled: text blocks, tool invocations and tool results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::metrics::LLM_CALL_TIME;

/// A content block inside a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Block kinds the agents do not act on (thinking, citations, ...)
    #[serde(other)]
    Other,
}

/// Message body: plain text or a list of blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "user", "assistant"
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    /// Echo an assistant turn back into the history
    ///
    /// Blocks the API would reject on replay are dropped.
    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        let blocks = blocks
            .into_iter()
            .filter(|b| !matches!(b, ContentBlock::Other))
            .collect();
        Self {
            role: "assistant".to_string(),
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Acknowledge a tool invocation with its output
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
            }]),
        }
    }

    /// Append a text block after the existing content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = ContentBlock::Text { text: text.into() };
        self.content = match self.content {
            MessageContent::Blocks(mut blocks) => {
                blocks.push(text);
                MessageContent::Blocks(blocks)
            }
            MessageContent::Text(first) => {
                MessageContent::Blocks(vec![ContentBlock::Text { text: first }, text])
            }
        };
        self
    }
}

/// Tool definition for the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value, // JSON Schema
}

/// Body of a `/v1/messages` request
#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

/// A tool invocation extracted from a response
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

impl ToolInvocation {
    /// The `code` argument, if the model supplied one
    pub fn code(&self) -> Option<&str> {
        self.input.get("code").and_then(|c| c.as_str())
    }
}

/// Response from `/v1/messages`
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl MessageResponse {
    /// First tool invocation in the response, if any
    pub fn tool_invocation(&self) -> Option<ToolInvocation> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some(ToolInvocation {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            }),
            _ => None,
        })
    }

    /// First text block in the response, if any
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Error type for generator operations
#[derive(Debug)]
pub enum LlmError {
    Request(reqwest::Error),
    Status { status: u16, body: String },
    Parse(serde_json::Error),
    EmptyResponse,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::Request(e) => write!(f, "Request error: {}", e),
            LlmError::Status { status, body } => write!(f, "API error {}: {}", status, body),
            LlmError::Parse(e) => write!(f, "Parse error: {}", e),
            LlmError::EmptyResponse => write!(f, "Empty response from model"),
        }
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Request(e)
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        LlmError::Parse(e)
    }
}

/// Anything that can answer a messages request
///
/// Agents and the coordinator hold an `Arc<dyn CodeGenerator>` so tests can
/// substitute a scripted generator.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn send(&self, request: &MessageRequest) -> Result<MessageResponse, LlmError>;
}

/// Client for the Anthropic Messages API
#[derive(Clone)]
pub struct MessagesClient {
    endpoint: String,
    api_key: String,
    api_version: String,
    client: reqwest::Client,
}

impl MessagesClient {
    /// Create a new client from resolved configuration
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            client,
        })
    }
}

#[async_trait]
impl CodeGenerator for MessagesClient {
    async fn send(&self, request: &MessageRequest) -> Result<MessageResponse, LlmError> {
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        LLM_CALL_TIME
            .with_label_values(&[&request.model])
            .observe(start.elapsed().as_secs_f64());

        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        let parsed: MessageResponse = serde_json::from_str(&text)?;
        debug!(
            model = %request.model,
            stop_reason = ?parsed.stop_reason,
            blocks = parsed.content.len(),
            "Messages call completed"
        );
        Ok(parsed)
    }
}

/// Name of the single tool every agent declares
pub const EXECUTE_CODE_TOOL: &str = "execute_python";

/// Create the code execution tool definition
pub fn execute_code_tool() -> Tool {
    Tool {
        name: EXECUTE_CODE_TOOL.to_string(),
        description: "Execute Python code in the sandbox. The uploaded dataset is available on the sandbox filesystem.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python code to execute"
                }
            },
            "required": ["code"]
        }),
    }
}
