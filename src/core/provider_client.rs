//! Non-streaming `chat/completions` client.
//!
//! The orchestrator only sees the [`ProviderClient`] trait; the terminal loop
//! wires in [`HttpProviderClient`], tests wire in scripted fakes.

use std::fmt;

use async_trait::async_trait;
use tracing::debug;

use crate::api::{ChatCompletionResponse, ChatMessage, ChatRequest, ChatToolDefinition, ChatUsage};
use crate::core::message::ToolCallRequest;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::{construct_api_url, host_of};

/// Endpoint details after config and environment have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub id: String,
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub endpoint: ResolvedEndpoint,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// `None` sends no `tools` key at all.
    pub tools: Option<Vec<ChatToolDefinition>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<ChatUsage> for TokenUsage {
    fn from(usage: ChatUsage) -> Self {
        let total_tokens = if usage.total_tokens == 0 {
            usage.prompt_tokens.saturating_add(usage.completion_tokens)
        } else {
            usage.total_tokens
        };
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens,
        }
    }
}

/// Either plain text or a list of tool calls (possibly with some text).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<TokenUsage>,
}

impl ProviderResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }

    pub fn from_completion(response: ChatCompletionResponse) -> Result<Self, ProviderError> {
        let usage = response.usage.map(TokenUsage::from);
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("response contained no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(index, call)| ToolCallRequest::from_api(call, index))
            .collect::<Vec<_>>();

        if let Some(nameless) = tool_calls.iter().find(|call| call.function_name.is_empty()) {
            return Err(ProviderError::Malformed(format!(
                "tool call {} has no function name",
                nameless.id
            )));
        }

        Ok(Self {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    Request(String),
    Status { status: u16, body: String },
    Malformed(String),
    MissingApiKey(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Request(message) => write!(f, "Request failed: {message}"),
            ProviderError::Status { status, body } => {
                write!(f, "HTTP {status}: {}", format_api_error(body))
            }
            ProviderError::Malformed(message) => write!(f, "Malformed response: {message}"),
            ProviderError::MissingApiKey(endpoint) => write!(
                f,
                "No API key for endpoint '{endpoint}'. Set {}_API_KEY or add api_key to config.toml.",
                endpoint.to_ascii_uppercase().replace('-', "_")
            ),
        }
    }
}

impl std::error::Error for ProviderError {}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpProviderClient {
    client: reqwest::Client,
}

impl HttpProviderClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let ProviderRequest {
            endpoint,
            model,
            messages,
            tools,
        } = request;

        let api_key = endpoint
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey(endpoint.id.clone()))?;
        if endpoint.base_url.is_empty() {
            return Err(ProviderError::Request(format!(
                "endpoint '{}' has no base_url configured",
                endpoint.id
            )));
        }

        debug!(
            endpoint = %endpoint.id,
            host = host_of(&endpoint.base_url),
            %model,
            messages = messages.len(),
            tools = tools.as_ref().map_or(0, Vec::len),
            "Dispatching chat completion"
        );

        let body = ChatRequest {
            model,
            messages,
            stream: false,
            tools,
        };
        let chat_url = construct_api_url(&endpoint.base_url, "chat/completions");
        let http_request = self
            .client
            .post(chat_url)
            .header("Content-Type", "application/json");
        let http_request = add_auth_headers(http_request, &endpoint.id, api_key);

        let response = http_request
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|err| ProviderError::Malformed(err.to_string()))?;
        ProviderResponse::from_completion(completion)
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Condenses an error body to one line: the provider's message when the body
/// is JSON, otherwise the trimmed body itself.
pub fn format_api_error(error_text: &str) -> String {
    const MAX_RAW_CHARS: usize = 400;

    let trimmed = error_text.trim();
    if trimmed.is_empty() {
        return "<empty response body>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value).filter(|s| !s.is_empty()) {
            return summary;
        }
        return json_value.to_string();
    }

    let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_RAW_CHARS {
        let cut: String = collapsed.chars().take(MAX_RAW_CHARS).collect();
        format!("{cut}…")
    } else {
        collapsed
    }
}
