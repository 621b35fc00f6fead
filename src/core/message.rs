use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{ChatMessage, ChatToolCall, ChatToolCallFunction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            "system" => Ok(Role::System),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// A provider-issued request to run one skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub function_name: String,
    pub arguments_raw: String,
}

impl ToolCallRequest {
    /// Some providers omit call ids; a positional id keeps `tool` replies
    /// addressable.
    pub fn from_api(call: &ChatToolCall, index: usize) -> Self {
        let id = if call.id.trim().is_empty() {
            format!("tool-call-{}", index + 1)
        } else {
            call.id.clone()
        };
        Self {
            id,
            function_name: call.function.name.clone(),
            arguments_raw: call.function.arguments.clone(),
        }
    }

    pub fn to_api(&self) -> ChatToolCall {
        ChatToolCall {
            id: self.id.clone(),
            kind: "function".to_string(),
            function: ChatToolCallFunction {
                name: self.function_name.clone(),
                arguments: self.arguments_raw.clone(),
            },
        }
    }
}

/// One entry of the conversation history, in the order it was appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        let mut message = Self::new(Role::Assistant, content);
        if !tool_calls.is_empty() {
            message.tool_calls = Some(tool_calls);
        }
        message
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut message = Self::new(Role::Tool, content);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .is_some_and(|calls| !calls.is_empty())
    }

    /// Wire form. An assistant message that only carries tool calls is sent
    /// with `content: null`, which every compatible endpoint accepts.
    pub fn to_api(&self) -> ChatMessage {
        let tool_calls = self
            .tool_calls
            .as_ref()
            .filter(|calls| !calls.is_empty())
            .map(|calls| calls.iter().map(ToolCallRequest::to_api).collect());
        let content = if self.role == Role::Assistant && tool_calls.is_some() && self.content.is_empty() {
            None
        } else {
            Some(self.content.clone())
        };

        ChatMessage {
            role: self.role.as_str().to_string(),
            content,
            tool_call_id: self.tool_call_id.clone(),
            tool_calls,
        }
    }
}
