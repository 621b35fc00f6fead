use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{SkillArgs, SkillError, SkillRegistry};
use crate::core::message::ToolCallRequest;

/// Internal envelope for one skill run. Never sent to the model directly;
/// [`ExecutionResult::to_tool_content`] renders it down to a string first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip)]
    pub error_kind: Option<&'static str>,
    pub skill: String,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn success(skill: impl Into<String>, payload: Value) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error_message: None,
            error_kind: None,
            skill: skill.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(skill: impl Into<String>, error: &SkillError) -> Self {
        Self {
            success: false,
            payload: None,
            error_message: Some(error.to_string()),
            error_kind: Some(error.kind()),
            skill: skill.into(),
            timestamp: Utc::now(),
        }
    }

    /// Content of the `tool` message answering this call. String payloads are
    /// sent verbatim, other payloads as compact JSON, failures as a
    /// structured error object.
    pub fn to_tool_content(&self) -> String {
        if self.success {
            return match &self.payload {
                Some(Value::String(text)) => text.clone(),
                Some(value) => value.to_string(),
                None => "null".to_string(),
            };
        }

        json!({
            "error": true,
            "kind": self.error_kind.unwrap_or("handler"),
            "message": self.error_message.as_deref().unwrap_or("unknown error"),
            "skill": self.skill,
        })
        .to_string()
    }
}

/// Runs skills from the shared registry.
#[derive(Debug, Clone)]
pub struct SkillExecutor {
    registry: Arc<SkillRegistry>,
}

impl SkillExecutor {
    pub fn new(registry: Arc<SkillRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SkillRegistry> {
        &self.registry
    }

    /// Resolves `name` and invokes its handler synchronously, returning the
    /// handler's outcome unchanged. Arguments that violate the skill's
    /// parameter schema fail with [`SkillError::Validation`] before the
    /// handler runs.
    pub fn execute(&self, name: &str, arguments: &SkillArgs) -> Result<Value, SkillError> {
        let (definition, handler) = self.registry.resolve(name)?;
        validate_arguments(&definition.parameters, arguments)?;
        handler(arguments)
    }

    /// Parses the raw argument string, runs the skill, and wraps whatever
    /// happens into a well-formed result. Never fails.
    pub fn execute_tool_call(&self, call: &ToolCallRequest) -> ExecutionResult {
        let started = Instant::now();
        let arguments = match parse_arguments(&call.arguments_raw) {
            Ok(arguments) => arguments,
            Err(err) => {
                debug!(tool = %call.function_name, id = %call.id, error = %err, "Tool arguments rejected");
                return ExecutionResult::failure(&call.function_name, &err);
            }
        };

        let result = match self.execute(&call.function_name, &arguments) {
            Ok(payload) => ExecutionResult::success(&call.function_name, payload),
            Err(err) => ExecutionResult::failure(&call.function_name, &err),
        };

        debug!(
            tool = %call.function_name,
            id = %call.id,
            success = result.success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool call executed"
        );
        result
    }
}

/// An empty argument string means "no arguments"; anything else must decode
/// to a JSON object.
pub fn parse_arguments(raw: &str) -> Result<SkillArgs, SkillError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(SkillArgs::new());
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(SkillError::validation(format!(
            "failed to parse arguments: expected an object, got {}",
            json_kind(&other)
        ))),
        Err(err) => Err(SkillError::validation(format!(
            "failed to parse arguments: {err}"
        ))),
    }
}

fn validate_arguments(schema: &Value, arguments: &SkillArgs) -> Result<(), SkillError> {
    if !schema.is_object() {
        return Ok(());
    }

    let validator = match jsonschema::validator_for(schema) {
        Ok(validator) => validator,
        Err(err) => {
            debug!(error = %err, "Skill schema could not be compiled; skipping validation");
            return Ok(());
        }
    };

    let instance = Value::Object(arguments.clone());
    let problems: Vec<String> = validator
        .iter_errors(&instance)
        .map(|error| error.to_string())
        .collect();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(SkillError::validation(format!(
            "invalid arguments: {}",
            problems.join("; ")
        )))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
