use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::SkillError;
use crate::api::{ChatToolDefinition, ChatToolFunction};

/// Metadata the model sees for one skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub name: String,
    pub description: String,
    /// JSON-Schema shaped object: `type`, `properties`, `required`.
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
}

impl SkillDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Checks the constraints providers enforce on function schemas.
    pub fn wire_problem(&self) -> Option<String> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
        {
            return Some(format!("invalid skill name {:?}", self.name));
        }
        if self.description.trim().is_empty() {
            return Some(format!("skill {} has an empty description", self.name));
        }

        let properties = self.parameters.get("properties").and_then(Value::as_object);
        if let Some(required) = self.parameters.get("required").and_then(Value::as_array) {
            for key in required {
                let present = key
                    .as_str()
                    .zip(properties)
                    .is_some_and(|(key, props)| props.contains_key(key));
                if !present {
                    return Some(format!(
                        "skill {} requires {} which is not a declared property",
                        self.name, key
                    ));
                }
            }
        }
        None
    }

    pub fn to_tool_definition(&self) -> ChatToolDefinition {
        ChatToolDefinition {
            kind: "function".to_string(),
            function: ChatToolFunction {
                name: self.name.clone(),
                description: self.description.clone(),
                parameters: self.parameters.clone(),
            },
        }
    }
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Arguments handed to a skill handler after parsing.
pub type SkillArgs = Map<String, Value>;

/// A callable bound to a skill name.
pub type SkillHandler = Arc<dyn Fn(&SkillArgs) -> Result<Value, SkillError> + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    order: Vec<String>,
    skills: HashMap<String, SkillDefinition>,
    handlers: HashMap<String, SkillHandler>,
}

/// Skill definitions and handler bindings, shared between the event loop and
/// background skill tasks.
#[derive(Default)]
pub struct SkillRegistry {
    inner: RwLock<RegistryInner>,
}

impl fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SkillRegistry")
            .field("skills", &inner.order)
            .field("handlers", &inner.handlers.len())
            .finish()
    }
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a definition. Replacing keeps the original slot.
    pub fn register_skill(&self, definition: SkillDefinition) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !inner.skills.contains_key(&definition.name) {
            inner.order.push(definition.name.clone());
        }
        inner.skills.insert(definition.name.clone(), definition);
    }

    pub fn register_handler<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&SkillArgs) -> Result<Value, SkillError> + Send + Sync + 'static,
    {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn get_skill(&self, name: &str) -> Option<SkillDefinition> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.skills.get(name).cloned()
    }

    /// Definitions in registration order.
    pub fn list_skills(&self) -> Vec<SkillDefinition> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .order
            .iter()
            .filter_map(|name| inner.skills.get(name).cloned())
            .collect()
    }

    pub fn has_handler(&self, name: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.handlers.contains_key(name)
    }

    /// Removes the definition only; a bound handler stays registered.
    pub fn delete_skill(&self, name: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.skills.remove(name).is_some() {
            inner.order.retain(|existing| existing != name);
        }
    }

    pub fn count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Function schemas for every valid definition, in registration order.
    pub fn to_tool_definitions(&self) -> Vec<ChatToolDefinition> {
        self.list_skills()
            .into_iter()
            .filter_map(|definition| match definition.wire_problem() {
                Some(problem) => {
                    warn!(skill = %definition.name, %problem, "Skipping skill with invalid schema");
                    None
                }
                None => Some(definition.to_tool_definition()),
            })
            .collect()
    }

    /// Snapshot of what `execute` needs, taken under one read lock so the
    /// handler runs without holding it.
    pub(crate) fn resolve(
        &self,
        name: &str,
    ) -> Result<(SkillDefinition, SkillHandler), SkillError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let definition = inner
            .skills
            .get(name)
            .cloned()
            .ok_or_else(|| SkillError::NotFound(name.to_string()))?;
        let handler = inner
            .handlers
            .get(name)
            .cloned()
            .ok_or_else(|| SkillError::NoHandler(name.to_string()))?;
        Ok((definition, handler))
    }
}
