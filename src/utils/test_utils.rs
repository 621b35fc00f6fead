use std::sync::Arc;

use serde_json::{json, Value};

use crate::core::app::App;
use crate::core::config::Config;
use crate::core::message::ToolCallRequest;
use crate::core::session::Session;
use crate::skills::builtin::register_builtin_skills;
use crate::skills::{SkillArgs, SkillDefinition, SkillRegistry};

/// App on `openai`/`gpt-4o-mini` with the built-in skills and default config.
pub fn create_test_app() -> App {
    create_test_app_with_config(Config::default())
}

pub fn create_test_app_with_config(config: Config) -> App {
    let registry = Arc::new(SkillRegistry::new());
    register_builtin_skills(&registry);
    App::new(
        config,
        registry,
        Session::new("openai", "gpt-4o-mini"),
        false,
    )
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
    ToolCallRequest {
        id: id.to_string(),
        function_name: name.to_string(),
        arguments_raw: arguments.to_string(),
    }
}

/// Registers a skill that echoes its `value` argument back.
pub fn register_echo_value(registry: &SkillRegistry, name: &str) {
    registry.register_skill(SkillDefinition::new(
        name,
        format!("{name} test skill"),
        json!({
            "type": "object",
            "properties": {"value": {"type": "string"}},
            "required": ["value"]
        }),
    ));
    registry.register_handler(name, |args: &SkillArgs| {
        Ok(args.get("value").cloned().unwrap_or(Value::Null))
    });
}
