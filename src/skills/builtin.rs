//! Skills compiled into the binary.
//!
//! Each one is self-contained (no network, no files) so tool calling works
//! against any endpoint without extra setup.

use base64::Engine as _;
use serde_json::{json, Value};

use super::{SkillArgs, SkillDefinition, SkillError, SkillRegistry};

/// Registers every built-in skill and its handler.
pub fn register_builtin_skills(registry: &SkillRegistry) {
    registry.register_skill(SkillDefinition::new(
        "echo",
        "Return the given message unchanged. Useful for checking that tool calls work.",
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string", "description": "Text to echo back"}
            },
            "required": ["message"]
        }),
    ));
    registry.register_handler("echo", echo);

    registry.register_skill(SkillDefinition::new(
        "add",
        "Add two numbers and return the sum.",
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "number", "description": "First addend"},
                "b": {"type": "number", "description": "Second addend"}
            },
            "required": ["a", "b"]
        }),
    ));
    registry.register_handler("add", add);

    registry.register_skill(SkillDefinition::new(
        "base64_encode",
        "Encode UTF-8 text as standard base64.",
        json!({
            "type": "object",
            "properties": {
                "text": {"type": "string", "description": "Text to encode"}
            },
            "required": ["text"]
        }),
    ));
    registry.register_handler("base64_encode", base64_encode);

    registry.register_skill(SkillDefinition::new(
        "base64_decode",
        "Decode standard base64 into UTF-8 text.",
        json!({
            "type": "object",
            "properties": {
                "data": {"type": "string", "description": "Base64 input"}
            },
            "required": ["data"]
        }),
    ));
    registry.register_handler("base64_decode", base64_decode);

    registry.register_skill(SkillDefinition::new(
        "checksum",
        "Compute the CRC-32 checksum of some text, as lowercase hex.",
        json!({
            "type": "object",
            "properties": {
                "text": {"type": "string", "description": "Text to checksum"}
            },
            "required": ["text"]
        }),
    ));
    registry.register_handler("checksum", checksum);

    registry.register_skill(SkillDefinition::new(
        "generate_uuid",
        "Generate a random version 4 UUID.",
        json!({"type": "object", "properties": {}}),
    ));
    registry.register_handler("generate_uuid", generate_uuid);
}

fn string_arg<'a>(args: &'a SkillArgs, key: &str) -> Result<&'a str, SkillError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| SkillError::validation(format!("missing string argument '{key}'")))
}

fn number_arg(args: &SkillArgs, key: &str) -> Result<f64, SkillError> {
    args.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| SkillError::validation(format!("missing numeric argument '{key}'")))
}

fn echo(args: &SkillArgs) -> Result<Value, SkillError> {
    let message = string_arg(args, "message")?;
    Ok(json!({ "message": message }))
}

fn add(args: &SkillArgs) -> Result<Value, SkillError> {
    // Integer inputs stay integers so "2 + 2" renders as 4, not 4.0.
    if let (Some(a), Some(b)) = (
        args.get("a").and_then(Value::as_i64),
        args.get("b").and_then(Value::as_i64),
    ) {
        if let Some(sum) = a.checked_add(b) {
            return Ok(json!(sum));
        }
    }
    let sum = number_arg(args, "a")? + number_arg(args, "b")?;
    if !sum.is_finite() {
        return Err(SkillError::handler("sum is not a finite number"));
    }
    Ok(json!(sum))
}

fn base64_encode(args: &SkillArgs) -> Result<Value, SkillError> {
    let text = string_arg(args, "text")?;
    Ok(Value::String(
        base64::prelude::BASE64_STANDARD.encode(text.as_bytes()),
    ))
}

fn base64_decode(args: &SkillArgs) -> Result<Value, SkillError> {
    let data = string_arg(args, "data")?;
    let bytes = base64::prelude::BASE64_STANDARD
        .decode(data.trim())
        .map_err(|err| SkillError::handler(format!("invalid base64: {err}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| SkillError::handler("decoded bytes are not valid UTF-8"))?;
    Ok(Value::String(text))
}

fn checksum(args: &SkillArgs) -> Result<Value, SkillError> {
    let text = string_arg(args, "text")?;
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(text.as_bytes());
    Ok(json!({
        "algorithm": "crc32",
        "checksum": format!("{:08x}", hasher.finalize()),
    }))
}

fn generate_uuid(_args: &SkillArgs) -> Result<Value, SkillError> {
    let mut bytes = [0u8; 16];
    getrandom::fill(&mut bytes)
        .map_err(|err| SkillError::handler(format!("random source unavailable: {err}")))?;
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
    Ok(Value::String(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::ToolCallRequest;
    use crate::skills::SkillExecutor;
    use std::sync::Arc;

    fn executor() -> SkillExecutor {
        let registry = Arc::new(SkillRegistry::new());
        register_builtin_skills(&registry);
        SkillExecutor::new(registry)
    }

    fn run(name: &str, arguments: &str) -> String {
        executor()
            .execute_tool_call(&ToolCallRequest {
                id: "t".to_string(),
                function_name: name.to_string(),
                arguments_raw: arguments.to_string(),
            })
            .to_tool_content()
    }

    #[test]
    fn every_builtin_has_a_handler_and_a_valid_schema() {
        let registry = SkillRegistry::new();
        register_builtin_skills(&registry);

        for skill in registry.list_skills() {
            assert!(registry.has_handler(&skill.name), "{}", skill.name);
            assert_eq!(skill.wire_problem(), None);
        }
        assert_eq!(registry.to_tool_definitions().len(), registry.count());
    }

    #[test]
    fn add_keeps_integers_integral() {
        assert_eq!(run("add", r#"{"a":2,"b":2}"#), "4");
        assert_eq!(run("add", r#"{"a":1.5,"b":2}"#), "3.5");
    }

    #[test]
    fn base64_round_trips_through_both_skills() {
        assert_eq!(run("base64_encode", r#"{"text":"hello"}"#), "aGVsbG8=");
        assert_eq!(run("base64_decode", r#"{"data":"aGVsbG8="}"#), "hello");

        let failure: Value =
            serde_json::from_str(&run("base64_decode", r#"{"data":"%%%"}"#)).expect("json");
        assert_eq!(failure["error"], true);
    }

    #[test]
    fn checksum_matches_known_crc32() {
        let content: Value =
            serde_json::from_str(&run("checksum", r#"{"text":"hello"}"#)).expect("json");
        assert_eq!(content["checksum"], "3610a686");
    }

    #[test]
    fn generated_uuids_are_version_four() {
        let uuid = run("generate_uuid", "");
        assert_eq!(uuid.len(), 36);
        assert_eq!(uuid.as_bytes()[14], b'4');
        assert!(matches!(uuid.as_bytes()[19], b'8' | b'9' | b'a' | b'b'));
        assert_ne!(uuid, run("generate_uuid", "{}"));
    }
}
