//! Token budget tracking for the active session.

use std::fmt;

use super::message::ConversationMessage;

const DEFAULT_CONTEXT_LIMIT: u32 = 8_192;
const CHARS_PER_TOKEN: usize = 4;
const PER_MESSAGE_OVERHEAD: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WarningLevel {
    Ok,
    Warn,
    Caution,
    Critical,
}

impl WarningLevel {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.75 {
            WarningLevel::Ok
        } else if ratio < 0.85 {
            WarningLevel::Warn
        } else if ratio < 0.95 {
            WarningLevel::Caution
        } else {
            WarningLevel::Critical
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WarningLevel::Ok => "ok",
            WarningLevel::Warn => "warn",
            WarningLevel::Caution => "caution",
            WarningLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived from the session's token counters; never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextUsage {
    pub current_tokens: u32,
    pub max_tokens: u32,
}

impl ContextUsage {
    pub fn new(current_tokens: u32, max_tokens: u32) -> Self {
        Self {
            current_tokens,
            max_tokens,
        }
    }

    pub fn ratio(&self) -> f64 {
        if self.max_tokens == 0 {
            return 1.0;
        }
        f64::from(self.current_tokens) / f64::from(self.max_tokens)
    }

    pub fn warning_level(&self) -> WarningLevel {
        WarningLevel::from_ratio(self.ratio())
    }

    pub fn remaining(&self) -> u32 {
        self.max_tokens.saturating_sub(self.current_tokens)
    }

    pub fn percent(&self) -> f64 {
        self.ratio() * 100.0
    }
}

/// Rough token count for text when the provider reports no usage.
pub fn estimate_text_tokens(text: &str) -> u32 {
    u32::try_from(text.len().div_ceil(CHARS_PER_TOKEN)).unwrap_or(u32::MAX)
}

/// Estimated prompt size of a message history, including per-message framing.
pub fn estimate_tokens(messages: &[ConversationMessage]) -> u32 {
    messages.iter().fold(0u32, |total, message| {
        let mut tokens = estimate_text_tokens(&message.content).saturating_add(PER_MESSAGE_OVERHEAD);
        if let Some(calls) = &message.tool_calls {
            for call in calls {
                tokens = tokens
                    .saturating_add(estimate_text_tokens(&call.function_name))
                    .saturating_add(estimate_text_tokens(&call.arguments_raw));
            }
        }
        total.saturating_add(tokens)
    })
}

/// Context window for a model name. Unknown models get a conservative
/// default.
pub fn model_context_limit(model: &str) -> u32 {
    let model = model.to_ascii_lowercase();
    let bare = model.rsplit('/').next().unwrap_or(&model);

    match bare {
        "gpt-4o" | "gpt-4o-mini" | "grok-4-1-fast" => 128_000,
        "gpt-4" | "venice-uncensored" => 8_192,
        _ if bare.starts_with("claude-") => 200_000,
        _ if bare.starts_with("gpt-4o") || bare.starts_with("gpt-4.1") => 128_000,
        _ if bare.starts_with("grok-") => 128_000,
        _ => DEFAULT_CONTEXT_LIMIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_map_to_levels() {
        let level = |current| ContextUsage::new(current, 100).warning_level();
        assert_eq!(level(70), WarningLevel::Ok);
        assert_eq!(level(80), WarningLevel::Warn);
        assert_eq!(level(90), WarningLevel::Caution);
        assert_eq!(level(97), WarningLevel::Critical);
    }

    #[test]
    fn boundaries_belong_to_the_higher_level() {
        assert_eq!(WarningLevel::from_ratio(0.75), WarningLevel::Warn);
        assert_eq!(WarningLevel::from_ratio(0.85), WarningLevel::Caution);
        assert_eq!(WarningLevel::from_ratio(0.95), WarningLevel::Critical);
    }

    #[test]
    fn zero_budget_is_critical() {
        assert_eq!(ContextUsage::new(0, 0).warning_level(), WarningLevel::Critical);
    }

    #[test]
    fn estimate_counts_characters_and_framing() {
        let messages = vec![
            ConversationMessage::user("12345678"),
            ConversationMessage::assistant(""),
        ];
        assert_eq!(estimate_tokens(&messages), 2 + 4 + 4);
    }

    #[test]
    fn model_limits_follow_known_families() {
        assert_eq!(model_context_limit("gpt-4o-mini"), 128_000);
        assert_eq!(model_context_limit("openai/gpt-4o-mini"), 128_000);
        assert_eq!(model_context_limit("claude-sonnet-4-5-20250929"), 200_000);
        assert_eq!(model_context_limit("venice-uncensored"), 8_192);
        assert_eq!(model_context_limit("mystery"), 8_192);
    }
}
