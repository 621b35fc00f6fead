//! Built-in provider capability table.
//!
//! Every endpoint speaks the OpenAI-compatible `chat/completions` dialect; the
//! table records where it lives and whether it accepts function schemas.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    pub id: &'static str,
    pub display_name: &'static str,
    /// Empty when the host is account-specific and must come from config.
    pub base_url: &'static str,
    pub supports_tool_calling: bool,
    pub default_model: &'static str,
    pub preferred_tool_model: Option<&'static str>,
}

impl ProviderCapabilities {
    /// Model to select when switching to this provider.
    pub fn initial_model(&self) -> &'static str {
        if self.supports_tool_calling {
            self.preferred_tool_model.unwrap_or(self.default_model)
        } else {
            self.default_model
        }
    }
}

const PROVIDERS: &[ProviderCapabilities] = &[
    ProviderCapabilities {
        id: "openai",
        display_name: "OpenAI",
        base_url: "https://api.openai.com/v1",
        supports_tool_calling: true,
        default_model: "gpt-4o-mini",
        preferred_tool_model: Some("gpt-4o-mini"),
    },
    ProviderCapabilities {
        id: "grok",
        display_name: "xAI Grok",
        base_url: "https://api.x.ai/v1",
        supports_tool_calling: true,
        default_model: "grok-4-1-fast",
        preferred_tool_model: Some("grok-4-1-fast"),
    },
    ProviderCapabilities {
        id: "venice",
        display_name: "Venice.ai",
        base_url: "https://api.venice.ai/api/v1",
        supports_tool_calling: false,
        default_model: "venice-uncensored",
        preferred_tool_model: None,
    },
    ProviderCapabilities {
        id: "anthropic",
        display_name: "Anthropic",
        base_url: "https://api.anthropic.com/v1",
        supports_tool_calling: true,
        default_model: "claude-sonnet-4-5-20250929",
        preferred_tool_model: Some("claude-sonnet-4-5-20250929"),
    },
    ProviderCapabilities {
        id: "openrouter",
        display_name: "OpenRouter",
        base_url: "https://openrouter.ai/api/v1",
        supports_tool_calling: true,
        default_model: "openai/gpt-4o-mini",
        preferred_tool_model: Some("openai/gpt-4o-mini"),
    },
    ProviderCapabilities {
        id: "digitalocean",
        display_name: "DigitalOcean Gradient",
        base_url: "",
        supports_tool_calling: false,
        default_model: "gpt-4o-mini",
        preferred_tool_model: None,
    },
];

pub fn builtin_providers() -> &'static [ProviderCapabilities] {
    PROVIDERS
}

/// Case-insensitive lookup by id.
pub fn find_provider(id: &str) -> Option<&'static ProviderCapabilities> {
    PROVIDERS
        .iter()
        .find(|provider| provider.id.eq_ignore_ascii_case(id))
}

/// Whether `model` accepts function schemas on `provider`. Unknown providers
/// (custom OpenAI-compatible hosts) are assumed capable.
pub fn model_supports_tools(provider: &str, model: &str) -> bool {
    let model = model.to_ascii_lowercase();
    match provider.to_ascii_lowercase().as_str() {
        "openai" => model.contains("gpt-4") || model.contains("gpt-3.5-turbo"),
        "grok" => model.contains("grok-4") || model.contains("grok-beta"),
        "venice" => !model.contains("uncensored"),
        "anthropic" => {
            model.contains("claude-3") || model.contains("claude-4") || model.contains("claude-sonnet")
        }
        "openrouter" => {
            model.contains("gpt-") || model.contains("claude-") || model.contains("gemini-")
        }
        "digitalocean" => false,
        _ => true,
    }
}
