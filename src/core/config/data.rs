use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::provider_client::ResolvedEndpoint;
use crate::core::providers::{find_provider, model_supports_tools};

pub const DEFAULT_ENDPOINT: &str = "openai";
pub const DEFAULT_NSFW_ENDPOINT: &str = "venice";
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;
pub const DEFAULT_CHARS_PER_TICK: usize = 2;
pub const DEFAULT_TICK_MS: u64 = 80;

/// Overrides or additions to the built-in provider table.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct EndpointConfig {
    pub id: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Environment variable holding the key, checked when `api_key` is unset.
    pub api_key_env: Option<String>,
    /// Model selected when switching to this endpoint.
    pub model: Option<String>,
    /// Whether the endpoint accepts function schemas. Defaults to the
    /// built-in table, or `true` for unknown hosts.
    pub supports_tools: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct TypingConfig {
    pub chars_per_tick: Option<usize>,
    pub tick_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub default_endpoint: Option<String>,
    pub nsfw_endpoint: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    /// Sent ahead of every request; never stored in the session.
    pub system_prompt: Option<String>,
    /// Continuation rounds allowed per turn before tools are withheld.
    pub max_tool_rounds: Option<u32>,
    /// Overrides the per-model context window.
    pub context_limit: Option<u32>,
    #[serde(default)]
    pub typing: TypingConfig,
}

impl Config {
    /// Defaults written out explicitly, for `--write-default-config`.
    pub fn starter() -> Self {
        Self {
            default_endpoint: Some(DEFAULT_ENDPOINT.to_string()),
            nsfw_endpoint: Some(DEFAULT_NSFW_ENDPOINT.to_string()),
            max_tool_rounds: Some(DEFAULT_MAX_TOOL_ROUNDS),
            typing: TypingConfig {
                chars_per_tick: Some(DEFAULT_CHARS_PER_TICK),
                tick_ms: Some(DEFAULT_TICK_MS),
            },
            ..Self::default()
        }
    }

    pub fn default_endpoint(&self) -> &str {
        self.default_endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn nsfw_endpoint(&self) -> &str {
        self.nsfw_endpoint.as_deref().unwrap_or(DEFAULT_NSFW_ENDPOINT)
    }

    pub fn max_tool_rounds(&self) -> u32 {
        self.max_tool_rounds.unwrap_or(DEFAULT_MAX_TOOL_ROUNDS)
    }

    pub fn chars_per_tick(&self) -> usize {
        self.typing
            .chars_per_tick
            .filter(|chars| *chars > 0)
            .unwrap_or(DEFAULT_CHARS_PER_TICK)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.typing.tick_ms.unwrap_or(DEFAULT_TICK_MS).max(1))
    }

    pub fn endpoint_config(&self, id: &str) -> Option<&EndpointConfig> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.id.eq_ignore_ascii_case(id))
    }

    /// Known ids: the built-in table plus configured endpoints.
    pub fn is_known_endpoint(&self, id: &str) -> bool {
        find_provider(id).is_some() || self.endpoint_config(id).is_some()
    }

    /// Model chosen on switching to `id`: the configured model, else the
    /// provider's preferred tool model, else its default.
    pub fn initial_model(&self, id: &str) -> Option<String> {
        if let Some(model) = self.endpoint_config(id).and_then(|e| e.model.clone()) {
            return Some(model);
        }
        find_provider(id).map(|provider| provider.initial_model().to_string())
    }

    pub fn endpoint_supports_tools(&self, id: &str) -> bool {
        if let Some(flag) = self.endpoint_config(id).and_then(|e| e.supports_tools) {
            return flag;
        }
        find_provider(id).is_none_or(|provider| provider.supports_tool_calling)
    }

    /// Skills are sent only when both the endpoint and the model accept them.
    pub fn tools_available(&self, endpoint: &str, model: &str) -> bool {
        if !self.endpoint_supports_tools(endpoint) {
            return false;
        }
        if self
            .endpoint_config(endpoint)
            .and_then(|e| e.supports_tools)
            .is_some()
        {
            return true;
        }
        model_supports_tools(endpoint, model)
    }

    pub fn resolve_endpoint(&self, id: &str) -> ResolvedEndpoint {
        self.resolve_endpoint_with(id, |name| std::env::var(name).ok())
    }

    /// API key precedence: config value, then `api_key_env`, then
    /// `<ID>_API_KEY`.
    pub fn resolve_endpoint_with<F>(&self, id: &str, env: F) -> ResolvedEndpoint
    where
        F: Fn(&str) -> Option<String>,
    {
        let configured = self.endpoint_config(id);
        let builtin = find_provider(id);

        let base_url = configured
            .and_then(|e| e.base_url.clone())
            .or_else(|| builtin.map(|p| p.base_url.to_string()))
            .unwrap_or_default();

        let api_key = configured
            .and_then(|e| e.api_key.clone())
            .or_else(|| {
                configured
                    .and_then(|e| e.api_key_env.as_deref())
                    .and_then(&env)
            })
            .or_else(|| env(&default_key_var(id)))
            .filter(|key| !key.trim().is_empty());

        ResolvedEndpoint {
            id: builtin
                .map(|p| p.id.to_string())
                .or_else(|| configured.map(|e| e.id.clone()))
                .unwrap_or_else(|| id.to_string()),
            base_url,
            api_key,
        }
    }
}

pub fn default_key_var(id: &str) -> String {
    format!("{}_API_KEY", id.to_ascii_uppercase().replace('-', "_"))
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
