//! Provider and model catalog for the upstream gateway.
//!
//! The provider set is a closed sum type keyed by its wire tag; adding a
//! provider means extending the enum and the match arms below. Model lists
//! come from operator configuration with curated defaults as fallback.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// The closed set of chat providers served through the gateway router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Openai,
    Anthropic,
    Google,
    Grok,
    Deepseek,
    Perplexity,
    Glm,
}

pub const ALL_PROVIDERS: [Provider; 7] = [
    Provider::Openai,
    Provider::Anthropic,
    Provider::Google,
    Provider::Grok,
    Provider::Deepseek,
    Provider::Perplexity,
    Provider::Glm,
];

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Openai => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::Grok => "grok",
            Provider::Deepseek => "deepseek",
            Provider::Perplexity => "perplexity",
            Provider::Glm => "glm",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Provider::Openai => "OpenAI",
            Provider::Anthropic => "Anthropic",
            Provider::Google => "Google Gemini",
            Provider::Grok => "Grok",
            Provider::Deepseek => "DeepSeek",
            Provider::Perplexity => "Perplexity",
            Provider::Glm => "GLM (z-ai)",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Provider::Openai => "GPT series via FastRouter",
            Provider::Anthropic => "Claude family via FastRouter",
            Provider::Google => "Gemini models served through FastRouter",
            Provider::Grok => "xAI Grok models via FastRouter",
            Provider::Deepseek => "DeepSeek reasoning models via FastRouter",
            Provider::Perplexity => "Perplexity Sonar models via FastRouter",
            Provider::Glm => "Z-AI GLM family models served via FastRouter",
        }
    }

    /// Environment-variable prefix for the operator's model allow-list.
    pub fn model_env_prefix(&self) -> &'static str {
        match self {
            Provider::Openai => "FASTROUTER_OPENAI_MODEL_",
            Provider::Anthropic => "FASTROUTER_ANTHROPIC_MODEL_",
            Provider::Google => "FASTROUTER_GEMINI_MODEL_",
            Provider::Grok => "FASTROUTER_GROK_MODEL_",
            Provider::Deepseek => "FASTROUTER_DEEPSEEK_MODEL_",
            Provider::Perplexity => "FASTROUTER_PERPLEXITY_MODEL_",
            Provider::Glm => "FASTROUTER_GLM_MODEL_",
        }
    }

    /// Curated defaults used when the environment configures no models for
    /// the provider, so listings stay useful in bare deployments.
    pub fn default_models(&self) -> &'static [&'static str] {
        match self {
            Provider::Openai => &[
                "openai/gpt-5",
                "openai/gpt-oss-120b",
                "openai/gpt-5.1",
                "openai/gpt-4.1",
            ],
            Provider::Anthropic => &[
                "anthropic/claude-4.5-sonnet",
                "anthropic/claude-3-7-sonnet-20250219:thinking",
                "anthropic/claude-opus-4.1",
                "anthropic/claude-opus-4-20250514",
            ],
            Provider::Google => &["google/gemini-2.5-pro", "google/gemini-2.5-flash"],
            Provider::Grok => &["x-ai/grok-4", "x-ai/grok-3-mini-beta"],
            Provider::Deepseek => &["deepseek-ai/DeepSeek-R1", "deepseek/deepseek-v3.1"],
            Provider::Perplexity => &[
                "perplexity/sonar-reasoning-pro",
                "perplexity/sonar-pro",
                "perplexity/sonar-deep-research",
            ],
            Provider::Glm => &["z-ai/glm-4.6", "z-ai/glm-4.5"],
        }
    }
}

impl FromStr for Provider {
    type Err = ();

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::Openai),
            "anthropic" => Ok(Provider::Anthropic),
            "google" => Ok(Provider::Google),
            "grok" => Ok(Provider::Grok),
            "deepseek" => Ok(Provider::Deepseek),
            "perplexity" => Ok(Provider::Perplexity),
            "glm" => Ok(Provider::Glm),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paid/Free badge for known model ids; unknown models carry no badge.
pub fn model_tier(model_id: &str) -> Option<&'static str> {
    let tier = match model_id {
        "openai/gpt-5" => "Paid",
        "openai/gpt-oss-120b" => "Free",
        "openai/gpt-5.1" => "Paid",
        "openai/gpt-4.1" => "Free",
        "anthropic/claude-4.5-sonnet" => "Paid",
        "anthropic/claude-3-7-sonnet-20250219:thinking" => "Paid",
        "anthropic/claude-opus-4.1" => "Paid",
        "anthropic/claude-opus-4-20250514" => "Paid",
        "google/gemini-2.5-pro" => "Paid",
        "google/gemini-2.5-flash" => "Free",
        "perplexity/sonar-reasoning-pro" => "Paid",
        "perplexity/sonar-pro" => "Paid",
        "perplexity/sonar-deep-research" => "Paid",
        "x-ai/grok-4" => "Paid",
        "x-ai/grok-3-mini-beta" => "Paid",
        "deepseek-ai/DeepSeek-R1" => "Free",
        "deepseek/deepseek-v3.1" => "Paid",
        "z-ai/glm-4.6" => "Free",
        "z-ai/glm-4.5" => "Free",
        _ => return None,
    };
    Some(tier)
}

/// An individual model option exposed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ModelOption {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
}

/// Collection of models for a specific provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderOption {
    pub id: Provider,
    pub label: String,
    pub description: String,
    pub models: Vec<ModelOption>,
}

/// Response payload for the model listing endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelsResponse {
    pub providers: Vec<ProviderOption>,
}

/// Returns every provider with the union of configured and curated models,
/// deduplicated and sorted by id case-insensitively.
pub fn list_models(configured: &HashMap<Provider, Vec<String>>) -> ModelsResponse {
    let mut providers = Vec::with_capacity(ALL_PROVIDERS.len());

    for provider in ALL_PROVIDERS {
        let cleaned: BTreeSet<String> = configured
            .get(&provider)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| entry.trim().to_string())
                    .filter(|entry| !entry.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let mut ids: Vec<String> = if cleaned.is_empty() {
            provider
                .default_models()
                .iter()
                .map(|id| id.to_string())
                .collect()
        } else {
            cleaned.into_iter().collect()
        };
        ids.sort_by_key(|id| id.to_lowercase());
        ids.dedup();

        let models = ids
            .into_iter()
            .map(|id| ModelOption {
                label: format_model_label(&id),
                badge: model_tier(&id).map(str::to_string),
                id,
            })
            .collect();

        providers.push(ProviderOption {
            id: provider,
            label: provider.label().to_string(),
            description: provider.description().to_string(),
            models,
        });
    }

    ModelsResponse { providers }
}

/// Derives a human-readable label from a model id, e.g.
/// `openai/gpt-oss-120b` becomes `GPT OSS 120b`.
pub fn format_model_label(model_id: &str) -> String {
    let candidate = model_id.rsplit('/').next().unwrap_or(model_id);
    let spaced = candidate.replace(['-', '_'], " ");

    let formatted = spaced
        .split_whitespace()
        .map(|word| {
            if matches!(word, "gpt" | "llama" | "oss" | "xai") {
                word.to_uppercase()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if formatted.is_empty() {
        model_id.to_string()
    } else {
        formatted
    }
}
