//! Application configuration.
//!
//! Everything comes from environment variables (a `.env` file is loaded at
//! startup) and is read-only afterwards. Model allow-lists are discovered
//! by scanning `FASTROUTER_<PROVIDER>_MODEL_<n>` entries.

use config::{Config as ConfigBuilder, Environment};
use krira::providers::ai::catalog::{Provider, ALL_PROVIDERS};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

/// Root configuration, deserialized from the environment.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Port for the server to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Root directory for uploaded dataset files.
    #[serde(default = "default_uploads_directory")]
    pub uploads_directory: String,
    /// Directory holding the local vector store database.
    #[serde(default = "default_local_vector_directory")]
    pub local_vector_directory: String,
    /// API key for the upstream LLM gateway.
    #[serde(default)]
    pub fastrouter_api_key: Option<String>,
    /// Base URL of the upstream LLM gateway.
    #[serde(default = "default_fastrouter_base_url")]
    pub fastrouter_base_url: String,
    #[serde(default = "default_llm_max_tokens")]
    pub llm_max_tokens: u32,
    /// Deadline for gateway calls, in seconds.
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
    /// Directory tree evaluation CSVs must live in.
    #[serde(default = "default_evaluation_directory")]
    pub evaluation_directory: String,
    /// Concurrent evaluation rows; clamped to [1, 16] by the engine.
    #[serde(default = "default_evaluation_concurrency")]
    pub evaluation_concurrency: usize,
    /// Endpoint of the external key-verification service.
    #[serde(default)]
    pub api_verification_url: Option<String>,
    /// Shared secret sent to the key-verification service.
    #[serde(default)]
    pub service_api_secret: Option<String>,
    /// Override for the managed vector backend's control plane (tests).
    #[serde(default)]
    pub pinecone_control_url: Option<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_uploads_directory() -> String {
    "uploads".to_string()
}
fn default_local_vector_directory() -> String {
    "vector_store/local".to_string()
}
fn default_fastrouter_base_url() -> String {
    "https://go.fastrouter.ai/api/v1".to_string()
}
fn default_llm_max_tokens() -> u32 {
    1024
}
fn default_gateway_timeout_secs() -> u64 {
    120
}
fn default_evaluation_directory() -> String {
    "test".to_string()
}
fn default_evaluation_concurrency() -> usize {
    3
}

/// Loads the configuration from the process environment.
pub fn get_config() -> Result<AppConfig, config::ConfigError> {
    ConfigBuilder::builder()
        .add_source(Environment::default())
        .build()?
        .try_deserialize()
}

/// Scans the environment for per-provider model allow-lists. Inline `#`
/// comments and surrounding whitespace are stripped from each entry.
pub fn configured_models_from_env() -> HashMap<Provider, Vec<String>> {
    let vars: Vec<(String, String)> = env::vars().collect();
    let mut configured = HashMap::new();

    for provider in ALL_PROVIDERS {
        let prefix = provider.model_env_prefix();
        let mut models: Vec<String> = vars
            .iter()
            .filter(|(key, value)| key.starts_with(prefix) && !value.is_empty())
            .filter_map(|(_, value)| {
                let cleaned = value.split('#').next().unwrap_or("").trim();
                (!cleaned.is_empty()).then(|| cleaned.to_string())
            })
            .collect();
        models.sort();
        if !models.is_empty() {
            configured.insert(provider, models);
        }
    }

    configured
}

/// The judge model used by the evaluator: the first configured OpenAI
/// entry wins, otherwise the engine falls back to its default.
pub fn judge_model_from_env() -> Option<String> {
    env::var("FASTROUTER_OPENAI_MODEL_1")
        .or_else(|_| env::var("FASTROUTER_OPENAI_MODEL"))
        .ok()
        .map(|value| value.split('#').next().unwrap_or("").trim().to_string())
        .filter(|value| !value.is_empty())
}
