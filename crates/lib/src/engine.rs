//! The engine container.
//!
//! [`RagEngine`] owns the provider clients shared by the chat, ingestion
//! and evaluation pipelines. Orchestrators receive it by reference, which
//! keeps construction in one place and tests free of global state.

use crate::providers::ai::catalog::{self, ModelsResponse, Provider};
use crate::providers::ai::embedding::EmbeddingService;
use crate::providers::ai::gateway::GatewayClient;
use crate::providers::vector::VectorStoreService;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Fallback judge model when the operator configured none.
const DEFAULT_JUDGE_MODEL: &str = "openai/gpt-5";

/// Bounds for the evaluation fan-out knob.
const EVALUATION_CONCURRENCY_RANGE: (usize, usize) = (1, 16);

/// Everything the engine needs at construction time. All values come from
/// process configuration and are read-only afterwards.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub gateway_base_url: Option<String>,
    pub gateway_api_key: Option<String>,
    pub gateway_timeout: Duration,
    pub llm_max_tokens: u32,
    /// Model used to score answers during evaluation.
    pub judge_model: Option<String>,
    pub local_vector_dir: PathBuf,
    /// Override for the managed backend's control plane (tests only).
    pub pinecone_control_url: Option<String>,
    /// Directory tree evaluation CSVs must live in.
    pub evaluation_dir: PathBuf,
    pub evaluation_concurrency: usize,
    /// Operator model allow-lists per provider.
    pub configured_models: HashMap<Provider, Vec<String>>,
}

/// Shared engine: provider clients plus the evaluation policy knobs.
pub struct RagEngine {
    pub(crate) gateway: GatewayClient,
    pub(crate) embeddings: EmbeddingService,
    pub(crate) vectors: VectorStoreService,
    pub(crate) configured_models: HashMap<Provider, Vec<String>>,
    pub(crate) judge_model: String,
    pub(crate) evaluation_dir: PathBuf,
    pub(crate) evaluation_concurrency: usize,
}

impl RagEngine {
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        let gateway = GatewayClient::new(
            config.gateway_base_url.clone(),
            config.gateway_api_key.clone(),
            config.llm_max_tokens,
            config.gateway_timeout,
        )?;
        let embeddings = EmbeddingService::new(
            config.gateway_base_url,
            config.gateway_api_key,
            config.gateway_timeout,
        )?;
        let vectors =
            VectorStoreService::new(config.local_vector_dir, config.pinecone_control_url);

        let judge_model = config
            .judge_model
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_JUDGE_MODEL.to_string());

        let (low, high) = EVALUATION_CONCURRENCY_RANGE;
        let evaluation_concurrency = config.evaluation_concurrency.clamp(low, high);

        // Canonicalize up front so path-confinement checks compare like
        // with like.
        std::fs::create_dir_all(&config.evaluation_dir)?;
        let evaluation_dir = config.evaluation_dir.canonicalize()?;

        Ok(Self {
            gateway,
            embeddings,
            vectors,
            configured_models: config.configured_models,
            judge_model,
            evaluation_dir,
            evaluation_concurrency,
        })
    }

    /// The configured providers and their models.
    pub fn list_models(&self) -> ModelsResponse {
        catalog::list_models(&self.configured_models)
    }
}
