//! End-to-end chat orchestration: retrieve, ground, generate.

use crate::context::{
    build_context_window, build_system_prompt, build_user_prompt, prepare_context_snippets,
    NO_CONTEXT_WINDOW,
};
use crate::engine::RagEngine;
use crate::providers::ai::catalog::Provider;
use crate::providers::ai::embedding::{EmbeddingError, EmbeddingModel};
use crate::providers::ai::gateway::{ChatOptions, GatewayError, TokenUsage};
use crate::providers::vector::{VectorStore, VectorStoreError};
use crate::types::{PineconeConfig, RetrievedContext};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// `top_k` applied when the pipeline configuration leaves it unset.
pub const DEFAULT_TOP_K: i64 = 30;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Unsupported provider '{0}'")]
    UnsupportedProvider(String),
    #[error("Model identifier is required for chat")]
    MissingModel,
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Parameters for one chat invocation, resolved from a pipeline
/// configuration by the caller.
#[derive(Debug, Clone, Default)]
pub struct ChatParams {
    pub provider: String,
    pub model_id: String,
    pub system_prompt: Option<String>,
    pub vector_store: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_dimension: Option<u32>,
    pub dataset_ids: Vec<String>,
    pub top_k: Option<i64>,
    pub question: String,
    pub pinecone: Option<PineconeConfig>,
}

/// Outcome of a chat invocation.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub answer: String,
    pub provider: Provider,
    pub model: String,
    pub context_snippets: Vec<String>,
    pub contexts: Vec<RetrievedContext>,
    pub latency_ms: u64,
    pub usage: TokenUsage,
}

/// A scored context preview returned by the configuration test harness.
#[derive(Debug, Clone, Serialize)]
pub struct ContextPreview {
    pub text: String,
    pub score: Option<f64>,
    pub metadata: serde_json::Value,
}

/// Response of the configuration test harness.
#[derive(Debug, Clone, Serialize)]
pub struct TestReply {
    pub question: String,
    pub answer: String,
    pub context_chunks_found: usize,
    pub model_used: String,
    pub provider: Provider,
    pub context: Vec<ContextPreview>,
}

impl RagEngine {
    /// Runs the public chat pipeline.
    ///
    /// Provider and model validation failures are fatal. Context retrieval
    /// failures are not: the request degrades to the no-docs window so the
    /// model can still answer (or decline) honestly. Latency covers the
    /// whole retrieve+generate span.
    pub async fn chat(&self, params: ChatParams) -> Result<ChatReply, ChatError> {
        let started = Instant::now();

        let provider: Provider = params
            .provider
            .parse()
            .map_err(|_| ChatError::UnsupportedProvider(params.provider.clone()))?;
        if params.model_id.trim().is_empty() {
            return Err(ChatError::MissingModel);
        }

        let dataset_ids: Vec<String> = params
            .dataset_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        // Retrieval only happens when the pipeline names datasets AND both
        // an embedding model and a vector store. Misconfigured names are
        // fatal; transient retrieval failures are not.
        let retrieval = self.resolve_retrieval(&params, &dataset_ids)?;

        let (contexts, context_snippets, context_text) = match retrieval {
            Some((model, store)) => {
                match self
                    .retrieve_context(model, store, &params, &dataset_ids)
                    .await
                {
                    Ok(contexts) => {
                        let snippets = prepare_context_snippets(&contexts);
                        let window = build_context_window(&contexts);
                        (contexts, snippets, window)
                    }
                    Err(error) => {
                        warn!(%error, "context retrieval failed; answering without external docs");
                        (Vec::new(), Vec::new(), NO_CONTEXT_WINDOW.to_string())
                    }
                }
            }
            None => (Vec::new(), Vec::new(), NO_CONTEXT_WINDOW.to_string()),
        };

        let system_prompt = build_system_prompt(params.system_prompt.as_deref());
        let user_prompt = build_user_prompt(params.question.trim(), &context_text);

        let outcome = self
            .gateway
            .chat(
                &params.model_id,
                &system_prompt,
                &user_prompt,
                ChatOptions::default(),
            )
            .await?;

        let latency_ms = started.elapsed().as_millis() as u64;
        info!(
            provider = %provider,
            model = %params.model_id,
            latency_ms,
            hits = contexts.len(),
            "chat completed"
        );

        Ok(ChatReply {
            answer: outcome.text.trim().to_string(),
            provider,
            model: params.model_id,
            context_snippets,
            contexts,
            latency_ms,
            usage: outcome.usage,
        })
    }

    /// Runs the same pipeline as [`RagEngine::chat`] but with every failure
    /// surfaced, for operators validating a draft configuration.
    pub async fn test_configuration(&self, params: ChatParams) -> Result<TestReply, ChatError> {
        let provider: Provider = params
            .provider
            .parse()
            .map_err(|_| ChatError::UnsupportedProvider(params.provider.clone()))?;
        if params.model_id.trim().is_empty() {
            return Err(ChatError::MissingModel);
        }

        let dataset_ids: Vec<String> = params
            .dataset_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        let contexts = match self.resolve_retrieval(&params, &dataset_ids)? {
            Some((model, store)) => {
                self.retrieve_context(model, store, &params, &dataset_ids)
                    .await?
            }
            None => Vec::new(),
        };

        let context_text = build_context_window(&contexts);
        let system_prompt = build_system_prompt(params.system_prompt.as_deref());
        let user_prompt = build_user_prompt(params.question.trim(), &context_text);
        let outcome = self
            .gateway
            .chat(
                &params.model_id,
                &system_prompt,
                &user_prompt,
                ChatOptions::default(),
            )
            .await?;

        let context = contexts
            .iter()
            .take(crate::context::MAX_CONTEXT_PREVIEW)
            .map(|chunk| ContextPreview {
                text: chunk.text.clone(),
                score: chunk.score,
                metadata: serde_json::json!({}),
            })
            .collect();

        Ok(TestReply {
            question: params.question,
            answer: outcome.text,
            context_chunks_found: contexts.len(),
            model_used: params.model_id,
            provider,
            context,
        })
    }

    fn resolve_retrieval(
        &self,
        params: &ChatParams,
        dataset_ids: &[String],
    ) -> Result<Option<(EmbeddingModel, VectorStore)>, ChatError> {
        if dataset_ids.is_empty() {
            return Ok(None);
        }
        let (Some(model_tag), Some(store_tag)) =
            (params.embedding_model.as_deref(), params.vector_store.as_deref())
        else {
            return Ok(None);
        };
        if model_tag.trim().is_empty() || store_tag.trim().is_empty() {
            return Ok(None);
        }

        let model = EmbeddingModel::parse(model_tag)?;
        let store = VectorStore::parse(store_tag)?;
        Ok(Some((model, store)))
    }

    pub(crate) async fn retrieve_context(
        &self,
        model: EmbeddingModel,
        store: VectorStore,
        params: &ChatParams,
        dataset_ids: &[String],
    ) -> Result<Vec<RetrievedContext>, ChatError> {
        let vectors = self
            .embeddings
            .generate(
                model,
                std::slice::from_ref(&params.question),
                params.embedding_dimension,
            )
            .await?;
        let Some(question_vector) = vectors.into_iter().next() else {
            return Ok(Vec::new());
        };

        let top_k = params.top_k.unwrap_or(DEFAULT_TOP_K).max(1) as usize;
        let hits = self
            .vectors
            .query(
                store,
                &question_vector,
                model,
                top_k,
                params.pinecone.as_ref(),
                dataset_ids,
            )
            .await?;
        Ok(hits)
    }
}
