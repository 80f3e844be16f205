//! Public chat route, authenticated against the key-verification service.

use crate::auth::extract_bearer_token;
use crate::errors::AppError;
use crate::state::AppState;
use axum::{extract::State, http::HeaderMap, Json};
use krira::chat::{ChatParams, DEFAULT_TOP_K};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const MAX_CONVERSATION_ID_LENGTH: usize = 64;
const MIN_PIPELINE_NAME_LENGTH: usize = 4;

#[derive(Debug, Deserialize)]
pub struct ChatApiRequest {
    pub pipeline_name: String,
    pub query: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ChatApiResponse {
    pub pipeline_name: String,
    pub answer: String,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_snippets: Option<Vec<String>>,
}

pub async fn chat_with_pipeline(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ChatApiRequest>,
) -> Result<Json<ChatApiResponse>, AppError> {
    if payload.pipeline_name.trim().len() < MIN_PIPELINE_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "pipeline_name must be at least {MIN_PIPELINE_NAME_LENGTH} characters"
        )));
    }
    if payload.query.trim().is_empty() {
        return Err(AppError::Validation("query must not be empty".to_string()));
    }
    if let Some(conversation_id) = &payload.conversation_id {
        if conversation_id.len() > MAX_CONVERSATION_ID_LENGTH {
            return Err(AppError::Validation(format!(
                "conversation_id must be at most {MAX_CONVERSATION_ID_LENGTH} characters"
            )));
        }
    }

    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let api_key = extract_bearer_token(authorization)?.to_string();

    let pipeline = state
        .verifier
        .verify(&api_key, &payload.pipeline_name)
        .await?;

    if pipeline.llm.provider.is_none() && pipeline.llm.model.is_none() {
        return Err(AppError::Validation(
            "Pipeline is not configured with an LLM".to_string(),
        ));
    }

    info!(pipeline = %payload.pipeline_name, "public chat request verified");

    let params = ChatParams {
        provider: pipeline.llm.provider.unwrap_or_default(),
        model_id: pipeline.llm.model.unwrap_or_default(),
        system_prompt: pipeline.llm.system_prompt,
        vector_store: pipeline.embedding.vector_store,
        embedding_model: pipeline.embedding.model,
        embedding_dimension: pipeline.embedding.dimension,
        dataset_ids: pipeline.embedding.dataset_ids,
        top_k: pipeline.llm.top_k.or(Some(DEFAULT_TOP_K)),
        question: payload.query,
        pinecone: pipeline.embedding.pinecone_config,
    };

    let reply = state.engine.chat(params).await?;

    // Best-effort usage tracking; only an exceeded limit surfaces.
    state
        .verifier
        .track_usage(&api_key, &payload.pipeline_name, reply.usage.total_tokens)
        .await?;

    Ok(Json(ChatApiResponse {
        pipeline_name: payload.pipeline_name,
        answer: reply.answer,
        latency_ms: reply.latency_ms,
        conversation_id: payload.conversation_id,
        context_snippets: Some(reply.context_snippets),
    }))
}
