//! LLM routes: model listing, configuration testing and batch evaluation.
//!
//! These internal routes speak the camelCase wire shapes of the operator
//! console.

use crate::errors::AppError;
use crate::state::AppState;
use axum::{extract::State, Json};
use krira::chat::{ChatParams, TestReply};
use krira::evaluation::{EvaluationParams, EvaluationReport};
use krira::providers::ai::catalog::ModelsResponse;
use krira::types::PineconeConfig;
use serde::Deserialize;

pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(state.engine.list_models())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestLlmRequest {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub embedding_dimension: Option<u32>,
    #[serde(default)]
    pub vector_store: Option<String>,
    #[serde(default)]
    pub dataset_ids: Vec<String>,
    #[serde(default)]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub pinecone: Option<PineconeConfig>,
    #[serde(default)]
    pub question: Option<String>,
}

pub async fn test_configuration(
    State(state): State<AppState>,
    Json(payload): Json<TestLlmRequest>,
) -> Result<Json<TestReply>, AppError> {
    let missing = [
        ("provider", payload.provider.as_deref()),
        ("modelId", payload.model_id.as_deref()),
        ("embeddingModel", payload.embedding_model.as_deref()),
        ("vectorStore", payload.vector_store.as_deref()),
        ("question", payload.question.as_deref()),
    ]
    .iter()
    .any(|(_, value)| value.map(str::trim).unwrap_or("").is_empty());
    if missing {
        return Err(AppError::Validation(
            "Missing required parameters: provider, modelId, embeddingModel, vectorStore, question"
                .to_string(),
        ));
    }

    let params = ChatParams {
        provider: payload.provider.unwrap_or_default(),
        model_id: payload.model_id.unwrap_or_default(),
        system_prompt: payload.system_prompt,
        vector_store: payload.vector_store,
        embedding_model: payload.embedding_model,
        embedding_dimension: payload.embedding_dimension,
        dataset_ids: payload.dataset_ids,
        top_k: payload.top_k,
        question: payload.question.unwrap_or_default(),
        pinecone: payload.pinecone,
    };

    let reply = state.engine.test_configuration(params).await?;
    Ok(Json(reply))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateLlmRequest {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub embedding_model: String,
    #[serde(default)]
    pub embedding_dimension: Option<u32>,
    #[serde(default)]
    pub vector_store: String,
    #[serde(default)]
    pub dataset_ids: Vec<String>,
    #[serde(default)]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub csv_path: Option<String>,
    #[serde(default)]
    pub csv_content: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub pinecone: Option<PineconeConfig>,
}

pub async fn evaluate_configuration(
    State(state): State<AppState>,
    Json(payload): Json<EvaluateLlmRequest>,
) -> Result<Json<EvaluationReport>, AppError> {
    let params = EvaluationParams {
        provider: payload.provider,
        model_id: payload.model_id,
        system_prompt: payload.system_prompt,
        embedding_model: payload.embedding_model,
        vector_store: payload.vector_store,
        dataset_ids: payload.dataset_ids,
        top_k: payload.top_k,
        embedding_dimension: payload.embedding_dimension,
        csv_path: payload.csv_path,
        csv_content: payload.csv_content,
        original_filename: payload.original_filename,
        pinecone: payload.pinecone,
    };

    let report = state.engine.evaluate_from_csv(params).await?;
    Ok(Json(report))
}
