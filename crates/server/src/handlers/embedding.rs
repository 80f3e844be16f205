//! Embedding pipeline route: embed pre-chunked datasets and persist them.

use crate::errors::AppError;
use crate::state::AppState;
use axum::{extract::State, Json};
use krira::ingest::embedding::{EmbedDatasetsRequest, EmbedDatasetsResponse};
use krira::providers::vector::VectorStore;

pub async fn embed_datasets(
    State(state): State<AppState>,
    Json(payload): Json<EmbedDatasetsRequest>,
) -> Result<Json<EmbedDatasetsResponse>, AppError> {
    if payload.vector_store == VectorStore::Pinecone && payload.pinecone.is_none() {
        return Err(AppError::Validation(
            "Pinecone configuration is required when vector_store is 'pinecone'".to_string(),
        ));
    }

    Ok(Json(state.engine.embed_datasets(payload).await))
}
