//! Dataset upload: load + chunk only, returning the generated chunks.

use crate::errors::AppError;
use crate::state::AppState;
use axum::{extract::State, Json};
use krira::ingest::ChunkingOptions;
use krira::types::{Chunk, DatasetType};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct UploadDatasetRequest {
    pub dataset_type: String,
    #[serde(default)]
    pub chunk_size: Option<u32>,
    #[serde(default)]
    pub chunk_overlap: Option<u32>,
    /// Path relative to the uploads directory.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Inline base64 file content; materialized to a temporary file.
    #[serde(default)]
    pub file_content: Option<String>,
    #[serde(default)]
    pub urls: Option<Vec<String>>,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DatasetChunksResponse {
    pub dataset_type: String,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub total_chunks: usize,
    pub chunks: Vec<Chunk>,
}

pub async fn upload_dataset(
    State(state): State<AppState>,
    Json(payload): Json<UploadDatasetRequest>,
) -> Result<Json<DatasetChunksResponse>, AppError> {
    info!(
        dataset_type = %payload.dataset_type,
        chunk_size = payload.chunk_size,
        file_name = payload.file_name.as_deref().unwrap_or(""),
        "received upload dataset request"
    );

    let options = ChunkingOptions::new(
        payload.chunk_size.unwrap_or(ChunkingOptions::DEFAULT_CHUNK_SIZE),
        payload
            .chunk_overlap
            .unwrap_or(ChunkingOptions::DEFAULT_CHUNK_OVERLAP),
    )?;

    // Inline content is written to a temporary file under the uploads root
    // and removed again when the guard drops.
    let mut temp_guard = None;
    let file_path = match (&payload.file_content, &payload.file_path) {
        (Some(content), None) => {
            let extension = DatasetType::parse(&payload.dataset_type)
                .map(|t| t.file_extension())
                .unwrap_or("");
            let temp = state.loader.materialize_base64(content, extension)?;
            let path = temp.display().to_string();
            temp_guard = Some(temp);
            Some(path)
        }
        _ => payload.file_path.clone(),
    };

    let chunks = state
        .loader
        .load_and_chunk(
            &payload.dataset_type,
            &options,
            file_path.as_deref(),
            payload.urls.as_deref(),
        )
        .await?;
    drop(temp_guard);

    Ok(Json(DatasetChunksResponse {
        dataset_type: payload.dataset_type,
        chunk_size: options.chunk_size,
        chunk_overlap: options.chunk_overlap,
        total_chunks: chunks.len(),
        chunks,
    }))
}
