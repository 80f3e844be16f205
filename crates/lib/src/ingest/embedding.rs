//! Ingestion orchestration: embed pre-chunked datasets and persist them.
//!
//! Datasets are processed independently; a failure is recorded against its
//! dataset and never aborts the siblings.

use crate::engine::RagEngine;
use crate::providers::ai::embedding::{EmbeddingError, EmbeddingModel};
use crate::providers::vector::VectorStore;
use crate::types::{DatasetPayload, PineconeConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Request body for the embedding pipeline.
#[derive(Debug, Deserialize)]
pub struct EmbedDatasetsRequest {
    pub embedding_model: EmbeddingModel,
    pub vector_store: VectorStore,
    pub datasets: Vec<DatasetPayload>,
    #[serde(default)]
    pub pinecone: Option<PineconeConfig>,
}

/// Summary of a successfully embedded dataset.
#[derive(Debug, Serialize)]
pub struct EmbeddedDatasetSummary {
    pub dataset_id: String,
    pub label: String,
    pub vector_store: VectorStore,
    pub embedding_model: EmbeddingModel,
    pub chunks_processed: usize,
    pub chunks_embedded: usize,
}

/// A dataset that failed to embed, with the failure message.
#[derive(Debug, Serialize)]
pub struct DatasetEmbeddingFailure {
    pub dataset_id: String,
    pub label: String,
    pub message: String,
}

/// Response of the embedding pipeline: both lists are always present.
#[derive(Debug, Default, Serialize)]
pub struct EmbedDatasetsResponse {
    pub results: Vec<EmbeddedDatasetSummary>,
    pub errors: Vec<DatasetEmbeddingFailure>,
}

impl RagEngine {
    /// Embeds and upserts every dataset in the request, isolating failures
    /// per dataset.
    pub async fn embed_datasets(&self, request: EmbedDatasetsRequest) -> EmbedDatasetsResponse {
        let mut response = EmbedDatasetsResponse::default();

        for dataset in &request.datasets {
            match self
                .embed_single_dataset(
                    dataset,
                    request.embedding_model,
                    request.vector_store,
                    request.pinecone.as_ref(),
                )
                .await
            {
                Ok(chunks_embedded) => response.results.push(EmbeddedDatasetSummary {
                    dataset_id: dataset.id.clone(),
                    label: dataset.label.clone(),
                    vector_store: request.vector_store,
                    embedding_model: request.embedding_model,
                    chunks_processed: dataset.chunks.len(),
                    chunks_embedded,
                }),
                Err(message) => {
                    warn!(
                        dataset = %dataset.id,
                        vector_store = request.vector_store.as_str(),
                        embedding_model = request.embedding_model.as_str(),
                        %message,
                        "embedding pipeline error"
                    );
                    response.errors.push(DatasetEmbeddingFailure {
                        dataset_id: dataset.id.clone(),
                        label: dataset.label.clone(),
                        message,
                    });
                }
            }
        }

        response
    }

    async fn embed_single_dataset(
        &self,
        dataset: &DatasetPayload,
        model: EmbeddingModel,
        store: VectorStore,
        pinecone: Option<&PineconeConfig>,
    ) -> Result<usize, String> {
        let valid_chunks: Vec<_> = dataset
            .chunks
            .iter()
            .filter(|chunk| !chunk.text.trim().is_empty())
            .cloned()
            .collect();
        if valid_chunks.is_empty() {
            return Err("Dataset does not contain any non-empty chunks".to_string());
        }

        let texts: Vec<String> = valid_chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let trimmed_dataset = DatasetPayload {
            chunks: valid_chunks,
            ..dataset.clone()
        };

        let embeddings = self
            .embeddings
            .generate(model, &texts, None)
            .await
            .map_err(|error| error.to_string())?;
        if embeddings.len() != trimmed_dataset.chunks.len() {
            return Err(EmbeddingError::CountMismatch.to_string());
        }

        self.vectors
            .upsert(store, &trimmed_dataset, &embeddings, model, pinecone)
            .await
            .map_err(|error| error.to_string())
    }
}
