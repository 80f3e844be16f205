//! Shared data model: chunks, datasets, retrieval hits and the pipeline
//! configuration handed over by the key-verification service.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// A contiguous, ordered segment of dataset text ready for embedding.
///
/// Within a dataset, `order` values are unique and gap-free starting at 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub order: u32,
    pub text: String,
}

/// Origin of a dataset's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    Csv,
    Json,
    Website,
    Pdf,
}

impl DatasetType {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "csv" => Some(DatasetType::Csv),
            "json" => Some(DatasetType::Json),
            "website" => Some(DatasetType::Website),
            "pdf" => Some(DatasetType::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::Csv => "csv",
            DatasetType::Json => "json",
            DatasetType::Website => "website",
            DatasetType::Pdf => "pdf",
        }
    }

    /// File extension used when inline uploads are materialized to disk.
    /// Website datasets are never file-backed.
    pub fn file_extension(&self) -> &'static str {
        match self {
            DatasetType::Csv => ".csv",
            DatasetType::Json => ".json",
            DatasetType::Pdf => ".pdf",
            DatasetType::Website => "",
        }
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dataset with its chunks, as submitted to the embedding pipeline.
///
/// Identity is `id`: re-submitting a dataset with the same id replaces its
/// previously stored vectors on upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetPayload {
    pub id: String,
    pub label: String,
    pub dataset_type: DatasetType,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub chunks: Vec<Chunk>,
}

/// A chunk returned by a vector store similarity query.
///
/// `score` is backend-defined (similarity or distance); callers must treat
/// it as opaque and rely only on the returned ordering. `metadata` always
/// carries `dataset_id`, `dataset_label`, `dataset_type`, `chunk_order` and
/// `embedding_model`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievedContext {
    pub text: String,
    pub score: Option<f64>,
    pub metadata: HashMap<String, Value>,
}

/// Connection details for the managed vector index, supplied per pipeline.
/// Accepts both snake_case and camelCase keys on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeConfig {
    #[serde(alias = "apiKey")]
    pub api_key: String,
    #[serde(alias = "indexName")]
    pub index_name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// LLM half of a pipeline configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmPipelineConfig {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, alias = "systemPrompt")]
    pub system_prompt: Option<String>,
    #[serde(default, alias = "topK")]
    pub top_k: Option<i64>,
}

/// Embedding half of a pipeline configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingPipelineConfig {
    #[serde(default, alias = "vectorStore")]
    pub vector_store: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dimension: Option<u32>,
    #[serde(default, alias = "datasetIds")]
    pub dataset_ids: Vec<String>,
    #[serde(default, alias = "pineconeConfig")]
    pub pinecone_config: Option<PineconeConfig>,
}

/// The opaque operator-defined pipeline bundle resolved by the external
/// key-verification service. The service mixes camelCase and snake_case
/// keys, so every field tolerates both spellings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub llm: LlmPipelineConfig,
    #[serde(default)]
    pub embedding: EmbeddingPipelineConfig,
}
