//! Vector store adapters.
//!
//! Two backend kinds are supported: a managed serverless index (scoped by
//! namespace and metadata filter) and a local persistent store with one
//! collection per embedding model. Both satisfy the [`VectorBackend`]
//! contract; the [`VectorStoreService`] routes calls and caches clients.

pub mod local;
pub mod pinecone;

use crate::providers::ai::embedding::EmbeddingModel;
use crate::types::{DatasetPayload, PineconeConfig, RetrievedContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};

use local::LocalStore;
use pinecone::{PineconeClient, PineconeIndexHandle};

/// Bounds applied to every similarity query.
const TOP_K_MIN: usize = 1;
const TOP_K_MAX: usize = 200;

/// Metadata `chunk_text` is truncated to this many characters on upsert.
pub(crate) const CHUNK_TEXT_LIMIT: usize = 4096;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Unsupported vector store '{0}'")]
    UnsupportedStore(String),
    #[error("Pinecone configuration missing")]
    MissingPineconeConfig,
    #[error("Pinecone API key cannot be empty")]
    EmptyApiKey,
    #[error("Pinecone index '{0}' does not exist")]
    IndexNotFound(String),
    #[error("Pinecone index '{index}' dimension {expected} does not match embedding dimension {actual}")]
    DimensionMismatch {
        index: String,
        expected: usize,
        actual: usize,
    },
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("Vector store request failed: {0}")]
    Request(reqwest::Error),
    #[error("{0}")]
    Upstream(String),
    #[error("Local vector store error: {0}")]
    Database(#[from] turso::Error),
}

/// The closed set of vector store backends. The local store accepts the
/// legacy wire tag `chroma` for pipelines configured before the rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStore {
    Pinecone,
    #[serde(alias = "chroma")]
    Local,
}

impl VectorStore {
    pub fn parse(tag: &str) -> Result<Self, VectorStoreError> {
        match tag.trim().to_lowercase().as_str() {
            "pinecone" => Ok(VectorStore::Pinecone),
            "local" | "chroma" => Ok(VectorStore::Local),
            other => Err(VectorStoreError::UnsupportedStore(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VectorStore::Pinecone => "pinecone",
            VectorStore::Local => "local",
        }
    }
}

/// Contract shared by every backend.
///
/// `upsert` writes one vector per chunk with deterministic ids derived from
/// `(dataset_id, chunk_order)` and returns the number written. `query`
/// returns hits in the backend's own ranking order; callers must treat the
/// score as opaque.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn upsert(
        &self,
        dataset: &DatasetPayload,
        embeddings: &[Vec<f32>],
        model: EmbeddingModel,
    ) -> Result<usize, VectorStoreError>;

    async fn query(
        &self,
        vector: &[f32],
        model: EmbeddingModel,
        top_k: usize,
        dataset_ids: &[String],
    ) -> Result<Vec<RetrievedContext>, VectorStoreError>;
}

/// Routes upserts and queries to the configured backend.
///
/// Provider clients are process-wide singletons initialized lazily: one
/// Pinecone client per API key and a single local database, each guarded so
/// initialization happens once.
pub struct VectorStoreService {
    local_dir: PathBuf,
    local: OnceCell<Arc<LocalStore>>,
    pinecone_control_url: String,
    pinecone_clients: Mutex<HashMap<String, Arc<PineconeClient>>>,
}

impl VectorStoreService {
    pub fn new(local_dir: impl Into<PathBuf>, pinecone_control_url: Option<String>) -> Self {
        Self {
            local_dir: local_dir.into(),
            local: OnceCell::new(),
            pinecone_control_url: pinecone_control_url
                .unwrap_or_else(|| pinecone::CONTROL_PLANE_URL.to_string()),
            pinecone_clients: Mutex::new(HashMap::new()),
        }
    }

    /// Persists embeddings and returns the number of vectors stored.
    pub async fn upsert(
        &self,
        store: VectorStore,
        dataset: &DatasetPayload,
        embeddings: &[Vec<f32>],
        model: EmbeddingModel,
        pinecone: Option<&PineconeConfig>,
    ) -> Result<usize, VectorStoreError> {
        if embeddings.is_empty() {
            return Ok(0);
        }

        match store {
            VectorStore::Pinecone => {
                let config = pinecone.ok_or(VectorStoreError::MissingPineconeConfig)?;
                let handle = self.pinecone_handle(config).await?;
                handle.upsert(dataset, embeddings, model).await
            }
            VectorStore::Local => {
                let store = self.local_store().await?;
                store.upsert(dataset, embeddings, model).await
            }
        }
    }

    /// Retrieves the most relevant chunks for the given query vector.
    ///
    /// `top_k` is clamped to `[1, 200]`; a non-empty `dataset_ids` restricts
    /// hits to those datasets.
    pub async fn query(
        &self,
        store: VectorStore,
        query_vector: &[f32],
        model: EmbeddingModel,
        top_k: usize,
        pinecone: Option<&PineconeConfig>,
        dataset_ids: &[String],
    ) -> Result<Vec<RetrievedContext>, VectorStoreError> {
        if query_vector.is_empty() {
            return Ok(Vec::new());
        }
        let limit = top_k.clamp(TOP_K_MIN, TOP_K_MAX);

        match store {
            VectorStore::Pinecone => {
                let config = pinecone.ok_or(VectorStoreError::MissingPineconeConfig)?;
                let handle = self.pinecone_handle(config).await?;
                handle.query(query_vector, model, limit, dataset_ids).await
            }
            VectorStore::Local => {
                let store = self.local_store().await?;
                store.query(query_vector, model, limit, dataset_ids).await
            }
        }
    }

    async fn pinecone_handle(
        &self,
        config: &PineconeConfig,
    ) -> Result<PineconeIndexHandle, VectorStoreError> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(VectorStoreError::EmptyApiKey);
        }

        let client = {
            let mut clients = self.pinecone_clients.lock().await;
            match clients.get(api_key) {
                Some(client) => Arc::clone(client),
                None => {
                    let client = Arc::new(PineconeClient::new(
                        api_key,
                        &self.pinecone_control_url,
                    )?);
                    clients.insert(api_key.to_string(), Arc::clone(&client));
                    client
                }
            }
        };

        Ok(PineconeIndexHandle::new(
            client,
            config.index_name.clone(),
            config.namespace.clone(),
        ))
    }

    async fn local_store(&self) -> Result<Arc<LocalStore>, VectorStoreError> {
        self.local
            .get_or_try_init(|| async {
                LocalStore::open(&self.local_dir).await.map(Arc::new)
            })
            .await
            .cloned()
    }
}

/// Deterministic vector id for a chunk.
pub(crate) fn vector_id(dataset_id: &str, chunk_order: u32) -> String {
    format!("{dataset_id}::{chunk_order}")
}

/// Truncates chunk text to the metadata limit on a character boundary.
pub(crate) fn truncate_chunk_text(text: &str) -> String {
    text.chars().take(CHUNK_TEXT_LIMIT).collect()
}
