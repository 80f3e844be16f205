//! Managed serverless index backend (Pinecone REST API).
//!
//! The control plane resolves an index's host and declared dimension; data
//! plane calls go straight to that host. Upserts run in batches of 100 and
//! split recursively when the upstream rejects a batch as too large. The
//! index must pre-exist; this backend never creates one.

use super::{
    truncate_chunk_text, vector_id, VectorBackend, VectorStoreError,
};
use crate::providers::ai::embedding::EmbeddingModel;
use crate::types::{DatasetPayload, RetrievedContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub(super) const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const UPSERT_BATCH_SIZE: usize = 100;

/// Shared per-API-key client.
#[derive(Debug)]
pub struct PineconeClient {
    http: reqwest::Client,
    api_key: String,
    control_url: String,
}

/// Index description from the control plane.
#[derive(Deserialize, Debug, Clone)]
pub struct IndexDescription {
    pub host: String,
    pub dimension: usize,
}

impl PineconeClient {
    pub fn new(api_key: &str, control_url: &str) -> Result<Self, VectorStoreError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(VectorStoreError::EmptyApiKey);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            control_url: control_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolves an index's host and declared dimension. A missing index is
    /// a distinct failure; the backend never creates indexes.
    pub async fn describe_index(
        &self,
        index_name: &str,
    ) -> Result<IndexDescription, VectorStoreError> {
        let url = format!("{}/indexes/{index_name}", self.control_url);
        let response = self
            .http
            .get(&url)
            .header("Api-Key", &self.api_key)
            .send()
            .await
            .map_err(VectorStoreError::Request)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(VectorStoreError::IndexNotFound(index_name.to_string()));
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::Upstream(format!(
                "Pinecone describe index failed: {body}"
            )));
        }

        response.json::<IndexDescription>().await.map_err(|e| {
            VectorStoreError::Upstream(format!(
                "Pinecone describe index returned an unexpected body: {e}"
            ))
        })
    }
}

#[derive(Serialize, Debug, Clone)]
struct PineconeVector {
    id: String,
    values: Vec<f32>,
    metadata: Value,
}

#[derive(Deserialize, Debug)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize, Debug)]
struct QueryMatch {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

/// One configured index within a client.
pub struct PineconeIndexHandle {
    client: Arc<PineconeClient>,
    index_name: String,
    namespace: Option<String>,
}

impl PineconeIndexHandle {
    pub fn new(client: Arc<PineconeClient>, index_name: String, namespace: Option<String>) -> Self {
        Self {
            client,
            index_name,
            namespace,
        }
    }

    fn data_url(&self, host: &str, path: &str) -> String {
        // Control-plane hosts come back without a scheme.
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}{path}")
        } else {
            format!("https://{host}{path}")
        }
    }

    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    async fn send_batch(
        &self,
        host: &str,
        batch: &[PineconeVector],
    ) -> Result<(), VectorStoreError> {
        let mut body = json!({ "vectors": batch });
        if let Some(namespace) = self.namespace() {
            body["namespace"] = json!(namespace);
        }

        let response = self
            .client
            .http
            .post(self.data_url(host, "/vectors/upsert"))
            .header("Api-Key", &self.client.api_key)
            .json(&body)
            .send()
            .await
            .map_err(VectorStoreError::Request)?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::Upstream(format!(
                "Pinecone upsert failed: {body}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorBackend for PineconeIndexHandle {
    async fn upsert(
        &self,
        dataset: &DatasetPayload,
        embeddings: &[Vec<f32>],
        model: EmbeddingModel,
    ) -> Result<usize, VectorStoreError> {
        let description = self.client.describe_index(&self.index_name).await?;

        let vectors: Vec<PineconeVector> = dataset
            .chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| PineconeVector {
                id: vector_id(&dataset.id, chunk.order),
                values: embedding.clone(),
                metadata: json!({
                    "dataset_id": dataset.id,
                    "dataset_label": dataset.label,
                    "dataset_type": dataset.dataset_type.as_str(),
                    "chunk_order": chunk.order,
                    "embedding_model": model.as_str(),
                    "chunk_text": truncate_chunk_text(&chunk.text),
                }),
            })
            .collect();

        // Never write a single vector whose length disagrees with the
        // index's declared dimension.
        if let Some(first) = vectors.first() {
            if description.dimension != first.values.len() {
                return Err(VectorStoreError::DimensionMismatch {
                    index: self.index_name.clone(),
                    expected: description.dimension,
                    actual: first.values.len(),
                });
            }
        }

        info!(
            index = %self.index_name,
            namespace = self.namespace().unwrap_or(""),
            dataset = %dataset.id,
            count = vectors.len(),
            "upserting vectors into Pinecone"
        );

        let total = vectors.len();
        let mut pending: Vec<Vec<PineconeVector>> = vectors
            .chunks(UPSERT_BATCH_SIZE)
            .map(|batch| batch.to_vec())
            .collect();
        pending.reverse();

        while let Some(batch) = pending.pop() {
            match self.send_batch(&description.host, &batch).await {
                Ok(()) => {}
                Err(VectorStoreError::Upstream(message))
                    if message.to_lowercase().contains("message length too large")
                        && batch.len() > 1 =>
                {
                    warn!(
                        current_size = batch.len(),
                        index = %self.index_name,
                        "Pinecone batch too large, splitting"
                    );
                    let mid = batch.len() / 2;
                    let (left, right) = batch.split_at(mid);
                    pending.push(right.to_vec());
                    pending.push(left.to_vec());
                }
                Err(error) => return Err(error),
            }
        }

        Ok(total)
    }

    async fn query(
        &self,
        vector: &[f32],
        _model: EmbeddingModel,
        top_k: usize,
        dataset_ids: &[String],
    ) -> Result<Vec<RetrievedContext>, VectorStoreError> {
        let description = self.client.describe_index(&self.index_name).await?;

        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });
        if let Some(namespace) = self.namespace() {
            body["namespace"] = json!(namespace);
        }
        let filters: Vec<String> = dataset_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if !filters.is_empty() {
            body["filter"] = json!({ "dataset_id": { "$in": filters } });
        }

        let response = self
            .client
            .http
            .post(self.data_url(&description.host, "/query"))
            .header("Api-Key", &self.client.api_key)
            .json(&body)
            .send()
            .await
            .map_err(VectorStoreError::Request)?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::Upstream(format!(
                "Pinecone query failed: {body}"
            )));
        }

        let parsed: QueryResponse = response.json().await.map_err(|e| {
            VectorStoreError::Upstream(format!("Pinecone query returned an unexpected body: {e}"))
        })?;

        let results = parsed
            .matches
            .into_iter()
            .map(|entry| {
                let metadata: HashMap<String, Value> =
                    entry.metadata.unwrap_or_default().into_iter().collect();
                let text = metadata
                    .get("chunk_text")
                    .or_else(|| metadata.get("chunkText"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                RetrievedContext {
                    text,
                    score: entry.score,
                    metadata,
                }
            })
            .collect();

        Ok(results)
    }
}
