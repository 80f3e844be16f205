//! Local persistent vector store backed by a libSQL database file.
//!
//! Each embedding model gets its own collection table named
//! `krira__<model>` (hyphens mapped to underscores). Embeddings are stored
//! as f32 BLOBs and ranked with `vector_distance_cos`. Re-upserting a
//! dataset replaces all of its previous records.

use super::{vector_id, VectorBackend, VectorStoreError};
use crate::providers::ai::embedding::EmbeddingModel;
use crate::types::{DatasetPayload, RetrievedContext};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;
use turso::{params, Connection, Database, Value as TursoValue};

const COLLECTION_PREFIX: &str = "krira__";
const DB_FILE_NAME: &str = "krira_vectors.db";

pub struct LocalStore {
    db: Database,
}

impl LocalStore {
    /// Opens (creating if needed) the store's database under `dir`.
    pub async fn open(dir: &Path) -> Result<Self, VectorStoreError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            VectorStoreError::Upstream(format!("Failed to create local vector directory: {e}"))
        })?;
        let path = dir.join(DB_FILE_NAME);
        let db = turso::Builder::new_local(&path.to_string_lossy())
            .build()
            .await?;

        // WAL keeps concurrent request handlers from serializing on writes.
        let conn = db.connect()?;
        conn.query("PRAGMA journal_mode=WAL;", ()).await?;

        Ok(Self { db })
    }

    fn collection_name(model: EmbeddingModel) -> String {
        format!("{COLLECTION_PREFIX}{}", model.as_str().replace('-', "_"))
    }

    async fn ensure_collection(
        &self,
        conn: &Connection,
        name: &str,
    ) -> Result<(), VectorStoreError> {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {name} (
                    id TEXT PRIMARY KEY,
                    dataset_id TEXT NOT NULL,
                    dataset_label TEXT NOT NULL,
                    dataset_type TEXT NOT NULL,
                    chunk_order INTEGER NOT NULL,
                    embedding_model TEXT NOT NULL,
                    chunk_text TEXT NOT NULL,
                    embedding BLOB
                )"
            ),
            (),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorBackend for LocalStore {
    async fn upsert(
        &self,
        dataset: &DatasetPayload,
        embeddings: &[Vec<f32>],
        model: EmbeddingModel,
    ) -> Result<usize, VectorStoreError> {
        let conn = self.db.connect()?;
        let collection = Self::collection_name(model);
        self.ensure_collection(&conn, &collection).await?;

        info!(
            collection = %collection,
            dataset = %dataset.id,
            count = embeddings.len(),
            "persisting vectors to local store"
        );

        // Replace-by-dataset: drop everything previously stored under this
        // dataset id before inserting the new records.
        conn.execute(
            &format!("DELETE FROM {collection} WHERE dataset_id = ?"),
            params![dataset.id.clone()],
        )
        .await?;

        let mut written = 0usize;
        for (chunk, embedding) in dataset.chunks.iter().zip(embeddings) {
            // Zero-copy reinterpretation of the f32 slice for BLOB storage;
            // relies on f32 being 4 bytes.
            let vector_bytes: &[u8] = unsafe {
                std::slice::from_raw_parts(embedding.as_ptr() as *const u8, embedding.len() * 4)
            };
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {collection}
                     (id, dataset_id, dataset_label, dataset_type, chunk_order, embedding_model, chunk_text, embedding)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    vector_id(&dataset.id, chunk.order),
                    dataset.id.clone(),
                    dataset.label.clone(),
                    dataset.dataset_type.as_str(),
                    chunk.order as i64,
                    model.as_str(),
                    chunk.text.clone(),
                    vector_bytes
                ],
            )
            .await?;
            written += 1;
        }

        Ok(written)
    }

    async fn query(
        &self,
        vector: &[f32],
        model: EmbeddingModel,
        top_k: usize,
        dataset_ids: &[String],
    ) -> Result<Vec<RetrievedContext>, VectorStoreError> {
        let conn = self.db.connect()?;
        let collection = Self::collection_name(model);
        self.ensure_collection(&conn, &collection).await?;

        // Vector functions expect the query vector as a literal.
        let vector_str = format!(
            "vector32('[{}]')",
            vector
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut conditions = vec!["embedding IS NOT NULL".to_string()];
        let mut query_params: Vec<TursoValue> = Vec::new();

        let filters: Vec<String> = dataset_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if !filters.is_empty() {
            let placeholders = filters.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            conditions.push(format!("dataset_id IN ({placeholders})"));
            for id in filters {
                query_params.push(id.into());
            }
        }

        let sql = format!(
            "SELECT chunk_text, dataset_id, dataset_label, dataset_type, chunk_order, embedding_model,
                    vector_distance_cos(embedding, {vector_str}) AS distance
             FROM {collection}
             WHERE {}
             ORDER BY distance ASC
             LIMIT {top_k};",
            conditions.join(" AND ")
        );

        let mut rows = if query_params.is_empty() {
            conn.query(&sql, ()).await?
        } else {
            conn.query(&sql, query_params).await?
        };

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            let text = match row.get_value(0)? {
                TursoValue::Text(s) => s,
                _ => String::new(),
            };
            let dataset_id = match row.get_value(1)? {
                TursoValue::Text(s) => s,
                _ => String::new(),
            };
            let dataset_label = match row.get_value(2)? {
                TursoValue::Text(s) => s,
                _ => String::new(),
            };
            let dataset_type = match row.get_value(3)? {
                TursoValue::Text(s) => s,
                _ => String::new(),
            };
            let chunk_order = match row.get_value(4)? {
                TursoValue::Integer(i) => i,
                _ => 0,
            };
            let embedding_model = match row.get_value(5)? {
                TursoValue::Text(s) => s,
                _ => String::new(),
            };
            let distance = match row.get_value(6)? {
                TursoValue::Real(f) => Some(f),
                TursoValue::Integer(i) => Some(i as f64),
                _ => None,
            };

            let mut metadata: HashMap<String, Value> = HashMap::new();
            metadata.insert("dataset_id".to_string(), Value::String(dataset_id));
            metadata.insert("dataset_label".to_string(), Value::String(dataset_label));
            metadata.insert("dataset_type".to_string(), Value::String(dataset_type));
            metadata.insert("chunk_order".to_string(), Value::from(chunk_order));
            metadata.insert(
                "embedding_model".to_string(),
                Value::String(embedding_model),
            );

            results.push(RetrievedContext {
                text,
                score: distance,
                metadata,
            });
        }

        Ok(results)
    }
}
