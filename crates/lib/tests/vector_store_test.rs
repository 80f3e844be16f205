//! Vector store adapter tests: the managed backend against a mock REST
//! upstream (dimension check, adaptive batch splitting, filtered queries)
//! and the local store end to end.

use httpmock::prelude::*;
use krira::providers::ai::embedding::EmbeddingModel;
use krira::providers::vector::{VectorStore, VectorStoreError, VectorStoreService};
use krira::types::{Chunk, DatasetPayload, DatasetType, PineconeConfig};
use serde_json::json;

fn dataset(id: &str, chunk_count: usize) -> (DatasetPayload, Vec<Vec<f32>>) {
    let chunks: Vec<Chunk> = (0..chunk_count)
        .map(|order| Chunk {
            order: order as u32,
            text: format!("chunk {order} of {id}"),
        })
        .collect();
    let embeddings: Vec<Vec<f32>> = (0..chunk_count)
        .map(|order| vec![order as f32, 1.0, 0.0, 0.5])
        .collect();
    (
        DatasetPayload {
            id: id.to_string(),
            label: format!("{id} label"),
            dataset_type: DatasetType::Csv,
            chunk_size: 1000,
            chunk_overlap: 200,
            chunks,
        },
        embeddings,
    )
}

fn pinecone_config(index: &str) -> PineconeConfig {
    PineconeConfig {
        api_key: "pc-test-key".to_string(),
        index_name: index.to_string(),
        namespace: None,
    }
}

fn service_for(server: &MockServer) -> (tempfile::TempDir, VectorStoreService) {
    let dir = tempfile::tempdir().unwrap();
    let service = VectorStoreService::new(dir.path(), Some(server.base_url()));
    (dir, service)
}

#[tokio::test]
async fn managed_upsert_writes_metadata_with_chunk_text() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/indexes/people-index");
        then.status(200)
            .json_body(json!({ "host": server.base_url(), "dimension": 4 }));
    });
    let upsert_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/vectors/upsert")
            .body_contains("people::0")
            .body_contains("chunk 0 of people");
        then.status(200).json_body(json!({ "upsertedCount": 2 }));
    });

    let (_dir, service) = service_for(&server);
    let (dataset, embeddings) = dataset("people", 2);
    let written = service
        .upsert(
            VectorStore::Pinecone,
            &dataset,
            &embeddings,
            EmbeddingModel::OpenaiSmall,
            Some(&pinecone_config("people-index")),
        )
        .await
        .unwrap();

    assert_eq!(written, 2);
    upsert_mock.assert();
}

#[tokio::test]
async fn managed_upsert_rejects_dimension_mismatch_before_writing() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/indexes/wide-index");
        then.status(200)
            .json_body(json!({ "host": server.base_url(), "dimension": 3072 }));
    });
    let upsert_mock = server.mock(|when, then| {
        when.method(POST).path("/vectors/upsert");
        then.status(200).json_body(json!({}));
    });

    let (_dir, service) = service_for(&server);
    let (dataset, embeddings) = dataset("people", 3);
    let err = service
        .upsert(
            VectorStore::Pinecone,
            &dataset,
            &embeddings,
            EmbeddingModel::OpenaiSmall,
            Some(&pinecone_config("wide-index")),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
    upsert_mock.assert_hits(0);
}

#[tokio::test]
async fn managed_upsert_splits_oversized_batches_recursively() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/indexes/big-index");
        then.status(200)
            .json_body(json!({ "host": server.base_url(), "dimension": 4 }));
    });
    // Full batches of 100 are rejected as too large; anything smaller
    // succeeds. 250 vectors therefore need 100 -> 50+50 twice, plus the
    // trailing 50.
    let too_large_mock = server.mock(|when, then| {
        when.method(POST).path("/vectors/upsert").matches(|req| {
            let body = req.body.as_deref().unwrap_or_default();
            serde_json::from_slice::<serde_json::Value>(body)
                .ok()
                .and_then(|value| value["vectors"].as_array().map(|v| v.len()))
                .map(|count| count >= 100)
                .unwrap_or(false)
        });
        then.status(400).body("message length too large");
    });
    let accepted_mock = server.mock(|when, then| {
        when.method(POST).path("/vectors/upsert").matches(|req| {
            let body = req.body.as_deref().unwrap_or_default();
            serde_json::from_slice::<serde_json::Value>(body)
                .ok()
                .and_then(|value| value["vectors"].as_array().map(|v| v.len()))
                .map(|count| count < 100)
                .unwrap_or(false)
        });
        then.status(200).json_body(json!({}));
    });

    let (_dir, service) = service_for(&server);
    let (dataset, embeddings) = dataset("big", 250);
    let written = service
        .upsert(
            VectorStore::Pinecone,
            &dataset,
            &embeddings,
            EmbeddingModel::OpenaiSmall,
            Some(&pinecone_config("big-index")),
        )
        .await
        .unwrap();

    assert_eq!(written, 250);
    too_large_mock.assert_hits(2);
    accepted_mock.assert_hits(5);
}

#[tokio::test]
async fn managed_upsert_fails_closed_when_index_is_missing() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/indexes/ghost-index");
        then.status(404).json_body(json!({ "error": "not found" }));
    });

    let (_dir, service) = service_for(&server);
    let (dataset, embeddings) = dataset("ghost", 1);
    let err = service
        .upsert(
            VectorStore::Pinecone,
            &dataset,
            &embeddings,
            EmbeddingModel::OpenaiSmall,
            Some(&pinecone_config("ghost-index")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VectorStoreError::IndexNotFound(_)));
}

#[tokio::test]
async fn managed_query_applies_dataset_filter_and_namespace() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/indexes/query-index");
        then.status(200)
            .json_body(json!({ "host": server.base_url(), "dimension": 4 }));
    });
    let query_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/query")
            .body_contains("\"namespace\":\"tenant-a\"")
            .body_contains("ds-1");
        then.status(200).json_body(json!({
            "matches": [
                {"id": "ds-1::0", "score": 0.93, "metadata": {
                    "dataset_id": "ds-1", "dataset_label": "l", "dataset_type": "csv",
                    "chunk_order": 0, "embedding_model": "openai-small",
                    "chunk_text": "Row 1: name: Alice"
                }}
            ]
        }));
    });

    let (_dir, service) = service_for(&server);
    let config = PineconeConfig {
        namespace: Some("tenant-a".to_string()),
        ..pinecone_config("query-index")
    };
    let hits = service
        .query(
            VectorStore::Pinecone,
            &[0.1, 0.2, 0.3, 0.4],
            EmbeddingModel::OpenaiSmall,
            5,
            Some(&config),
            &["ds-1".to_string()],
        )
        .await
        .unwrap();

    query_mock.assert();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "Row 1: name: Alice");
    assert_eq!(hits[0].score, Some(0.93));
    assert_eq!(
        hits[0].metadata.get("dataset_id").and_then(|v| v.as_str()),
        Some("ds-1")
    );
}

#[tokio::test]
async fn missing_pinecone_config_is_rejected() {
    let server = MockServer::start();
    let (_dir, service) = service_for(&server);
    let (dataset, embeddings) = dataset("ds", 1);
    let err = service
        .upsert(
            VectorStore::Pinecone,
            &dataset,
            &embeddings,
            EmbeddingModel::OpenaiSmall,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VectorStoreError::MissingPineconeConfig));
}

#[tokio::test]
async fn local_store_round_trip_respects_dataset_filter() {
    let dir = tempfile::tempdir().unwrap();
    let service = VectorStoreService::new(dir.path(), None);

    let (first, first_vectors) = dataset("ds-1", 3);
    let (second, second_vectors) = dataset("ds-2", 3);
    service
        .upsert(
            VectorStore::Local,
            &first,
            &first_vectors,
            EmbeddingModel::OpenaiSmall,
            None,
        )
        .await
        .unwrap();
    service
        .upsert(
            VectorStore::Local,
            &second,
            &second_vectors,
            EmbeddingModel::OpenaiSmall,
            None,
        )
        .await
        .unwrap();

    let hits = service
        .query(
            VectorStore::Local,
            &[1.0, 1.0, 0.0, 0.5],
            EmbeddingModel::OpenaiSmall,
            10,
            None,
            &["ds-1".to_string()],
        )
        .await
        .unwrap();

    assert!(!hits.is_empty());
    for hit in &hits {
        assert_eq!(
            hit.metadata.get("dataset_id").and_then(|v| v.as_str()),
            Some("ds-1")
        );
    }
}

#[tokio::test]
async fn local_store_replaces_vectors_per_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let service = VectorStoreService::new(dir.path(), None);

    let (first, first_vectors) = dataset("ds-1", 4);
    service
        .upsert(
            VectorStore::Local,
            &first,
            &first_vectors,
            EmbeddingModel::OpenaiSmall,
            None,
        )
        .await
        .unwrap();

    // Re-upload with fewer chunks: the old records must be gone.
    let (replacement, replacement_vectors) = dataset("ds-1", 2);
    service
        .upsert(
            VectorStore::Local,
            &replacement,
            &replacement_vectors,
            EmbeddingModel::OpenaiSmall,
            None,
        )
        .await
        .unwrap();

    let hits = service
        .query(
            VectorStore::Local,
            &[0.0, 1.0, 0.0, 0.5],
            EmbeddingModel::OpenaiSmall,
            50,
            None,
            &["ds-1".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn top_k_is_clamped_to_at_least_one() {
    let dir = tempfile::tempdir().unwrap();
    let service = VectorStoreService::new(dir.path(), None);

    let (payload, vectors) = dataset("ds-1", 3);
    service
        .upsert(
            VectorStore::Local,
            &payload,
            &vectors,
            EmbeddingModel::OpenaiSmall,
            None,
        )
        .await
        .unwrap();

    // A zero top_k still retrieves one hit; an absurd one is capped.
    let minimal = service
        .query(
            VectorStore::Local,
            &[1.0, 1.0, 0.0, 0.5],
            EmbeddingModel::OpenaiSmall,
            0,
            None,
            &[],
        )
        .await
        .unwrap();
    assert_eq!(minimal.len(), 1);

    let capped = service
        .query(
            VectorStore::Local,
            &[1.0, 1.0, 0.0, 0.5],
            EmbeddingModel::OpenaiSmall,
            10_000,
            None,
            &[],
        )
        .await
        .unwrap();
    assert_eq!(capped.len(), 3);
}
