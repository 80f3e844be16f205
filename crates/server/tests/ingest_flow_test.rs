//! Ingestion round-trip: upload + chunk, then embed + upsert into the
//! managed backend, with per-dataset error isolation.

mod common;

use anyhow::Result;
use base64::Engine as _;
use common::TestApp;
use httpmock::prelude::*;
use serde_json::{json, Value};

#[tokio::test]
async fn csv_upload_then_embed_writes_row_chunks_to_the_index() -> Result<()> {
    let app = TestApp::spawn().await?;

    // 1. Upload and chunk the CSV.
    let content =
        base64::engine::general_purpose::STANDARD.encode("name,role\nAlice,Engineer\nBob,Analyst\n");
    let upload: Value = app
        .client
        .post(format!("{}/uploaddataset", app.address))
        .json(&json!({ "dataset_type": "csv", "file_content": content }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(upload["total_chunks"], 2);

    // 2. Mock the embedding provider and the managed index.
    app.mock_server.mock(|when, then| {
        when.method(POST).path("/embeddings");
        then.status(200).json_body(json!({
            "data": [
                { "embedding": [0.1, 0.2, 0.3, 0.4] },
                { "embedding": [0.5, 0.6, 0.7, 0.8] }
            ]
        }));
    });
    app.mock_server.mock(|when, then| {
        when.method(GET).path("/indexes/people-index");
        then.status(200)
            .json_body(json!({ "host": app.mock_server.base_url(), "dimension": 4 }));
    });
    let upsert_mock = app.mock_server.mock(|when, then| {
        when.method(POST)
            .path("/vectors/upsert")
            .body_contains("people-ds::0")
            .body_contains("Row 1: name: Alice; role: Engineer")
            .body_contains("Row 2: name: Bob; role: Analyst");
        then.status(200).json_body(json!({ "upsertedCount": 2 }));
    });

    // 3. Embed the chunked dataset.
    let response = app
        .client
        .post(format!("{}/embed", app.address))
        .json(&json!({
            "embedding_model": "openai-small",
            "vector_store": "pinecone",
            "datasets": [{
                "id": "people-ds",
                "label": "People",
                "dataset_type": "csv",
                "chunk_size": 1000,
                "chunk_overlap": 200,
                "chunks": upload["chunks"]
            }],
            "pinecone": { "api_key": "pc-key", "index_name": "people-index" }
        }))
        .send()
        .await?;
    assert!(response.status().is_success());

    let body: Value = response.json().await?;
    assert_eq!(body["errors"].as_array().unwrap().len(), 0);
    let summary = &body["results"][0];
    assert_eq!(summary["dataset_id"], "people-ds");
    assert_eq!(summary["chunks_processed"], 2);
    assert_eq!(summary["chunks_embedded"], 2);
    upsert_mock.assert();
    Ok(())
}

#[tokio::test]
async fn embed_isolates_failures_per_dataset() -> Result<()> {
    let app = TestApp::spawn().await?;

    app.mock_server.mock(|when, then| {
        when.method(POST).path("/embeddings");
        then.status(200)
            .json_body(json!({ "data": [{ "embedding": [0.1, 0.2, 0.3, 0.4] }] }));
    });

    // Local store: no index mocks needed.
    let response = app
        .client
        .post(format!("{}/embed", app.address))
        .json(&json!({
            "embedding_model": "openai-small",
            "vector_store": "chroma",
            "datasets": [
                {
                    "id": "empty-ds", "label": "Empty", "dataset_type": "csv",
                    "chunk_size": 1000, "chunk_overlap": 200,
                    "chunks": [{ "order": 0, "text": "   " }]
                },
                {
                    "id": "good-ds", "label": "Good", "dataset_type": "csv",
                    "chunk_size": 1000, "chunk_overlap": 200,
                    "chunks": [{ "order": 0, "text": "Row 1: name: Ada" }]
                }
            ]
        }))
        .send()
        .await?;
    assert!(response.status().is_success());

    let body: Value = response.json().await?;
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["dataset_id"], "empty-ds");
    assert!(errors[0]["message"]
        .as_str()
        .unwrap()
        .contains("non-empty chunks"));

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["dataset_id"], "good-ds");
    Ok(())
}

#[tokio::test]
async fn embed_requires_pinecone_config_for_the_managed_store() -> Result<()> {
    let app = TestApp::spawn().await?;

    let response = app
        .client
        .post(format!("{}/embed", app.address))
        .json(&json!({
            "embedding_model": "openai-small",
            "vector_store": "pinecone",
            "datasets": [{
                "id": "ds", "label": "ds", "dataset_type": "csv",
                "chunk_size": 1000, "chunk_overlap": 200,
                "chunks": [{ "order": 0, "text": "x" }]
            }]
        }))
        .send()
        .await?;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("Pinecone configuration is required"));
    Ok(())
}
