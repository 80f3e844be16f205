//! Public chat flow: key verification, retrieval, grounded generation and
//! usage tracking.

mod common;

use anyhow::Result;
use common::TestApp;
use httpmock::prelude::*;
use serde_json::{json, Value};

fn verified_pipeline(dataset_ids: Vec<&str>) -> serde_json::Value {
    json!({
        "pipeline": {
            "llm": {
                "provider": "openai",
                "model": "openai/gpt-5",
                "systemPrompt": "You are the Krira docs assistant.",
                "topK": 3
            },
            "embedding": {
                "vectorStore": "pinecone",
                "model": "openai-small",
                "dimension": 1536,
                "datasetIds": dataset_ids,
                "pineconeConfig": {
                    "apiKey": "pc-key",
                    "indexName": "docs-index",
                    "namespace": "tenant-a"
                }
            }
        }
    })
}

#[tokio::test]
async fn chat_retrieves_context_and_returns_snippets() -> Result<()> {
    let app = TestApp::spawn().await?;

    let verify_mock = app.mock_server.mock(|when, then| {
        when.method(POST)
            .path("/api/verify")
            .header("x-service-key", "shared-secret")
            .body_contains("demo-pipeline");
        then.status(200)
            .json_body(verified_pipeline(vec!["ds-1"]));
    });
    app.mock_server.mock(|when, then| {
        when.method(POST).path("/embeddings");
        then.status(200)
            .json_body(json!({ "data": [{ "embedding": [0.1, 0.2, 0.3, 0.4] }] }));
    });
    app.mock_server.mock(|when, then| {
        when.method(GET).path("/indexes/docs-index");
        then.status(200)
            .json_body(json!({ "host": app.mock_server.base_url(), "dimension": 4 }));
    });
    let query_mock = app.mock_server.mock(|when, then| {
        when.method(POST).path("/query").body_contains("ds-1");
        then.status(200).json_body(json!({
            "matches": [
                {"id": "ds-1::0", "score": 0.9, "metadata": {
                    "dataset_id": "ds-1", "chunk_text": "Paris is the capital of France."
                }},
                {"id": "ds-1::1", "score": 0.7, "metadata": {
                    "dataset_id": "ds-1", "chunk_text": "France borders Spain."
                }}
            ]
        }));
    });
    let completion_mock = app.mock_server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("Paris is the capital of France.")
            .body_contains("What is the capital of France?");
        then.status(200).json_body(json!({
            "choices": [{"message": {"role": "assistant", "content": "Paris."}}],
            "usage": {"prompt_tokens": 42, "completion_tokens": 3, "total_tokens": 45}
        }));
    });
    let track_mock = app.mock_server.mock(|when, then| {
        when.method(POST)
            .path("/api/track-usage")
            .body_contains("\"tokens\":45");
        then.status(200).json_body(json!({ "ok": true }));
    });

    let response = app
        .client
        .post(format!("{}/v1/chat", app.address))
        .header("Authorization", "Bearer sdk-api-key")
        .json(&json!({
            "pipeline_name": "demo-pipeline",
            "query": "What is the capital of France?",
            "conversation_id": "conv-1"
        }))
        .send()
        .await?;
    assert!(response.status().is_success());

    let body: Value = response.json().await?;
    assert_eq!(body["pipeline_name"], "demo-pipeline");
    assert_eq!(body["answer"], "Paris.");
    assert_eq!(body["conversation_id"], "conv-1");
    assert!(body["latency_ms"].as_u64().is_some());
    let snippets = body["context_snippets"].as_array().unwrap();
    assert_eq!(snippets[0], "Paris is the capital of France.");

    verify_mock.assert();
    query_mock.assert();
    completion_mock.assert();
    track_mock.assert();
    Ok(())
}

#[tokio::test]
async fn chat_without_datasets_skips_retrieval_and_stays_grounded() -> Result<()> {
    let app = TestApp::spawn().await?;

    app.mock_server.mock(|when, then| {
        when.method(POST).path("/api/verify");
        then.status(200).json_body(verified_pipeline(vec![]));
    });
    let embeddings_mock = app.mock_server.mock(|when, then| {
        when.method(POST).path("/embeddings");
        then.status(200).json_body(json!({ "data": [] }));
    });
    // The grounded prompt forces the no-docs window into the user message.
    let completion_mock = app.mock_server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("No external docs available.");
        then.status(200).json_body(json!({
            "choices": [{"message": {"role": "assistant", "content": "The information is not available in the provided context."}}]
        }));
    });
    app.mock_server.mock(|when, then| {
        when.method(POST).path("/api/track-usage");
        then.status(200).json_body(json!({ "ok": true }));
    });

    let response = app
        .client
        .post(format!("{}/v1/chat", app.address))
        .header("Authorization", "Bearer sdk-api-key")
        .json(&json!({ "pipeline_name": "demo-pipeline", "query": "Anything?" }))
        .send()
        .await?;
    assert!(response.status().is_success());

    let body: Value = response.json().await?;
    assert_eq!(
        body["answer"],
        "The information is not available in the provided context."
    );
    assert_eq!(body["context_snippets"].as_array().unwrap().len(), 0);
    embeddings_mock.assert_hits(0);
    completion_mock.assert();
    Ok(())
}

#[tokio::test]
async fn chat_degrades_to_no_docs_when_retrieval_fails() -> Result<()> {
    let app = TestApp::spawn().await?;

    app.mock_server.mock(|when, then| {
        when.method(POST).path("/api/verify");
        then.status(200)
            .json_body(verified_pipeline(vec!["ds-1"]));
    });
    app.mock_server.mock(|when, then| {
        when.method(POST).path("/embeddings");
        then.status(200)
            .json_body(json!({ "data": [{ "embedding": [0.1, 0.2, 0.3, 0.4] }] }));
    });
    // The index is gone: retrieval errors must not fail the request.
    app.mock_server.mock(|when, then| {
        when.method(GET).path("/indexes/docs-index");
        then.status(404).json_body(json!({ "error": "not found" }));
    });
    let completion_mock = app.mock_server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("No external docs available.");
        then.status(200).json_body(json!({
            "choices": [{"message": {"role": "assistant", "content": "The information is not available in the provided context."}}]
        }));
    });
    app.mock_server.mock(|when, then| {
        when.method(POST).path("/api/track-usage");
        then.status(200).json_body(json!({ "ok": true }));
    });

    let response = app
        .client
        .post(format!("{}/v1/chat", app.address))
        .header("Authorization", "Bearer sdk-api-key")
        .json(&json!({ "pipeline_name": "demo-pipeline", "query": "Anything?" }))
        .send()
        .await?;
    assert!(response.status().is_success());
    completion_mock.assert();
    Ok(())
}

#[tokio::test]
async fn verification_rejections_propagate_status_and_message() -> Result<()> {
    let app = TestApp::spawn().await?;

    app.mock_server.mock(|when, then| {
        when.method(POST).path("/api/verify");
        then.status(403)
            .header("Content-Type", "application/json")
            .json_body(json!({ "message": "API key does not own this pipeline" }));
    });

    let response = app
        .client
        .post(format!("{}/v1/chat", app.address))
        .header("Authorization", "Bearer wrong-key")
        .json(&json!({ "pipeline_name": "demo-pipeline", "query": "hello" }))
        .send()
        .await?;
    assert_eq!(response.status(), 403);
    let body: Value = response.json().await?;
    assert_eq!(body["detail"], "API key does not own this pipeline");
    Ok(())
}

#[tokio::test]
async fn exceeded_usage_limit_surfaces_as_payment_required() -> Result<()> {
    let app = TestApp::spawn().await?;

    app.mock_server.mock(|when, then| {
        when.method(POST).path("/api/verify");
        then.status(200).json_body(verified_pipeline(vec![]));
    });
    app.mock_server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(json!({
            "choices": [{"message": {"role": "assistant", "content": "hi"}}]
        }));
    });
    app.mock_server.mock(|when, then| {
        when.method(POST).path("/api/track-usage");
        then.status(402)
            .json_body(json!({ "message": "Monthly request limit reached" }));
    });

    let response = app
        .client
        .post(format!("{}/v1/chat", app.address))
        .header("Authorization", "Bearer sdk-api-key")
        .json(&json!({ "pipeline_name": "demo-pipeline", "query": "hello" }))
        .send()
        .await?;
    assert_eq!(response.status(), 402);
    let body: Value = response.json().await?;
    assert_eq!(body["detail"], "Monthly request limit reached");
    Ok(())
}
