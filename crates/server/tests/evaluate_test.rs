//! Evaluation endpoint tests: request validation and path confinement.
//! The full judge/aggregation pipeline is covered by the engine tests.

mod common;

use anyhow::Result;
use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn evaluation_rejects_unknown_providers_and_missing_datasets() -> Result<()> {
    let app = TestApp::spawn().await?;

    let response = app
        .client
        .post(format!("{}/api/llm/evaluate", app.address))
        .json(&json!({
            "provider": "mistral",
            "modelId": "m",
            "embeddingModel": "openai-small",
            "vectorStore": "local",
            "datasetIds": ["ds-1"],
            "csvPath": "golden.csv"
        }))
        .send()
        .await?;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert!(body["detail"].as_str().unwrap().contains("Unsupported provider"));

    let response = app
        .client
        .post(format!("{}/api/llm/evaluate", app.address))
        .json(&json!({
            "provider": "openai",
            "modelId": "openai/gpt-5",
            "embeddingModel": "openai-small",
            "vectorStore": "local",
            "datasetIds": [],
            "csvPath": "golden.csv"
        }))
        .send()
        .await?;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("At least one dataset"));
    Ok(())
}

#[tokio::test]
async fn evaluation_confines_csv_paths_to_the_allowed_tree() -> Result<()> {
    let app = TestApp::spawn().await?;

    let response = app
        .client
        .post(format!("{}/api/llm/evaluate", app.address))
        .json(&json!({
            "provider": "openai",
            "modelId": "openai/gpt-5",
            "embeddingModel": "openai-small",
            "vectorStore": "local",
            "datasetIds": ["ds-1"],
            "csvPath": "../../secrets.csv"
        }))
        .send()
        .await?;
    assert_eq!(response.status(), 403);
    let body: Value = response.json().await?;
    assert!(body["detail"].as_str().unwrap().contains("must reside within"));
    Ok(())
}

#[tokio::test]
async fn evaluation_requires_a_csv_source() -> Result<()> {
    let app = TestApp::spawn().await?;

    let response = app
        .client
        .post(format!("{}/api/llm/evaluate", app.address))
        .json(&json!({
            "provider": "openai",
            "modelId": "openai/gpt-5",
            "embeddingModel": "openai-small",
            "vectorStore": "local",
            "datasetIds": ["ds-1"]
        }))
        .send()
        .await?;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("path or content must be provided"));
    Ok(())
}
