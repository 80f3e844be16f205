//! End-to-end evaluation engine tests against mock gateway upstreams.
//!
//! The answering model and the judge share the same mock server; the two
//! call shapes are told apart by their prompts.

use base64::Engine as _;
use httpmock::prelude::*;
use krira::evaluation::EvaluationParams;
use krira::providers::ai::catalog::Provider;
use krira::{EngineConfig, RagEngine};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

struct TestHarness {
    server: MockServer,
    engine: RagEngine,
    _dirs: (tempfile::TempDir, tempfile::TempDir),
}

fn harness() -> TestHarness {
    let server = MockServer::start();
    let vector_dir = tempfile::tempdir().unwrap();
    let evaluation_dir = tempfile::tempdir().unwrap();

    let engine = RagEngine::new(EngineConfig {
        gateway_base_url: Some(server.base_url()),
        gateway_api_key: Some("test-key".to_string()),
        gateway_timeout: Duration::from_secs(5),
        llm_max_tokens: 256,
        judge_model: None,
        local_vector_dir: vector_dir.path().to_path_buf(),
        pinecone_control_url: None,
        evaluation_dir: evaluation_dir.path().to_path_buf(),
        evaluation_concurrency: 3,
        configured_models: HashMap::new(),
    })
    .unwrap();

    TestHarness {
        server,
        engine,
        _dirs: (vector_dir, evaluation_dir),
    }
}

fn mock_embeddings(server: &MockServer, count: usize) {
    let data: Vec<_> = (0..count)
        .map(|_| json!({ "embedding": [0.1, 0.2, 0.3, 0.4] }))
        .collect();
    server.mock(|when, then| {
        when.method(POST).path("/embeddings");
        then.status(200).json_body(json!({ "data": data }));
    });
}

fn mock_answer_model(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("IMPORTANT: Answer using ONLY");
        then.status(200).json_body(json!({
            "choices": [{"message": {"role": "assistant", "content": "The information is not available in the provided context."}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }));
    });
}

fn mock_judge(server: &MockServer, question_marker: &str, verdict_body: serde_json::Value) {
    let marker = question_marker.to_string();
    server.mock(move |when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("Evaluate the assistant's answer")
            .body_contains(&marker);
        then.status(200).json_body(json!({
            "choices": [{"message": {"role": "assistant", "content": verdict_body.to_string()}}],
            "usage": {"prompt_tokens": 50, "completion_tokens": 40, "total_tokens": 90}
        }));
    });
}

fn params_with_csv(csv: &str) -> EvaluationParams {
    EvaluationParams {
        provider: "openai".to_string(),
        model_id: "openai/gpt-5".to_string(),
        system_prompt: Some("Answer tersely.".to_string()),
        embedding_model: "openai-small".to_string(),
        vector_store: "local".to_string(),
        dataset_ids: vec!["ds-1".to_string()],
        top_k: Some(5),
        embedding_dimension: None,
        csv_path: None,
        csv_content: Some(base64::engine::general_purpose::STANDARD.encode(csv)),
        original_filename: Some("golden.csv".to_string()),
        pinecone: None,
    }
}

#[tokio::test]
async fn aggregate_accuracy_is_recomputed_from_verdicts() {
    let harness = harness();
    let csv = "input,output\n\
               What is q1?,a1\n\
               What is q2?,a2\n\
               What is q3?,a3\n\
               What is q4?,a4\n";

    mock_embeddings(&harness.server, 4);
    mock_answer_model(&harness.server);
    mock_judge(
        &harness.server,
        "What is q1?",
        json!({
            "verdict": "correct", "accuracy": 95, "evaluation_score": 90,
            "semantic_accuracy": 92, "faithfulness": 100, "answer_relevancy": 88,
            "content_precision": 85, "context_recall": 80,
            "reasoning": "Matches the reference.", "recommended_fix": "",
            "metric_breakdown": {"accuracy": "Core facts line up."}
        }),
    );
    mock_judge(
        &harness.server,
        "What is q2?",
        json!({
            "verdict": "correct", "evaluation_score": 80,
            "reasoning": "Close enough.", "recommended_fix": "",
            "metric_breakdown": {}
        }),
    );
    mock_judge(
        &harness.server,
        "What is q3?",
        json!({
            "verdict": "partial", "evaluation_score": 55,
            "reasoning": "Half right.", "recommended_fix": "Mention the second clause.",
            "metric_breakdown": {}
        }),
    );
    mock_judge(
        &harness.server,
        "What is q4?",
        json!({
            "verdict": "incorrect", "accuracy": 10, "evaluation_score": 20,
            "reasoning": "Contradicts the reference.", "recommended_fix": "Use the context.",
            "metric_breakdown": {}
        }),
    );

    let report = harness
        .engine
        .evaluate_from_csv(params_with_csv(csv))
        .await
        .unwrap();

    // Binary top-line semantics: 2 of 4 verdicts are 'correct'.
    assert_eq!(report.metrics.accuracy, 50.0);

    // Output rows keep CSV order for any completion interleaving.
    let numbers: Vec<&str> = report
        .rows
        .iter()
        .map(|row| row.question_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["1", "2", "3", "4"]);
    assert_eq!(report.rows[2].verdict, "partial");

    // The judge's evaluation score flows into the row's llmScore.
    assert_eq!(report.rows[1].llm_score, 80.0);

    // Justifications name the average and worst example.
    let accuracy_note = report.justifications.get("accuracy").unwrap();
    assert!(accuracy_note.contains("across 4 examples"));
    assert!(accuracy_note.contains("example #4"));
    assert!(accuracy_note.contains("Core facts line up."));

    assert_eq!(report.source.total, 4);
    assert_eq!(report.source.provider, Provider::Openai);
    assert_eq!(report.source.filename, "golden.csv");
}

#[tokio::test]
async fn unparseable_judge_output_fails_the_run() {
    let harness = harness();
    let csv = "input,output\nWhat is q1?,a1\n";

    mock_embeddings(&harness.server, 1);
    mock_answer_model(&harness.server);
    harness.server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("Evaluate the assistant's answer");
        then.status(200).json_body(json!({
            "choices": [{"message": {"role": "assistant", "content": "I would rate this a solid seven."}}]
        }));
    });

    let err = harness
        .engine
        .evaluate_from_csv(params_with_csv(csv))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("could not be parsed"));
}

#[tokio::test]
async fn evaluation_requires_datasets_and_confined_csv_paths() {
    let harness = harness();

    let mut params = params_with_csv("input,output\nq,a\n");
    params.dataset_ids.clear();
    let err = harness.engine.evaluate_from_csv(params).await.unwrap_err();
    assert!(err.to_string().contains("At least one dataset"));

    let mut params = params_with_csv("unused");
    params.csv_content = None;
    params.csv_path = Some("../../outside.csv".to_string());
    let err = harness.engine.evaluate_from_csv(params).await.unwrap_err();
    assert!(err.to_string().contains("must reside within"));
}

#[tokio::test]
async fn invalid_base64_content_is_a_csv_error() {
    let harness = harness();
    let mut params = params_with_csv("unused");
    params.csv_content = Some("%%% not base64 %%%".to_string());
    let err = harness.engine.evaluate_from_csv(params).await.unwrap_err();
    assert!(err.to_string().contains("provide base64 content"));
}
