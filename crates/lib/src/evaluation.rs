//! Batch evaluation of a configured pipeline against a labeled CSV.
//!
//! Every row runs the same retrieve → ground → generate path as chat, then
//! a fixed judge model scores the answer against the expected one with a
//! detailed rubric. Rows fan out concurrently up to the configured ceiling;
//! the output order always matches the CSV order.

use crate::context::{build_context_window, build_system_prompt, build_user_prompt, prepare_context_snippets};
use crate::engine::RagEngine;
use crate::providers::ai::catalog::Provider;
use crate::providers::ai::embedding::{EmbeddingError, EmbeddingModel};
use crate::providers::ai::gateway::{ChatOptions, GatewayError};
use crate::providers::vector::{VectorStore, VectorStoreError};
use crate::types::PineconeConfig;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Completion budget for one judge verdict.
const JUDGE_MAX_TOKENS: u32 = 900;

/// Recognized header spellings, compared after lowercasing and dropping
/// non-alphanumerics.
const SERIAL_HEADERS: [&str; 7] = ["srno", "srnumber", "serialnumber", "serial", "id", "number", "sr"];
const QUESTION_HEADERS: [&str; 4] = ["input", "question", "prompt", "query"];
const ANSWER_HEADERS: [&str; 5] = ["output", "expectedanswer", "answer", "groundtruth", "expected"];

const ALLOWED_VERDICTS: [&str; 3] = ["correct", "partial", "incorrect"];

struct MetricSpec {
    /// camelCase key used in responses and justifications.
    report_key: &'static str,
    /// snake_case key the judge is instructed to emit.
    response_key: &'static str,
    label: &'static str,
}

const METRICS: [MetricSpec; 7] = [
    MetricSpec { report_key: "accuracy", response_key: "accuracy", label: "Accuracy" },
    MetricSpec { report_key: "evaluationScore", response_key: "evaluation_score", label: "Evaluation Score" },
    MetricSpec { report_key: "semanticAccuracy", response_key: "semantic_accuracy", label: "Semantic Accuracy" },
    MetricSpec { report_key: "faithfulness", response_key: "faithfulness", label: "Faithfulness" },
    MetricSpec { report_key: "answerRelevancy", response_key: "answer_relevancy", label: "Answer Relevancy" },
    MetricSpec { report_key: "contentPrecision", response_key: "content_precision", label: "Content Precision" },
    MetricSpec { report_key: "contextRecall", response_key: "context_recall", label: "Context Recall" },
];
const METRIC_COUNT: usize = METRICS.len();

/// Rubric handed to the judge model. The judge must reply with a bare JSON
/// object carrying a verdict, the seven 0-100 metrics, reasoning, a
/// recommended fix and a per-metric breakdown.
pub const EVALUATION_SYSTEM_PROMPT: &str = r#"You are an advanced evaluation system for retrieval-augmented generation (RAG) assistants. Your goal is to assess whether the assistant correctly satisfies the user's information need using the provided context.

## Core Evaluation Principles
1. Semantic Correctness Over Exact Matching: Judge based on meaning and information accuracy, not word-for-word similarity
2. Context Fidelity: Reward answers grounded in context; penalize hallucinations and unsupported claims
3. Practical Utility: Assess whether the answer actually helps the user, regardless of stylistic differences from the reference
4. Appropriate Scope: Expect answers to match the depth/breadth that the context supports

## Detailed Scoring Guidelines

**verdict** ('correct' | 'partial' | 'incorrect'):
- 'correct': Answer conveys the same core information as expected answer, semantically equivalent
- 'partial': Answer has the right direction but misses some key details or has minor inaccuracies
- 'incorrect': Answer is wrong, contradicts expected answer, or completely misses the point

**accuracy** (0-100):
- 100: Core facts match expected answer (different wording is fine)
- 90-99: Correct information but minor differences in completeness or presentation
- 70-89: Mostly correct but missing some important details
- 50-69: Partially correct with significant gaps or minor errors
- Below 50: Major errors or mostly incorrect
- Focus on INFORMATION CORRECTNESS, not format or style

**evaluation_score** (0-100):
- Holistic quality: correctness + helpfulness + professionalism
- 100: Perfect answer that fully satisfies the user's need
- Deduct for: verbosity without value, poor structure, unhelpful tone
- Reward: clarity, directness, appropriate detail level

**semantic_accuracy** (0-100):
- 100: Meaning perfectly aligns with expected answer
- Ignore differences in: word choice, sentence structure, formatting
- Focus on: whether the same information is conveyed
- Examples of 100 score: '23' vs '23 employees' vs 'The count is 23' vs 'There are twenty-three'

**faithfulness** (0-100):
- 100: Every claim is verifiable in the provided context
- Heavily penalize: fabricated details, assumptions presented as facts, unsupported elaborations
- Reward: appropriate use of context, staying within context boundaries
- Note: Brevity when context is limited should score 100, not be penalized

**answer_relevancy** (0-100):
- 100: Directly addresses the question without tangents
- Deduct for: off-topic content, excessive preambles, irrelevant information
- Reward: focused, on-point responses

**content_precision** (0-100):
- 100: Appropriate level of detail given the context and question
- Penalize: vagueness when specifics are available, over-elaboration beyond context, unsupported details
- Reward: specific answers when warranted, concise answers when appropriate

**context_recall** (0-100):
- 100: Appropriately uses all relevant information from context
- Deduct for: missing key context elements that should be included
- Note: Not using irrelevant context should NOT be penalized

## Common Evaluation Mistakes to Avoid
DO NOT:
- Penalize different phrasings of the same fact
- Expect elaborate answers when simple ones are sufficient
- Penalize brevity when context is limited
- Focus on style over substance

DO:
- Reward factual correctness regardless of format
- Heavily penalize only actual hallucinations
- Judge whether the answer serves the user's need

## Response Format
Respond ONLY with a valid JSON object (no markdown fences) containing:
- verdict: string ('correct' | 'partial' | 'incorrect')
- accuracy: number (0-100)
- evaluation_score: number (0-100)
- semantic_accuracy: number (0-100)
- faithfulness: number (0-100)
- answer_relevancy: number (0-100)
- content_precision: number (0-100)
- context_recall: number (0-100)
- reasoning: string (2-3 sentences summarizing the evaluation)
- recommended_fix: string (specific suggestion if score < 95, empty string otherwise)
- metric_breakdown: object with one-sentence justification for each metric

Evaluate fairly and consistently. Focus on whether the answer is correct and useful, not whether it matches a specific style."#;

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Unsupported provider '{0}'")]
    UnsupportedProvider(String),
    #[error("Model identifier is required for evaluation")]
    MissingModel,
    #[error("At least one dataset must be selected for evaluation")]
    MissingDatasets,
    #[error("{0}")]
    Csv(String),
    #[error("Evaluation CSV must reside within {0}")]
    PathOutsideRoot(String),
    #[error("Evaluation CSV file '{0}' was not found")]
    CsvNotFound(String),
    #[error("Evaluator response could not be parsed: {0}")]
    JudgeParse(String),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Inputs for one evaluation run.
#[derive(Debug, Clone, Default)]
pub struct EvaluationParams {
    pub provider: String,
    pub model_id: String,
    pub system_prompt: Option<String>,
    pub embedding_model: String,
    pub vector_store: String,
    pub dataset_ids: Vec<String>,
    pub top_k: Option<i64>,
    pub embedding_dimension: Option<u32>,
    /// Path inside the evaluation directory; ignored when `csv_content` is
    /// supplied.
    pub csv_path: Option<String>,
    /// Inline base64 CSV content, decoded into a temporary file.
    pub csv_content: Option<String>,
    pub original_filename: Option<String>,
    pub pinecone: Option<PineconeConfig>,
}

/// One labeled CSV row. `number` is a display id, not a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationCsvRow {
    pub number: String,
    pub question: String,
    pub expected_answer: String,
}

/// Per-row evaluation result in the response payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRowReport {
    pub question_number: String,
    pub question: String,
    pub expected_answer: String,
    pub model_answer: String,
    pub verdict: String,
    pub llm_score: f64,
    pub semantic_score: Option<f64>,
    pub faithfulness: Option<f64>,
    pub answer_relevancy: Option<f64>,
    pub content_precision: Option<f64>,
    pub context_recall: Option<f64>,
    pub context_snippets: Vec<String>,
    pub notes: Option<String>,
}

/// Aggregate metric averages across the run.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub evaluation_score: f64,
    pub semantic_accuracy: f64,
    pub faithfulness: f64,
    pub answer_relevancy: f64,
    pub content_precision: f64,
    pub context_recall: f64,
}

/// Provenance of the evaluated CSV.
#[derive(Debug, Serialize)]
pub struct EvaluationSource {
    pub csv: String,
    pub filename: String,
    pub total: usize,
    pub provider: Provider,
    pub model: String,
}

/// Full evaluation response.
#[derive(Debug, Serialize)]
pub struct EvaluationReport {
    pub metrics: EvaluationMetrics,
    pub rows: Vec<EvaluationRowReport>,
    pub justifications: HashMap<String, String>,
    pub source: EvaluationSource,
}

struct RowEvaluation {
    report: EvaluationRowReport,
    metric_values: [Option<f64>; METRIC_COUNT],
    breakdowns: [Option<String>; METRIC_COUNT],
    verdict_correct: bool,
}

struct RowContext<'a> {
    embedding_model: EmbeddingModel,
    vector_store: VectorStore,
    dataset_ids: &'a [String],
    top_k: usize,
    pinecone: Option<&'a PineconeConfig>,
    system_prompt: &'a str,
    answer_model: &'a str,
}

impl RagEngine {
    /// Runs the full evaluation and aggregates the judge's metrics.
    ///
    /// Any unparseable judge verdict, retrieval error or LLM error on any
    /// row fails the whole run.
    pub async fn evaluate_from_csv(
        &self,
        params: EvaluationParams,
    ) -> Result<EvaluationReport, EvaluationError> {
        let provider: Provider = params
            .provider
            .parse()
            .map_err(|_| EvaluationError::UnsupportedProvider(params.provider.clone()))?;
        if params.model_id.trim().is_empty() {
            return Err(EvaluationError::MissingModel);
        }
        let embedding_model = EmbeddingModel::parse(&params.embedding_model)?;
        let vector_store = VectorStore::parse(&params.vector_store)?;

        let dataset_ids: Vec<String> = params
            .dataset_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if dataset_ids.is_empty() {
            return Err(EvaluationError::MissingDatasets);
        }

        // Resolve the CSV. Inline content lands in a temporary file that is
        // removed when the guard drops, failure paths included.
        let (csv_file, temp_guard) = match params.csv_content.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(content) => {
                let temp = self.materialize_csv_content(content, params.original_filename.as_deref())?;
                (temp.to_path_buf(), Some(temp))
            }
            None => {
                let path = params
                    .csv_path
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| {
                        EvaluationError::Csv("Evaluation CSV path or content must be provided".to_string())
                    })?;
                (self.resolve_csv_path(path)?, None)
            }
        };

        let rows = load_evaluation_csv(&csv_file);
        // Inline uploads are removed as soon as the rows are in memory.
        drop(temp_guard);
        let rows = rows?;
        if rows.is_empty() {
            return Err(EvaluationError::Csv(
                "Evaluation CSV is empty; add at least one row".to_string(),
            ));
        }

        let system_prompt = build_system_prompt(params.system_prompt.as_deref());
        let questions: Vec<String> = rows.iter().map(|row| row.question.clone()).collect();
        let question_vectors = self
            .embeddings
            .generate(embedding_model, &questions, params.embedding_dimension)
            .await?;
        if question_vectors.len() != rows.len() {
            return Err(EvaluationError::Embedding(EmbeddingError::CountMismatch));
        }

        let top_k = params.top_k.unwrap_or(crate::chat::DEFAULT_TOP_K).max(1) as usize;
        let row_context = RowContext {
            embedding_model,
            vector_store,
            dataset_ids: &dataset_ids,
            top_k,
            pinecone: params.pinecone.as_ref(),
            system_prompt: &system_prompt,
            answer_model: &params.model_id,
        };

        // Bounded fan-out; `buffered` keeps completion order equal to CSV
        // order regardless of which rows finish first.
        let futures: Vec<_> = rows
            .iter()
            .zip(question_vectors.iter())
            .map(|(row, vector)| {
                let row_context = &row_context;
                Box::pin(async move { self.evaluate_row(row, vector, row_context).await })
                    as std::pin::Pin<Box<dyn std::future::Future<Output = Result<RowEvaluation, EvaluationError>> + Send + '_>>
            })
            .collect();
        let evaluations: Vec<RowEvaluation> = stream::iter(futures)
            .buffered(self.evaluation_concurrency)
            .try_collect()
            .await?;

        Ok(self.aggregate(provider, &params, &csv_file, evaluations))
    }

    async fn evaluate_row(
        &self,
        row: &EvaluationCsvRow,
        question_vector: &[f32],
        ctx: &RowContext<'_>,
    ) -> Result<RowEvaluation, EvaluationError> {
        let contexts = self
            .vectors
            .query(
                ctx.vector_store,
                question_vector,
                ctx.embedding_model,
                ctx.top_k,
                ctx.pinecone,
                ctx.dataset_ids,
            )
            .await?;

        let context_snippets = prepare_context_snippets(&contexts);
        let context_text = build_context_window(&contexts);

        let answer = self
            .gateway
            .chat(
                ctx.answer_model,
                ctx.system_prompt,
                &build_user_prompt(&row.question, &context_text),
                ChatOptions::default(),
            )
            .await?;
        let model_answer = answer.text.trim().to_string();

        let verdict_payload = self
            .score_answer(&row.question, &row.expected_answer, &model_answer, &context_snippets)
            .await?;

        let verdict_raw = verdict_payload
            .get("verdict")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        let verdict = if ALLOWED_VERDICTS.contains(&verdict_raw.as_str()) {
            verdict_raw
        } else {
            "incorrect".to_string()
        };

        let breakdown = verdict_payload.get("metric_breakdown");
        let mut metric_values: [Option<f64>; METRIC_COUNT] = Default::default();
        let mut breakdowns: [Option<String>; METRIC_COUNT] = Default::default();

        for (index, metric) in METRICS.iter().enumerate() {
            let mut value = percentage_or_none(verdict_payload.get(metric.response_key));
            if metric.report_key == "accuracy" && value.is_none() {
                value = Some(match verdict.as_str() {
                    "correct" => 100.0,
                    "partial" => 50.0,
                    _ => 0.0,
                });
            }
            metric_values[index] = value;

            breakdowns[index] = breakdown
                .and_then(|b| b.get(metric.response_key).or_else(|| b.get(metric.report_key)))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string);
        }

        let reasoning = verdict_payload
            .get("reasoning")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty());
        let recommended_fix = verdict_payload
            .get("recommended_fix")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty());
        let notes = match (reasoning, recommended_fix) {
            (Some(reasoning), Some(fix)) => Some(format!("{reasoning} Suggested fix: {fix}")),
            (Some(reasoning), None) => Some(reasoning.to_string()),
            (None, Some(fix)) => Some(format!("Suggested fix: {fix}")),
            (None, None) => None,
        };

        let metric = |key: &str| -> Option<f64> {
            METRICS
                .iter()
                .position(|m| m.report_key == key)
                .and_then(|index| metric_values[index])
                .map(round_percentage)
        };

        let verdict_correct = verdict == "correct";
        let report = EvaluationRowReport {
            question_number: row.number.clone(),
            question: row.question.clone(),
            expected_answer: row.expected_answer.clone(),
            model_answer,
            verdict,
            llm_score: metric("evaluationScore").unwrap_or(0.0),
            semantic_score: metric("semanticAccuracy"),
            faithfulness: metric("faithfulness"),
            answer_relevancy: metric("answerRelevancy"),
            content_precision: metric("contentPrecision"),
            context_recall: metric("contextRecall"),
            context_snippets,
            notes,
        };

        Ok(RowEvaluation {
            report,
            metric_values,
            breakdowns,
            verdict_correct,
        })
    }

    /// Asks the judge model for a verdict and parses its JSON object.
    async fn score_answer(
        &self,
        question: &str,
        expected_answer: &str,
        model_answer: &str,
        context_snippets: &[String],
    ) -> Result<Value, EvaluationError> {
        let joined_context = if context_snippets.is_empty() {
            "- No retrieved context".to_string()
        } else {
            context_snippets
                .iter()
                .map(|snippet| format!("- {snippet}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let user_message = format!(
            "Evaluate the assistant's answer against the reference using the provided context.\n\n\
             Question:\n{}\n\nExpected Answer:\n{}\n\nAssistant Answer:\n{}\n\n\
             Retrieved Context:\n{joined_context}\n\n\
             Return the JSON object described in the system prompt.",
            question.trim(),
            expected_answer.trim(),
            model_answer.trim(),
        );

        let outcome = self
            .gateway
            .chat(
                &self.judge_model,
                EVALUATION_SYSTEM_PROMPT,
                &user_message,
                ChatOptions {
                    temperature: Some(0.0),
                    max_tokens: Some(JUDGE_MAX_TOKENS),
                },
            )
            .await?;

        let json_payload = extract_json_object(&outcome.text)?;
        let parsed: Value = serde_json::from_str(&json_payload).map_err(|e| {
            warn!(response = %outcome.text, "unable to parse evaluator response");
            EvaluationError::JudgeParse(e.to_string())
        })?;
        if !parsed.is_object() {
            return Err(EvaluationError::JudgeParse(
                "response was not a JSON object".to_string(),
            ));
        }
        Ok(parsed)
    }

    fn aggregate(
        &self,
        provider: Provider,
        params: &EvaluationParams,
        csv_file: &Path,
        evaluations: Vec<RowEvaluation>,
    ) -> EvaluationReport {
        let total_rows = evaluations.len().max(1);
        let correct_count = evaluations.iter().filter(|row| row.verdict_correct).count();

        let mut metric_values: Vec<Vec<(f64, String)>> = vec![Vec::new(); METRIC_COUNT];
        let mut metric_messages: Vec<Vec<String>> = vec![Vec::new(); METRIC_COUNT];
        for evaluation in &evaluations {
            for index in 0..METRIC_COUNT {
                if let Some(value) = evaluation.metric_values[index] {
                    metric_values[index].push((value, evaluation.report.question_number.clone()));
                }
                if let Some(message) = &evaluation.breakdowns[index] {
                    metric_messages[index].push(message.clone());
                }
            }
        }

        let mut summary = [0.0f64; METRIC_COUNT];
        for index in 0..METRIC_COUNT {
            let values: Vec<f64> = metric_values[index].iter().map(|entry| entry.0).collect();
            summary[index] = if values.is_empty() {
                0.0
            } else {
                round_percentage(values.iter().sum::<f64>() / values.len() as f64)
            };
        }

        // The top-line accuracy is binary by design: recompute it from the
        // verdicts instead of trusting the judge's per-row numbers.
        if !metric_values[0].is_empty() {
            summary[0] = round_percentage(correct_count as f64 / total_rows as f64 * 100.0);
        }

        let mut justifications = HashMap::with_capacity(METRIC_COUNT);
        for (index, metric) in METRICS.iter().enumerate() {
            let values = &metric_values[index];
            if values.is_empty() {
                justifications.insert(
                    metric.report_key.to_string(),
                    "No evaluation data available.".to_string(),
                );
                continue;
            }

            let average = summary[index];
            let (worst_value, worst_number) = values
                .iter()
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(value, number)| (*value, number.clone()))
                .unwrap_or((0.0, String::new()));
            let plural = if total_rows != 1 { "s" } else { "" };

            let mut message = format!(
                "Average {} {average:.1}% across {total_rows} example{plural}. Lowest score {worst_value:.1}% on example #{worst_number}.",
                metric.label.to_lowercase()
            );
            if let Some(explanation) = metric_messages[index].first() {
                message.push(' ');
                message.push_str(explanation);
            }
            justifications.insert(metric.report_key.to_string(), message);
        }

        let csv_reference = csv_file
            .strip_prefix(&self.evaluation_dir)
            .map(|relative| relative.display().to_string())
            .unwrap_or_else(|_| csv_file.display().to_string());
        let filename = params
            .original_filename
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| {
                csv_file
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default()
            });

        EvaluationReport {
            metrics: EvaluationMetrics {
                accuracy: summary[0],
                evaluation_score: summary[1],
                semantic_accuracy: summary[2],
                faithfulness: summary[3],
                answer_relevancy: summary[4],
                content_precision: summary[5],
                context_recall: summary[6],
            },
            rows: evaluations.into_iter().map(|row| row.report).collect(),
            justifications,
            source: EvaluationSource {
                csv: csv_reference,
                filename,
                total: total_rows,
                provider,
                model: params.model_id.clone(),
            },
        }
    }

    /// Decodes inline base64 CSV content into a temporary file inside the
    /// evaluation directory.
    fn materialize_csv_content(
        &self,
        content: &str,
        original_filename: Option<&str>,
    ) -> Result<tempfile::TempPath, EvaluationError> {
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(content.trim())
            .map_err(|_| {
                EvaluationError::Csv(
                    "Evaluation CSV payload is invalid; provide base64 content".to_string(),
                )
            })?;
        if decoded.iter().all(|byte| byte.is_ascii_whitespace()) {
            return Err(EvaluationError::Csv(
                "Evaluation CSV content is empty".to_string(),
            ));
        }

        let suffix = original_filename
            .and_then(|name| Path::new(name).extension().map(|ext| format!(".{}", ext.to_string_lossy())))
            .unwrap_or_else(|| ".csv".to_string());

        let mut file = tempfile::Builder::new()
            .prefix("evaluation-")
            .suffix(&suffix)
            .tempfile_in(&self.evaluation_dir)
            .map_err(|e| {
                EvaluationError::Csv(format!("Unable to prepare evaluation workspace: {e}"))
            })?;
        file.write_all(&decoded)
            .and_then(|_| file.flush())
            .map_err(|e| {
                EvaluationError::Csv(format!("Unable to prepare evaluation workspace: {e}"))
            })?;
        Ok(file.into_temp_path())
    }

    /// Resolves a CSV path and confines it to the evaluation directory.
    fn resolve_csv_path(&self, csv_path: &str) -> Result<PathBuf, EvaluationError> {
        let candidate = PathBuf::from(csv_path);
        let candidate = if candidate.is_absolute() {
            candidate
        } else {
            self.evaluation_dir.join(candidate)
        };
        let resolved = normalize_path(&candidate);

        if !resolved.starts_with(&self.evaluation_dir) {
            return Err(EvaluationError::PathOutsideRoot(
                self.evaluation_dir.display().to_string(),
            ));
        }
        if !resolved.is_file() {
            return Err(EvaluationError::CsvNotFound(resolved.display().to_string()));
        }
        if resolved
            .extension()
            .map(|ext| !ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(true)
        {
            return Err(EvaluationError::Csv("Evaluation file must be a CSV".to_string()));
        }
        Ok(resolved)
    }
}

/// Lexically resolves `.` and `..` so escape checks work without touching
/// the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Lowercases a header and drops every non-alphanumeric character, so
/// `Expected Answer`, `expected_answer` and `expectedAnswer` all match.
pub fn normalize_header(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Loads the labeled rows, recognizing the input/output column spellings
/// case- and punctuation-insensitively. A BOM on the header is tolerated.
pub fn load_evaluation_csv(path: &Path) -> Result<Vec<EvaluationCsvRow>, EvaluationError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| EvaluationError::Csv(format!("Failed to read evaluation CSV: {e}")))?;
    let raw = raw.strip_prefix('\u{FEFF}').unwrap_or(&raw);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(raw.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| EvaluationError::Csv(format!("Failed to parse evaluation CSV: {e}")))?
        .clone();

    let position_of = |candidates: &[&str]| -> Option<usize> {
        candidates.iter().find_map(|candidate| {
            headers
                .iter()
                .position(|header| normalize_header(header) == *candidate)
        })
    };

    let serial_index = position_of(&SERIAL_HEADERS);
    let question_index = position_of(&QUESTION_HEADERS);
    let answer_index = position_of(&ANSWER_HEADERS);
    let (Some(question_index), Some(answer_index)) = (question_index, answer_index) else {
        return Err(EvaluationError::Csv(
            "CSV file must include 'input' and 'output' columns".to_string(),
        ));
    };

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| EvaluationError::Csv(format!("Failed to parse evaluation CSV: {e}")))?;
        let index = index + 1;

        let question = record.get(question_index).unwrap_or_default().trim().to_string();
        let expected_answer = record.get(answer_index).unwrap_or_default().trim().to_string();
        let serial = serial_index
            .and_then(|i| record.get(i))
            .unwrap_or_default()
            .trim()
            .to_string();

        if question.is_empty() && expected_answer.is_empty() {
            continue;
        }
        if question.is_empty() || expected_answer.is_empty() {
            return Err(EvaluationError::Csv(format!(
                "Row {index} must include both input and output values"
            )));
        }

        let number = if serial.is_empty() {
            index.to_string()
        } else {
            serial
        };
        rows.push(EvaluationCsvRow {
            number,
            question,
            expected_answer,
        });
    }

    Ok(rows)
}

/// Extracts the outermost `{...}` object from judge output, tolerating
/// Markdown code fences around it.
pub fn extract_json_object(text: &str) -> Result<String, EvaluationError> {
    let stripped = text.trim();
    if stripped.is_empty() {
        return Err(EvaluationError::JudgeParse(
            "empty response from evaluator".to_string(),
        ));
    }

    let without_fences;
    let stripped = if stripped.starts_with("```") {
        without_fences = stripped
            .lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n");
        without_fences.trim().to_string()
    } else {
        stripped.to_string()
    };

    let start = stripped.find('{');
    let end = stripped.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if end > start => Ok(stripped[start..=end].to_string()),
        _ => Err(EvaluationError::JudgeParse(
            "response did not contain a JSON object".to_string(),
        )),
    }
}

/// Clamps a judge metric to `[0, 100]`. Missing, empty and unparseable
/// strings yield `None`; non-string scalars coerce through zero.
fn percentage_or_none(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    let numeric = match value {
        Value::Null => return None,
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            text.parse::<f64>().ok()?
        }
        Value::Number(number) => number.as_f64().filter(|n| n.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    };
    Some(numeric.clamp(0.0, 100.0))
}

fn round_percentage(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
