//! Embedding generation through the gateway's OpenAI-compatible endpoint.
//!
//! The model set is a closed registry keyed by tag. Hosted models support a
//! small menu of output dimensions; the local CPU model is recognized but
//! disabled by deployment policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Hosted provider calls are batched to keep request bodies bounded.
const EMBEDDING_BATCH_SIZE: usize = 64;

/// Fixed output dimension of the local CPU model.
pub const LOCAL_EMBEDDING_DIMENSION: u32 = 384;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Unsupported embedding model '{0}'")]
    UnsupportedModel(String),
    #[error("Dimension {requested} is not supported for {model} embeddings. Choose one of {options}.")]
    UnsupportedDimension {
        model: &'static str,
        requested: u32,
        options: String,
    },
    #[error("Local embeddings are currently disabled; use a hosted embedding model instead")]
    LocalDisabled,
    #[error("Gateway API key is not configured for embeddings")]
    MissingApiKey,
    #[error("Gateway base URL is not configured for embeddings")]
    MissingBaseUrl,
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("Failed to send request to the embeddings API: {0}")]
    Request(reqwest::Error),
    #[error("Embeddings API returned an error: {0}")]
    Api(String),
    #[error("Embedding count does not match chunk count")]
    CountMismatch,
}

/// The closed set of embedding models. Hosted tags accept their upstream
/// model ids as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingModel {
    #[serde(rename = "openai-small", alias = "text-embedding-3-small")]
    OpenaiSmall,
    #[serde(rename = "openai-large", alias = "text-embedding-3-large")]
    OpenaiLarge,
    #[serde(rename = "huggingface")]
    Huggingface,
}

impl EmbeddingModel {
    pub fn parse(tag: &str) -> Result<Self, EmbeddingError> {
        match tag.trim() {
            "openai-small" | "text-embedding-3-small" => Ok(EmbeddingModel::OpenaiSmall),
            "openai-large" | "text-embedding-3-large" => Ok(EmbeddingModel::OpenaiLarge),
            "huggingface" => Ok(EmbeddingModel::Huggingface),
            other => Err(EmbeddingError::UnsupportedModel(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingModel::OpenaiSmall => "openai-small",
            EmbeddingModel::OpenaiLarge => "openai-large",
            EmbeddingModel::Huggingface => "huggingface",
        }
    }

    /// Model id sent to the gateway for hosted tags.
    fn target_model(&self) -> &'static str {
        match self {
            EmbeddingModel::OpenaiSmall => "openai/text-embedding-3-small",
            EmbeddingModel::OpenaiLarge => "openai/text-embedding-3-large",
            EmbeddingModel::Huggingface => "",
        }
    }

    /// Allowed output dimensions; the first entry is the default.
    pub fn dimension_options(&self) -> &'static [u32] {
        match self {
            EmbeddingModel::OpenaiSmall => &[1536, 512],
            EmbeddingModel::OpenaiLarge => &[3072, 1024, 256],
            EmbeddingModel::Huggingface => &[LOCAL_EMBEDDING_DIMENSION],
        }
    }

    pub fn resolve_dimension(&self, requested: Option<u32>) -> Result<u32, EmbeddingError> {
        let options = self.dimension_options();
        match requested {
            None => Ok(options[0]),
            Some(dimension) if options.contains(&dimension) => Ok(dimension),
            Some(dimension) => Err(EmbeddingError::UnsupportedDimension {
                model: self.as_str(),
                requested: dimension,
                options: options
                    .iter()
                    .map(|option| option.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

#[derive(Serialize, Debug)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    dimensions: u32,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Translates lists of text into fixed-dimension vectors via the gateway.
#[derive(Clone, Debug)]
pub struct EmbeddingService {
    client: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl EmbeddingService {
    pub fn new(
        base_url: Option<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(EmbeddingError::ClientBuild)?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Generates embeddings for the provided texts.
    ///
    /// Empty texts are dropped before calling the provider, so the output
    /// has exactly one vector per non-empty input, in input order, all of
    /// equal length.
    pub async fn generate(
        &self,
        model: EmbeddingModel,
        texts: &[String],
        dimensions: Option<u32>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let payload: Vec<&str> = texts
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .collect();
        if payload.is_empty() {
            return Ok(Vec::new());
        }

        if model == EmbeddingModel::Huggingface {
            if let Some(requested) = dimensions {
                if requested != LOCAL_EMBEDDING_DIMENSION {
                    return Err(EmbeddingError::UnsupportedDimension {
                        model: model.as_str(),
                        requested,
                        options: LOCAL_EMBEDDING_DIMENSION.to_string(),
                    });
                }
            }
            return Err(EmbeddingError::LocalDisabled);
        }

        let dimension = model.resolve_dimension(dimensions)?;
        let target = model.target_model();
        let key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(EmbeddingError::MissingApiKey)?;
        let base = self
            .base_url
            .as_deref()
            .filter(|base| !base.trim().is_empty())
            .ok_or(EmbeddingError::MissingBaseUrl)?;
        let url = format!("{}/embeddings", base.trim_end_matches('/'));

        let mut embeddings = Vec::with_capacity(payload.len());
        for batch in payload.chunks(EMBEDDING_BATCH_SIZE) {
            debug!(
                model = target,
                batch = batch.len(),
                dimension,
                "requesting embeddings batch"
            );
            let request_body = EmbeddingRequest {
                model: target,
                input: batch,
                dimensions: dimension,
            };
            let response = self
                .client
                .post(&url)
                .bearer_auth(key)
                .json(&request_body)
                .send()
                .await
                .map_err(EmbeddingError::Request)?;

            if !response.status().is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(EmbeddingError::Api(error_text));
            }

            let parsed: EmbeddingResponse = response
                .json()
                .await
                .map_err(|e| EmbeddingError::Api(format!("Deserialization error: {e}")))?;
            embeddings.extend(parsed.data.into_iter().map(|item| item.embedding));
        }

        Ok(embeddings)
    }
}
