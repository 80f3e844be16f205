//! Error mapping from engine failures to HTTP responses.
//!
//! Every error becomes a JSON `{"detail": ...}` body with a status that
//! reflects its stable kind: validation 400, auth 401, payment 402,
//! forbidden 403, not-found 404, unprocessable 422, upstream 502, and 500
//! for service misconfiguration or anything uncategorized. Internal
//! messages never leak credentials or paths outside the upload root.

use crate::auth::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use krira::chat::ChatError;
use krira::evaluation::EvaluationError;
use krira::ingest::LoaderError;
use krira::providers::ai::embedding::EmbeddingError;
use krira::providers::ai::gateway::GatewayError;
use krira::providers::vector::VectorStoreError;
use serde_json::json;
use tracing::error;

pub enum AppError {
    Loader(LoaderError),
    Embedding(EmbeddingError),
    VectorStore(VectorStoreError),
    Gateway(GatewayError),
    Evaluation(EvaluationError),
    Auth(AuthError),
    Validation(String),
    Internal(anyhow::Error),
}

impl From<LoaderError> for AppError {
    fn from(err: LoaderError) -> Self {
        AppError::Loader(err)
    }
}

impl From<EmbeddingError> for AppError {
    fn from(err: EmbeddingError) -> Self {
        AppError::Embedding(err)
    }
}

impl From<VectorStoreError> for AppError {
    fn from(err: VectorStoreError) -> Self {
        AppError::VectorStore(err)
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Gateway(err)
    }
}

/// Chat errors unwrap to their provider error so the status mapping stays
/// in one place.
impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Embedding(inner) => AppError::Embedding(inner),
            ChatError::VectorStore(inner) => AppError::VectorStore(inner),
            ChatError::Gateway(inner) => AppError::Gateway(inner),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<EvaluationError> for AppError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::Embedding(inner) => AppError::Embedding(inner),
            EvaluationError::VectorStore(inner) => AppError::VectorStore(inner),
            EvaluationError::Gateway(inner) => AppError::Gateway(inner),
            other => AppError::Evaluation(other),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            AppError::Loader(err) => {
                error!("LoaderError: {err:?}");
                let status = match &err {
                    LoaderError::UnsupportedType(_)
                    | LoaderError::InvalidChunkSize
                    | LoaderError::InvalidChunkOverlap
                    | LoaderError::MissingUrls => StatusCode::BAD_REQUEST,
                    LoaderError::MissingPath | LoaderError::NotFound(_) => StatusCode::NOT_FOUND,
                    LoaderError::Forbidden => StatusCode::FORBIDDEN,
                    LoaderError::NoContent(_) | LoaderError::Fetch(_) | LoaderError::Parse(_)
                    | LoaderError::Json(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    LoaderError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    (status, "Failed to process dataset".to_string())
                } else {
                    (status, err.to_string())
                }
            }
            AppError::Embedding(err) => {
                error!("EmbeddingError: {err:?}");
                let status = match &err {
                    EmbeddingError::UnsupportedModel(_)
                    | EmbeddingError::UnsupportedDimension { .. }
                    | EmbeddingError::LocalDisabled => StatusCode::BAD_REQUEST,
                    EmbeddingError::MissingApiKey
                    | EmbeddingError::MissingBaseUrl
                    | EmbeddingError::ClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    EmbeddingError::Request(_)
                    | EmbeddingError::Api(_)
                    | EmbeddingError::CountMismatch => StatusCode::BAD_GATEWAY,
                };
                (status, err.to_string())
            }
            AppError::VectorStore(err) => {
                error!("VectorStoreError: {err:?}");
                let status = match &err {
                    VectorStoreError::UnsupportedStore(_)
                    | VectorStoreError::MissingPineconeConfig
                    | VectorStoreError::EmptyApiKey
                    | VectorStoreError::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,
                    VectorStoreError::IndexNotFound(_)
                    | VectorStoreError::ClientBuild(_)
                    | VectorStoreError::Request(_)
                    | VectorStoreError::Upstream(_)
                    | VectorStoreError::Database(_) => StatusCode::BAD_GATEWAY,
                };
                (status, err.to_string())
            }
            AppError::Gateway(err) => {
                error!("GatewayError: {err:?}");
                let status = match &err {
                    GatewayError::MissingApiKey
                    | GatewayError::MissingBaseUrl
                    | GatewayError::ClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    GatewayError::Request(_)
                    | GatewayError::Api(_)
                    | GatewayError::Deserialization(_) => StatusCode::BAD_GATEWAY,
                };
                (status, err.to_string())
            }
            AppError::Evaluation(err) => {
                error!("EvaluationError: {err:?}");
                let status = match &err {
                    EvaluationError::JudgeParse(_) => StatusCode::BAD_GATEWAY,
                    EvaluationError::PathOutsideRoot(_) => StatusCode::FORBIDDEN,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, err.to_string())
            }
            AppError::Auth(err) => {
                error!("AuthError: {err:?}");
                let status = match &err {
                    AuthError::MissingHeader | AuthError::InvalidHeader => StatusCode::UNAUTHORIZED,
                    AuthError::MissingSecret | AuthError::MissingVerifyUrl => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    AuthError::VerifyUnreachable | AuthError::VerifyMalformed => {
                        StatusCode::BAD_GATEWAY
                    }
                    AuthError::VerifyRejected { status, .. } => StatusCode::from_u16(*status)
                        .unwrap_or(StatusCode::BAD_GATEWAY),
                    AuthError::LimitReached(_) => StatusCode::PAYMENT_REQUIRED,
                };
                (status, err.to_string())
            }
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Internal(err) => {
                error!("Internal server error: {err:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
