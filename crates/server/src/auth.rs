//! Bearer extraction and the external key-verification / usage-tracking
//! collaborator.

use krira::types::PipelineConfig;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Deadline for calls to the verification service.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Invalid Authorization header")]
    InvalidHeader,
    #[error("SERVICE_API_SECRET is not configured")]
    MissingSecret,
    #[error("API_VERIFICATION_URL is not configured")]
    MissingVerifyUrl,
    #[error("Unable to verify API key")]
    VerifyUnreachable,
    #[error("Verification service returned an unexpected body")]
    VerifyMalformed,
    #[error("{message}")]
    VerifyRejected { status: u16, message: String },
    #[error("{0}")]
    LimitReached(String),
}

/// Pulls the bearer token out of an `Authorization` header value.
pub fn extract_bearer_token(authorization: Option<&str>) -> Result<&str, AuthError> {
    let authorization = authorization.ok_or(AuthError::MissingHeader)?;
    let (scheme, token) = authorization
        .split_once(' ')
        .ok_or(AuthError::InvalidHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidHeader);
    }
    Ok(token)
}

#[derive(Deserialize, Debug, Default)]
struct VerificationEnvelope {
    #[serde(default)]
    pipeline: Option<PipelineConfig>,
    // Legacy root key kept for older deployments of the verification
    // service.
    #[serde(default)]
    bot: Option<PipelineConfig>,
}

#[derive(Deserialize, Debug)]
struct ServiceMessage {
    #[serde(default)]
    message: Option<String>,
}

/// Client for the external service that authorizes pipeline chat calls and
/// tracks usage.
#[derive(Debug, Clone)]
pub struct VerificationClient {
    http: reqwest::Client,
    verify_url: Option<String>,
    service_secret: Option<String>,
}

impl VerificationClient {
    pub fn new(verify_url: Option<String>, service_secret: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(VERIFY_TIMEOUT).build()?;
        Ok(Self {
            http,
            verify_url,
            service_secret,
        })
    }

    fn credentials(&self) -> Result<(&str, &str), AuthError> {
        let secret = self
            .service_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
            .ok_or(AuthError::MissingSecret)?;
        let url = self
            .verify_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(AuthError::MissingVerifyUrl)?;
        Ok((url, secret))
    }

    /// Verifies the API key for a pipeline and returns its configuration.
    /// Non-200 responses propagate their status and message to the caller.
    pub async fn verify(
        &self,
        api_key: &str,
        pipeline_name: &str,
    ) -> Result<PipelineConfig, AuthError> {
        let (url, secret) = self.credentials()?;

        let response = self
            .http
            .post(url.trim_end_matches('/'))
            .header("x-service-key", secret)
            .json(&json!({ "apiKey": api_key, "pipelineName": pipeline_name }))
            .send()
            .await
            .map_err(|error| {
                warn!(%error, "key verification request failed");
                AuthError::VerifyUnreachable
            })?;

        let status = response.status();
        if status == StatusCode::OK {
            let envelope: VerificationEnvelope =
                response.json().await.map_err(|_| AuthError::VerifyMalformed)?;
            return Ok(envelope.pipeline.or(envelope.bot).unwrap_or_default());
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);
        let body = response.text().await.unwrap_or_default();
        let message = if is_json {
            serde_json::from_str::<ServiceMessage>(&body)
                .ok()
                .and_then(|parsed| parsed.message)
                .unwrap_or(body)
        } else {
            body
        };
        let message = if message.trim().is_empty() {
            "API key verification failed".to_string()
        } else {
            message
        };

        Err(AuthError::VerifyRejected {
            status: status.as_u16(),
            message,
        })
    }

    /// Best-effort usage tracking after a successful chat. A `402` becomes
    /// a client-visible limit error; every other failure is swallowed.
    pub async fn track_usage(
        &self,
        api_key: &str,
        pipeline_name: &str,
        tokens: i64,
    ) -> Result<(), AuthError> {
        let Ok((url, secret)) = self.credentials() else {
            return Ok(());
        };

        let root = url.trim_end_matches('/');
        let track_url = match root.rsplit_once('/') {
            Some((base, _)) => format!("{base}/track-usage"),
            None => format!("{root}/track-usage"),
        };

        let response = self
            .http
            .post(&track_url)
            .header("x-service-key", secret)
            .json(&json!({
                "apiKey": api_key,
                "pipelineName": pipeline_name,
                "tokens": tokens
            }))
            .send()
            .await;

        match response {
            Ok(response) if response.status() == StatusCode::PAYMENT_REQUIRED => {
                let message = response
                    .json::<ServiceMessage>()
                    .await
                    .ok()
                    .and_then(|parsed| parsed.message)
                    .unwrap_or_else(|| "Request limit reached".to_string());
                Err(AuthError::LimitReached(message))
            }
            Ok(_) => Ok(()),
            Err(error) => {
                debug!(%error, "usage tracking failed; continuing");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_extraction_accepts_case_insensitive_scheme() {
        assert_eq!(extract_bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert_eq!(extract_bearer_token(Some("bearer xyz")).unwrap(), "xyz");
    }

    #[test]
    fn bearer_extraction_rejects_missing_or_malformed_headers() {
        assert!(matches!(
            extract_bearer_token(None),
            Err(AuthError::MissingHeader)
        ));
        assert!(matches!(
            extract_bearer_token(Some("Basic abc")),
            Err(AuthError::InvalidHeader)
        ));
        assert!(matches!(
            extract_bearer_token(Some("Bearer ")),
            Err(AuthError::InvalidHeader)
        ));
        assert!(matches!(
            extract_bearer_token(Some("token-with-no-scheme")),
            Err(AuthError::InvalidHeader)
        ));
    }
}
