//! Chat-completion client for the single upstream gateway router.
//!
//! All provider tags resolve to the same OpenAI-compatible endpoint; the
//! gateway routes on the model id. Token usage coming back from the
//! gateway is normalized defensively: the upstream has been observed to
//! return nulls, strings and floats in numeric slots.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway API key is not configured")]
    MissingApiKey,
    #[error("Gateway base URL is not configured")]
    MissingBaseUrl,
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("Failed to send request to the gateway: {0}")]
    Request(reqwest::Error),
    #[error("Gateway returned an error: {0}")]
    Api(String),
    #[error("Failed to deserialize gateway response: {0}")]
    Deserialization(reqwest::Error),
}

/// Normalized token usage for one completion.
///
/// Every core counter is always present and integral, whatever shape the
/// provider returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

/// Coerces raw usage into [`TokenUsage`], preserving unknown keys as
/// untouched metadata.
pub fn normalize_usage(raw: Option<&Value>) -> (TokenUsage, Map<String, Value>) {
    let mut usage = TokenUsage::default();
    let mut metadata = Map::new();

    let Some(Value::Object(entries)) = raw else {
        if raw.is_some() {
            debug!("token usage payload malformed; defaulting to zeros");
        }
        return (usage, metadata);
    };

    for (key, value) in entries {
        match key.as_str() {
            "prompt_tokens" => usage.prompt_tokens = coerce_usage_value(value, key),
            "completion_tokens" => usage.completion_tokens = coerce_usage_value(value, key),
            "total_tokens" => usage.total_tokens = coerce_usage_value(value, key),
            "input_tokens" => usage.input_tokens = coerce_usage_value(value, key),
            "output_tokens" => usage.output_tokens = coerce_usage_value(value, key),
            _ => {
                metadata.insert(key.clone(), value.clone());
            }
        }
    }

    (usage, metadata)
}

fn coerce_usage_value(value: &Value, field: &str) -> i64 {
    match value {
        Value::Null => {
            warn!(field, "token usage field is null; coercing to 0");
            0
        }
        Value::Bool(flag) => {
            warn!(field, value = flag, "token usage field is boolean; coercing to 0");
            0
        }
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                integer
            } else if let Some(float) = number.as_f64() {
                warn!(field, value = float, "token usage field is float; truncating");
                float as i64
            } else {
                warn!(field, "token usage field is out of range; coercing to 0");
                0
            }
        }
        Value::String(text) => match text.trim().parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => {
                warn!(field, value = %text, parsed, "token usage field is a string; parsed");
                parsed as i64
            }
            _ => {
                warn!(field, value = %text, "token usage string is invalid; coercing to 0");
                0
            }
        },
        _ => {
            warn!(field, "token usage field has unsupported type; coercing to 0");
            0
        }
    }
}

/// Per-call overrides for a chat completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Outcome of a chat completion.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub text: String,
    pub usage: TokenUsage,
    pub usage_metadata: Map<String, Value>,
}

#[derive(Serialize, Debug)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for the upstream router fronting every chat provider.
#[derive(Clone, Debug)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
    max_tokens: u32,
}

impl GatewayClient {
    pub fn new(
        base_url: Option<String>,
        api_key: Option<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::ClientBuild)?;
        Ok(Self {
            client,
            base_url,
            api_key,
            max_tokens,
        })
    }

    fn credentials(&self) -> Result<(&str, &str), GatewayError> {
        let key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(GatewayError::MissingApiKey)?;
        let base = self
            .base_url
            .as_deref()
            .filter(|base| !base.trim().is_empty())
            .ok_or(GatewayError::MissingBaseUrl)?;
        Ok((base, key))
    }

    /// Sends a system+user chat completion and returns the answer text
    /// with normalized usage telemetry.
    pub async fn chat(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        options: ChatOptions,
    ) -> Result<ChatOutcome, GatewayError> {
        let (base, key) = self.credentials()?;

        let request_body = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
            temperature: options.temperature,
            stream: false,
        };

        debug!(model, "--> sending chat completion to gateway");
        let response = self
            .client
            .post(format!("{}/chat/completions", base.trim_end_matches('/')))
            .bearer_auth(key)
            .json(&request_body)
            .send()
            .await
            .map_err(GatewayError::Request)?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api(error_text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(GatewayError::Deserialization)?;

        let text = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .unwrap_or_default();
        let (usage, usage_metadata) = normalize_usage(parsed.usage.as_ref());

        Ok(ChatOutcome {
            text,
            usage,
            usage_metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn usage_defaults_to_zeros_when_missing() {
        let (usage, metadata) = normalize_usage(None);
        assert_eq!(usage, TokenUsage::default());
        assert!(metadata.is_empty());
    }

    #[test]
    fn usage_coerces_null_string_and_float_values() {
        let raw = json!({
            "prompt_tokens": null,
            "completion_tokens": "12",
            "total_tokens": 30.9,
            "input_tokens": "not-a-number",
            "output_tokens": true
        });
        let (usage, _) = normalize_usage(Some(&raw));
        assert_eq!(usage.prompt_tokens, 0);
        assert_eq!(usage.completion_tokens, 12);
        assert_eq!(usage.total_tokens, 30);
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.output_tokens, 0);
    }

    #[test]
    fn usage_preserves_unknown_keys_as_metadata() {
        let raw = json!({"total_tokens": 5, "cache_read_tokens": 3, "provider": "x"});
        let (usage, metadata) = normalize_usage(Some(&raw));
        assert_eq!(usage.total_tokens, 5);
        assert_eq!(metadata.get("cache_read_tokens"), Some(&json!(3)));
        assert_eq!(metadata.get("provider"), Some(&json!("x")));
    }

    #[test]
    fn usage_rejects_non_object_payloads() {
        let (usage, metadata) = normalize_usage(Some(&json!("oops")));
        assert_eq!(usage, TokenUsage::default());
        assert!(metadata.is_empty());
    }
}
