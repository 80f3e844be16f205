//! Shared application state and its construction at startup.

use crate::auth::VerificationClient;
use crate::config::{self, AppConfig};
use krira::ingest::DatasetLoader;
use krira::{EngineConfig, RagEngine};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// State handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<RagEngine>,
    pub loader: Arc<DatasetLoader>,
    pub verifier: Arc<VerificationClient>,
}

/// Builds the shared state: the engine with its provider clients, the
/// dataset loader confined to the uploads directory, and the verification
/// client.
pub async fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let engine = RagEngine::new(EngineConfig {
        gateway_base_url: Some(config.fastrouter_base_url.clone()),
        gateway_api_key: config.fastrouter_api_key.clone(),
        gateway_timeout: Duration::from_secs(config.gateway_timeout_secs),
        llm_max_tokens: config.llm_max_tokens,
        judge_model: config::judge_model_from_env(),
        local_vector_dir: PathBuf::from(&config.local_vector_directory),
        pinecone_control_url: config.pinecone_control_url.clone(),
        evaluation_dir: PathBuf::from(&config.evaluation_directory),
        evaluation_concurrency: config.evaluation_concurrency,
        configured_models: config::configured_models_from_env(),
    })?;

    let loader = DatasetLoader::new(&config.uploads_directory)
        .map_err(|e| anyhow::anyhow!("Failed to initialize uploads directory: {e}"))?;

    let verifier = VerificationClient::new(
        config.api_verification_url.clone(),
        config.service_api_secret.clone(),
    )?;

    tracing::info!(
        uploads = %config.uploads_directory,
        vector_dir = %config.local_vector_directory,
        "application state initialized"
    );

    Ok(AppState {
        config: Arc::new(config),
        engine: Arc::new(engine),
        loader: Arc::new(loader),
        verifier: Arc::new(verifier),
    })
}
