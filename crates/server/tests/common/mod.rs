//! Shared test harness: spawns the real server on a random port with all
//! external services pointed at one `httpmock` instance.

#![allow(unused)]

use anyhow::Result;
use httpmock::MockServer;
use krira_server::{config::AppConfig, router::create_router, state::build_app_state};
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub mock_server: MockServer,
    _uploads_dir: TempDir,
    _vector_dir: TempDir,
    _evaluation_dir: TempDir,
    _server_handle: JoinHandle<()>,
}

impl TestApp {
    /// Spawns the application with mock gateway, verification service and
    /// managed-index control plane.
    pub async fn spawn() -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .compact()
            .try_init();

        let mock_server = MockServer::start();
        let uploads_dir = tempfile::tempdir()?;
        let vector_dir = tempfile::tempdir()?;
        let evaluation_dir = tempfile::tempdir()?;

        let config = AppConfig {
            port: 0,
            environment: "test".to_string(),
            uploads_directory: uploads_dir.path().display().to_string(),
            local_vector_directory: vector_dir.path().display().to_string(),
            fastrouter_api_key: Some("test-gateway-key".to_string()),
            fastrouter_base_url: mock_server.base_url(),
            llm_max_tokens: 512,
            gateway_timeout_secs: 5,
            evaluation_directory: evaluation_dir.path().display().to_string(),
            evaluation_concurrency: 3,
            api_verification_url: Some(mock_server.url("/api/verify")),
            service_api_secret: Some("shared-secret".to_string()),
            pinecone_control_url: Some(mock_server.base_url()),
        };

        let app_state = build_app_state(config).await?;
        let app = create_router(app_state);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let address = format!("http://{addr}");

        let server_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("[TestApp] server error: {e}");
            }
        });

        Ok(Self {
            address,
            client: reqwest::Client::new(),
            mock_server,
            _uploads_dir: uploads_dir,
            _vector_dir: vector_dir,
            _evaluation_dir: evaluation_dir,
            _server_handle: server_handle,
        })
    }
}
