use crate::{handlers, state::AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Creates the Axum router with all application routes.
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::general::health_check))
        .route("/uploaddataset", post(handlers::dataset::upload_dataset))
        .route("/embed", post(handlers::embedding::embed_datasets))
        .route("/api/llm/models", get(handlers::llm::list_models))
        .route("/api/llm/test", post(handlers::llm::test_configuration))
        .route(
            "/api/llm/evaluate",
            post(handlers::llm::evaluate_configuration),
        )
        .route("/v1/chat", post(handlers::chat::chat_with_pipeline))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}
