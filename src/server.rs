use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{GenerationRequest, GenerationResponse, ModelMetadata, ModelRegistry},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ModelRegistry>,
}

pub fn build_router(config: Arc<AppConfig>, registry: Arc<ModelRegistry>) -> Router {
    let state = AppState { registry, config };

    Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate))
        .route("/metadata", get(metadata))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<GenerationResponse>, ServiceError> {
    info!(
        prefix_len = request.prefix.chars().count(),
        temperature = request.temperature,
        n = request.n,
        "generation requested"
    );
    let response = state.registry.generate(request, &state.config).await?;
    Ok(Json(response))
}

async fn metadata(State(state): State<AppState>) -> Json<ModelMetadata> {
    Json(state.registry.metadata())
}
