//! Router for health checks and model listing

use std::sync::{Arc, RwLock};

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};

use super::public::{AvailableModelsResponse, HealthResponse, ModelsResponse};
use crate::api::state::AppState;
use crate::ollama::SharedModelRunner;

type SharedState = Arc<RwLock<AppState>>;

fn runner(state: &SharedState) -> SharedModelRunner {
    let shared_state = state.read().expect("Unable to read shared state");
    Arc::clone(&shared_state.runner)
}

/// Check that the model binary can be executed
async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    match runner(&state).version().await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse::Healthy {
                status: "healthy".to_string(),
                ollama: "accessible".to_string(),
            }),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::Unhealthy {
                    status: "unhealthy".to_string(),
                    error: e.to_string(),
                }),
            )
        }
    }
}

/// List the models installed for the model binary
async fn models(State(state): State<SharedState>) -> (StatusCode, Json<ModelsResponse>) {
    match runner(&state).list().await {
        Ok(models) => (StatusCode::OK, Json(ModelsResponse::Models { models })),
        Err(e) => {
            tracing::error!("Failed to list models: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ModelsResponse::Error {
                    error: e.to_string(),
                }),
            )
        }
    }
}

/// The allow-list of models clients may select
async fn available_models(State(state): State<SharedState>) -> Json<AvailableModelsResponse> {
    let shared_state = state.read().expect("Unable to read shared state");
    Json(AvailableModelsResponse {
        models: shared_state.config.available_models.clone(),
        default_model: shared_state.config.default_model.clone(),
    })
}

/// Create the system router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health))
        .route("/models", get(models))
        .route("/config/models", get(available_models))
}
