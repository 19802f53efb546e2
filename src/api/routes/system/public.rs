//! Public types for the health and model listing API
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum HealthResponse {
    Healthy { status: String, ollama: String },
    Unhealthy { status: String, error: String },
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ModelsResponse {
    Models { models: Vec<String> },
    Error { error: String },
}

/// The models the server accepts in `/stream_chat`
#[derive(Debug, Deserialize, Serialize)]
pub struct AvailableModelsResponse {
    pub models: Vec<String>,
    pub default_model: String,
}
