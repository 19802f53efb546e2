//! API routes module

pub mod chat;
pub mod system;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router. Routes are mounted at the root
/// because the web UI and the terminal client address them there.
pub fn router() -> Router<SharedState> {
    Router::new()
        // Streaming chat and chat reset
        .merge(chat::router())
        // Health and model listing
        .merge(system::router())
}
