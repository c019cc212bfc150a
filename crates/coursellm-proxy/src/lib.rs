//! CourseLLM Proxy
//!
//! Thin HTTP surface over `coursellm-core`: `POST /api/chat` runs the
//! provider chain and streams the winner's body back as server-sent events.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use coursellm_core::FallbackController;

pub use error::ProxyError;

/// Shared, read-only state for every request
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<FallbackController>,
}

impl AppState {
    pub fn new(controller: FallbackController) -> Self {
        Self {
            controller: Arc::new(controller),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(routes::chat))
        .route("/health", get(routes::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
