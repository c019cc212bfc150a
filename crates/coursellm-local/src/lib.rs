//! CourseLLM Local
//!
//! Companion process in front of a local inference engine. It bounds how
//! many generations reach the engine at once, keeps track of the active
//! model, and re-frames the engine's NDJSON as SSE with timing metadata.

pub mod augment;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::{AdmissionMode, LocalConfig};
pub use engine::EngineClient;
pub use error::LocalError;
pub use gate::{AdmissionGate, AdmissionPermit};
pub use models::{ModelState, WarmupOutcome};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<LocalConfig>,
    pub gate: AdmissionGate,
    pub engine: EngineClient,
    pub models: Arc<ModelState>,
}

impl AppState {
    pub fn new(config: LocalConfig, client: reqwest::Client) -> Self {
        let gate = AdmissionGate::new(config.max_concurrent, config.admission, config.queue_timeout());
        let engine = EngineClient::new(client, config.engine_url.clone(), config.keep_alive.clone());
        let models = Arc::new(ModelState::new(
            config.default_model.clone(),
            config.keep_alive_ttl(),
        ));
        Self {
            config: Arc::new(config),
            gate,
            engine,
            models,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(routes::chat_completions))
        .route("/warmup", post(routes::warmup))
        .route("/model", post(routes::set_model))
        .route("/health", get(routes::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
