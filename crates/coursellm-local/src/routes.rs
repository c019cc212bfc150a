//! HTTP handlers for the companion

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use coursellm_core::ChatRequest;

use crate::augment::augment;
use crate::error::LocalError;
use crate::models::WarmupOutcome;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WarmupRequest {
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModelRequest {
    pub model: String,
}

fn requested_model(model: Option<&str>) -> Option<&str> {
    model.map(str::trim).filter(|m| !m.is_empty())
}

/// `POST /v1/chat/completions`
///
/// A `model` in the request becomes the active model for later requests,
/// but only once the engine has accepted it.
pub async fn chat_completions(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, LocalError> {
    let Json(request) = payload?;
    request.validate().map_err(LocalError::InvalidRequest)?;

    let requested = requested_model(request.model.as_deref()).map(str::to_string);
    let model = requested.clone().unwrap_or_else(|| state.models.active());

    let permit = state.gate.acquire().await?;
    info!(
        model = %model,
        in_flight = state.gate.in_flight(),
        "admitted generation"
    );

    let upstream = state.engine.chat(&model, &request).await?;
    if let Some(requested) = requested {
        state.models.set_active(requested);
    }

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(augment(upstream, model, Some(permit))),
    )
        .into_response())
}

/// `POST /warmup`: preload a model without taking a generation slot
pub async fn warmup(
    State(state): State<AppState>,
    payload: Option<Json<WarmupRequest>>,
) -> Result<Json<WarmupOutcome>, LocalError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let model = requested_model(request.model.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| state.models.active());

    let outcome = state
        .models
        .warm(&state.engine, &model, state.config.warmup_timeout())
        .await?;
    Ok(Json(outcome))
}

/// `POST /model`: hot-switch the active model
pub async fn set_model(
    State(state): State<AppState>,
    payload: Result<Json<ModelRequest>, JsonRejection>,
) -> Result<Json<Value>, LocalError> {
    let Json(request) = payload?;
    let model = requested_model(Some(&request.model))
        .ok_or_else(|| LocalError::InvalidRequest("model must not be empty".to_string()))?;

    let previous = state.models.set_active(model);
    Ok(Json(json!({ "active": model, "previous": previous })))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "engine": state.engine.base_url(),
        "active_model": state.models.active(),
        "warm_models": state.models.warm_models(),
        "mode": state.gate.mode().to_string(),
        "max_concurrent": state.gate.max_concurrent(),
        "permits_available": state.gate.available(),
    }))
}
