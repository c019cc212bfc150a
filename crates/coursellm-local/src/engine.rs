//! HTTP client for an Ollama-compatible inference engine

use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use coursellm_core::{ChatMessage, ChatRequest};

use crate::error::LocalError;

/// Raw NDJSON body from `/api/chat`
pub type EngineStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

#[derive(Debug, Serialize)]
struct EngineOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct EngineChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: EngineOptions,
    keep_alive: &'a str,
}

/// Full text of a non-2xx engine response, or a note saying why it is missing
async fn error_body(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!("could not read engine error body: {}", e);
            format!("<unreadable upstream body: {}>", e)
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineClient {
    client: reqwest::Client,
    base_url: String,
    keep_alive: String,
}

impl EngineClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, keep_alive: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            keep_alive: keep_alive.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a streaming chat generation on `model`
    pub async fn chat(&self, model: &str, request: &ChatRequest) -> Result<EngineStream, LocalError> {
        let body = EngineChatRequest {
            model,
            messages: &request.messages,
            stream: true,
            options: EngineOptions {
                temperature: request.resolved_temperature(),
                num_predict: request.resolved_max_tokens(),
            },
            keep_alive: &self.keep_alive,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LocalError::EngineUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LocalError::Engine {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }

        debug!(model, "engine accepted chat request");
        Ok(response.bytes_stream().boxed())
    }

    /// Load `model` into memory with an empty prompt
    pub async fn warm(&self, model: &str) -> Result<(), LocalError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&json!({
                "model": model,
                "prompt": "",
                "stream": false,
                "keep_alive": self.keep_alive,
            }))
            .send()
            .await
            .map_err(|e| LocalError::EngineUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LocalError::Engine {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }
        Ok(())
    }
}
