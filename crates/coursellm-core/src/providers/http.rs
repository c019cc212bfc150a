//! Shared outbound POST for OpenAI-compatible streaming endpoints

use futures::StreamExt;

use super::error::{ProviderError, ProviderResult};
use super::traits::UpstreamStream;
use crate::logging::SharedLogger;
use crate::{log_debug, log_info, log_warn};
use crate::types::{CancellationToken, UpstreamPayload};

/// POST `payload` to `url` and hand back the unread response body
///
/// Non-2xx responses are read in full and returned as `UpstreamRejected` with
/// the raw body text. Connection failures become `UpstreamUnreachable`.
/// Cancellation while waiting for headers aborts the request.
pub(crate) async fn post_streaming(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    payload: &UpstreamPayload,
    provider: &str,
    cancel_token: &CancellationToken,
    logger: &SharedLogger,
) -> ProviderResult<UpstreamStream> {
    let mut request = client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .json(payload);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    log_info!(
        logger,
        "[{}] dispatching model={} messages={} to {}",
        provider,
        payload.model,
        payload.messages.len(),
        url
    );

    let response = tokio::select! {
        _ = cancel_token.cancelled() => {
            log_info!(logger, "[{}] cancelled before upstream responded", provider);
            return Err(ProviderError::Cancelled);
        }
        result = request.send() => {
            result.map_err(|e| ProviderError::from_send_error(provider, e))?
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                log_warn!(logger, "[{}] could not read upstream error body: {}", provider, e);
                format!("<unreadable upstream body: {}>", e)
            }
        };
        log_warn!(
            logger,
            "[{}] upstream rejected request: {} {}",
            provider, status, body
        );
        return Err(ProviderError::rejected(provider, status.as_u16(), body));
    }

    log_debug!(logger, "[{}] upstream accepted, streaming", provider);

    let provider = provider.to_string();
    let stream = response
        .bytes_stream()
        .map(move |chunk| chunk.map_err(|e| ProviderError::interrupted(provider.clone(), e.to_string())));

    Ok(Box::pin(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::types::{ChatMessage, ChatRequest};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers one request with a 500 whose body is cut short
    async fn truncated_error_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_ascii_lowercase();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 100\r\n\r\npartial")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_unreadable_error_body_is_reported() {
        let url = truncated_error_server().await;
        let payload = ChatRequest::new(vec![ChatMessage::user("hi")]).to_upstream("llama3-8b-8192");
        let logger: SharedLogger = Arc::new(NoOpLogger);

        let result = post_streaming(
            &reqwest::Client::new(),
            &url,
            None,
            &payload,
            "groq",
            &CancellationToken::new(),
            &logger,
        )
        .await;

        match result {
            Err(ProviderError::UpstreamRejected { status, body, .. }) => {
                assert_eq!(status, 500);
                assert!(body.starts_with("<unreadable upstream body:"), "body: {}", body);
            }
            other => panic!("expected rejection, got {:?}", other.map(|_| ())),
        }
    }
}
