//! Re-framing engine NDJSON as OpenAI-style SSE with timing metadata
//!
//! Each engine line becomes one `data:` event carrying the content delta
//! and a `meta` object (`token_count`, `elapsed_ms`, `tokens_per_second`).
//! The stream ends with `data: [DONE]` once the engine reports `done`.

use std::convert::Infallible;
use std::fmt::Display;
use std::time::Instant;

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use coursellm_core::{sse_event, ChunkMetadata, SSE_DONE};

use crate::gate::AdmissionPermit;

#[derive(Debug, Default, Deserialize)]
struct EngineLine {
    #[serde(default)]
    message: Option<EngineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EngineMessage {
    #[serde(default)]
    content: String,
}

/// Splits a byte stream into newline-terminated lines
#[derive(Debug, Default)]
struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = line.trim_ascii();
            if !line.is_empty() {
                lines.push(line.to_vec());
            }
        }
        lines
    }

    fn finish(&mut self) -> Vec<Vec<u8>> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim_ascii();
        if rest.is_empty() {
            Vec::new()
        } else {
            vec![rest.to_vec()]
        }
    }
}

enum Frame {
    Event(Bytes),
    Final(Bytes),
    Skip,
    Failed(String),
}

struct TokenMeter {
    model: String,
    started: Instant,
    tokens: u64,
}

impl TokenMeter {
    fn meta(&self, token_count: u64) -> ChunkMetadata {
        ChunkMetadata::new(token_count, self.started.elapsed().as_millis() as u64)
    }

    fn frame(&mut self, line: &[u8]) -> Frame {
        let parsed: EngineLine = match serde_json::from_slice(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("skipping undecodable engine line: {}", e);
                return Frame::Skip;
            }
        };

        if let Some(error) = parsed.error {
            return Frame::Failed(error);
        }

        if parsed.done {
            let total = parsed.eval_count.unwrap_or(self.tokens);
            return Frame::Final(sse_event(&json!({
                "model": self.model,
                "choices": [{ "index": 0, "delta": {}, "finish_reason": "stop" }],
                "meta": self.meta(total),
            })));
        }

        let content = parsed.message.map(|m| m.content).unwrap_or_default();
        if content.is_empty() {
            return Frame::Skip;
        }
        self.tokens += 1;
        Frame::Event(sse_event(&json!({
            "model": self.model,
            "choices": [{ "index": 0, "delta": { "content": content }, "finish_reason": null }],
            "meta": self.meta(self.tokens),
        })))
    }
}

/// Turn an engine body into the companion's SSE body
///
/// `permit` is held until the returned stream finishes or is dropped.
pub fn augment<S, E>(
    upstream: S,
    model: String,
    permit: Option<AdmissionPermit>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    stream! {
        let _permit = permit;
        let mut upstream = Box::pin(upstream);
        let mut framer = LineFramer::default();
        let mut meter = TokenMeter { model, started: Instant::now(), tokens: 0 };
        let mut ended = false;

        while !ended {
            let lines = match upstream.next().await {
                Some(Ok(chunk)) => framer.push(&chunk),
                Some(Err(e)) => {
                    warn!("engine stream interrupted: {}", e);
                    return;
                }
                None => {
                    ended = true;
                    framer.finish()
                }
            };

            for line in lines {
                match meter.frame(&line) {
                    Frame::Event(event) => yield Ok(event),
                    Frame::Final(event) => {
                        yield Ok(event);
                        yield Ok(Bytes::from_static(SSE_DONE.as_bytes()));
                        return;
                    }
                    Frame::Skip => {}
                    Frame::Failed(message) => {
                        warn!("engine reported error mid-stream: {}", message);
                        return;
                    }
                }
            }
        }

        yield Ok(Bytes::from_static(SSE_DONE.as_bytes()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdmissionMode;
    use crate::gate::AdmissionGate;
    use futures::stream;
    use serde_json::Value;

    fn body(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, String>> + Send {
        let items: Vec<Result<Bytes, String>> = parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect();
        stream::iter(items)
    }

    async fn events(
        stream: impl Stream<Item = Result<Bytes, Infallible>>,
    ) -> Vec<String> {
        let chunks: Vec<_> = stream.collect().await;
        chunks
            .into_iter()
            .map(|c| String::from_utf8(c.unwrap().to_vec()).unwrap())
            .collect()
    }

    fn payload(event: &str) -> Value {
        let json = event
            .strip_prefix("data: ")
            .and_then(|e| e.strip_suffix("\n\n"))
            .unwrap();
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let upstream = body(&[
            "{\"message\":{\"content\":\"He\"},\"done\":false}\n{\"mess",
            "age\":{\"content\":\"llo\"},\"done\":false}\n",
            "{\"done\":true,\"eval_count\":2}\n",
        ]);

        let out = events(augment(upstream, "llama3".into(), None)).await;
        assert_eq!(out.len(), 4);

        let first = payload(&out[0]);
        assert_eq!(first["choices"][0]["delta"]["content"], "He");
        assert_eq!(first["meta"]["token_count"], 1);
        assert_eq!(first["model"], "llama3");

        let second = payload(&out[1]);
        assert_eq!(second["choices"][0]["delta"]["content"], "llo");
        assert_eq!(second["meta"]["token_count"], 2);

        let last = payload(&out[2]);
        assert_eq!(last["choices"][0]["finish_reason"], "stop");
        assert_eq!(last["meta"]["token_count"], 2);
        assert!(last["meta"]["elapsed_ms"].is_u64());

        assert_eq!(out[3], SSE_DONE);
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline() {
        let upstream = body(&["{\"message\":{\"content\":\"ok\"}}\n{\"done\":true}"]);
        let out = events(augment(upstream, "llama3".into(), None)).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[2], SSE_DONE);
    }

    #[tokio::test]
    async fn test_eof_without_done_still_terminates() {
        let upstream = body(&["{\"message\":{\"content\":\"partial\"}}\n"]);
        let out = events(augment(upstream, "llama3".into(), None)).await;
        assert_eq!(out.last().map(String::as_str), Some(SSE_DONE));
    }

    #[tokio::test]
    async fn test_interruption_ends_without_done_marker() {
        let upstream = stream::iter(vec![
            Ok(Bytes::from_static(b"{\"message\":{\"content\":\"a\"}}\n")),
            Err("connection reset".to_string()),
        ]);
        let out = events(augment(upstream, "llama3".into(), None)).await;
        assert_eq!(out.len(), 1);
        assert!(!out.iter().any(|e| e == SSE_DONE));
    }

    #[tokio::test]
    async fn test_engine_error_line_ends_stream() {
        let upstream = body(&["{\"error\":\"out of memory\"}\n"]);
        let out = events(augment(upstream, "llama3".into(), None)).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_permit_released_when_stream_dropped() {
        let gate = AdmissionGate::new(1, AdmissionMode::Reject, None);
        let permit = gate.acquire().await.unwrap();
        let upstream = body(&[
            "{\"message\":{\"content\":\"a\"}}\n",
            "{\"message\":{\"content\":\"b\"}}\n",
        ]);

        let mut stream = Box::pin(augment(upstream, "llama3".into(), Some(permit)));
        assert!(stream.next().await.is_some());
        assert_eq!(gate.available(), 0);

        drop(stream);
        assert_eq!(gate.available(), 1);
    }
}
