//! Line framing and per-line decoding for streamed completions.
//!
//! OpenAI-style endpoints send Server-Sent Events (`data: {...}` lines ending
//! with `data: [DONE]`); Ollama sends newline-delimited JSON objects ending
//! with `"done": true`. Network chunks do not respect line boundaries, so
//! bytes are buffered in [`LineBuffer`] until a full line is available.

use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::chat::{StreamEvent, StreamSender};
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{AiLlmError, ProviderError, ProviderErrorKind};

/// Outcome of decoding one complete line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LineEvent {
    /// Text increment to forward.
    Delta(String),
    /// End-of-answer marker.
    Done,
    /// Nothing to forward (keep-alives, comments, empty deltas, role headers).
    Skip,
    /// The line could not be decoded.
    Invalid(String),
}

/// Accumulates raw bytes and yields complete lines.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends a chunk and returns every line it completed (without `\r\n`).
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Remaining bytes once the body ended without a trailing newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        (!rest.is_empty()).then_some(rest)
    }
}

/// Decodes one SSE line of `/chat/completions` with `stream: true`.
///
/// Uses the delta of the last choice; Azure sends an initial chunk with an
/// empty `choices` array (content filter results) which is skipped.
pub(crate) fn decode_openai_sse_line(line: &str) -> LineEvent {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return LineEvent::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return LineEvent::Done;
    }
    let json: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return LineEvent::Invalid(format!("bad SSE payload: {e}")),
    };
    if let Some(err) = json.get("error") {
        return LineEvent::Invalid(format!("provider error in stream: {err}"));
    }
    let content = json
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.last())
        .and_then(|c| c.pointer("/delta/content"))
        .and_then(Value::as_str);
    match content {
        Some(text) if !text.is_empty() => LineEvent::Delta(text.to_string()),
        _ => LineEvent::Skip,
    }
}

/// Decodes one NDJSON line of Ollama `/api/chat` with `stream: true`.
pub(crate) fn decode_ollama_ndjson_line(line: &str) -> LineEvent {
    let line = line.trim();
    if line.is_empty() {
        return LineEvent::Skip;
    }
    let json: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return LineEvent::Invalid(format!("bad NDJSON line: {e}")),
    };
    if let Some(err) = json.get("error").and_then(Value::as_str) {
        return LineEvent::Invalid(err.to_string());
    }
    if json.get("done").and_then(Value::as_bool).unwrap_or(false) {
        return LineEvent::Done;
    }
    match json.pointer("/message/content").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => LineEvent::Delta(text.to_string()),
        _ => LineEvent::Skip,
    }
}

/// Reads a streaming response body to its end and forwards decoded events.
///
/// Exactly one terminal event is sent. Returns early without sending anything
/// further once the receiving side is dropped, which drops the response and
/// closes the connection.
pub(crate) async fn pump(
    resp: reqwest::Response,
    provider: LlmProvider,
    decode: fn(&str) -> LineEvent,
    tx: StreamSender,
) {
    let mut body = resp.bytes_stream();
    let mut lines = LineBuffer::default();
    let mut deltas = 0usize;

    loop {
        let chunk = tokio::select! {
            _ = tx.closed() => {
                debug!(?provider, deltas, "stream receiver dropped; cancelling");
                return;
            }
            chunk = body.next() => chunk,
        };

        let ended = chunk.is_none();
        let complete = match chunk {
            Some(Ok(bytes)) => lines.push(&bytes),
            Some(Err(e)) => {
                warn!(?provider, deltas, error = %e, "stream transport failed");
                let _ = tx.send(StreamEvent::Failed(AiLlmError::HttpTransport(e))).await;
                return;
            }
            None => lines.finish().into_iter().collect(),
        };

        for line in complete {
            let event = match decode(&line) {
                LineEvent::Delta(text) => {
                    deltas += 1;
                    StreamEvent::Delta(text)
                }
                LineEvent::Done => {
                    debug!(?provider, deltas, "stream completed");
                    let _ = tx.send(StreamEvent::Done).await;
                    return;
                }
                LineEvent::Skip => continue,
                LineEvent::Invalid(reason) => {
                    warn!(?provider, deltas, %reason, "stream produced an undecodable line");
                    let err = ProviderError::new(provider, ProviderErrorKind::Stream(reason));
                    let _ = tx.send(StreamEvent::Failed(err.into())).await;
                    return;
                }
            };
            if tx.send(event).await.is_err() {
                return;
            }
        }

        if ended {
            break;
        }
    }

    warn!(?provider, deltas, "stream ended without a completion marker");
    let err = ProviderError::new(
        provider,
        ProviderErrorKind::Stream("body ended without completion marker".into()),
    );
    let _ = tx.send(StreamEvent::Failed(err.into())).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_split_across_chunks_are_reassembled() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"choices\":[{\"del").is_empty());
        let lines = buf.push(b"ta\":{\"content\":\"Hi\"}}]}\r\n\r\ndata: [DO");
        assert_eq!(lines.len(), 2);
        assert_eq!(
            decode_openai_sse_line(&lines[0]),
            LineEvent::Delta("Hi".into())
        );
        assert_eq!(decode_openai_sse_line(&lines[1]), LineEvent::Skip);
        assert_eq!(buf.finish().as_deref(), Some("data: [DO"));
    }

    #[test]
    fn openai_markers() {
        assert_eq!(decode_openai_sse_line("data: [DONE]"), LineEvent::Done);
        assert_eq!(decode_openai_sse_line(": keep-alive"), LineEvent::Skip);
        assert_eq!(
            decode_openai_sse_line(r#"data: {"choices":[],"prompt_filter_results":[]}"#),
            LineEvent::Skip
        );
        assert_eq!(
            decode_openai_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            LineEvent::Skip
        );
        assert!(matches!(
            decode_openai_sse_line("data: {oops"),
            LineEvent::Invalid(_)
        ));
    }

    #[test]
    fn ollama_markers() {
        assert_eq!(
            decode_ollama_ndjson_line(r#"{"message":{"role":"assistant","content":"Clay"},"done":false}"#),
            LineEvent::Delta("Clay".into())
        );
        assert_eq!(
            decode_ollama_ndjson_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#),
            LineEvent::Done
        );
        assert!(matches!(
            decode_ollama_ndjson_line(r#"{"error":"model not found"}"#),
            LineEvent::Invalid(_)
        ));
    }
}
