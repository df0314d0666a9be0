//! Rewrites axum's plain-text body rejections into the JSON envelope.

use axum::{
    body::{Body, Bytes},
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::core::http::response_envelope::{ApiErrorDetail, ApiResponse};

const REQUEST_ID: &str = "x-request-id";

/// Rejection bodies are short; anything larger is left alone.
const MAX_REJECTION_BYTES: usize = 64 * 1024;

async fn take_body(res: Response) -> (axum::http::response::Parts, Bytes) {
    let (parts, body) = res.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_REJECTION_BYTES)
        .await
        .unwrap_or_default();
    (parts, bytes)
}

/// Field named in a serde message such as "missing field `question` at line 1 column 2".
fn field_from_serde_msg(msg: &str) -> Option<String> {
    let start = msg.find('`')? + 1;
    let len = msg[start..].find('`')?;
    Some(msg[start..start + len].to_string())
}

fn hint_for(msg: &str) -> Option<String> {
    if msg.contains("missing field") {
        Some("Add the missing field to the JSON body.".into())
    } else if msg.contains("expected a sequence") {
        Some("Expected an array for this field (e.g. [{\"question\": \"…\", \"answer\": \"…\"}]).".into())
    } else if msg.contains("expected a string") {
        Some("Expected a string for this field.".into())
    } else if msg.contains("expected a map") || msg.contains("expected struct") {
        Some("Expected a JSON object here (e.g. { \"question\": \"…\" }).".into())
    } else {
        None
    }
}

fn ensure_request_id(parts: &mut axum::http::response::Parts) -> String {
    if let Some(v) = parts.headers.get(REQUEST_ID).and_then(|h| h.to_str().ok()) {
        if !v.trim().is_empty() {
            return v.to_string();
        }
    }
    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1000);
    let id = format!("req-{nanos}");
    if let Ok(value) = HeaderValue::from_str(&id) {
        parts.headers.insert(REQUEST_ID, value);
    }
    id
}

fn is_json(parts: &axum::http::response::Parts) -> bool {
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Maps 400/422 responses that are not already JSON (extractor rejections).
pub async fn json_error_mapper(req: Request<Body>, next: Next) -> Response {
    let res = next.run(req).await;
    let status = res.status();

    if !(status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY) {
        return res;
    }
    let (mut parts, bytes) = take_body(res).await;
    if is_json(&parts) {
        return Response::from_parts(parts, bytes.into());
    }

    let original = String::from_utf8_lossy(&bytes);
    let request_id = ensure_request_id(&mut parts);
    tracing::debug!(%request_id, %status, body = %original.trim(), "request rejected");

    let detail = ApiErrorDetail {
        path: field_from_serde_msg(&original),
        hint: hint_for(&original),
    };
    let envelope = ApiResponse::<()>::error(
        if status == StatusCode::BAD_REQUEST {
            "BAD_REQUEST"
        } else {
            "UNPROCESSABLE_ENTITY"
        },
        original.trim(),
        vec![detail],
    );

    let body = match serde_json::to_vec(&envelope) {
        Ok(v) => v,
        Err(_) => bytes.to_vec(),
    };
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Response::from_parts(parts, body.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_field_and_hint_from_serde_messages() {
        let msg = "Failed to deserialize the JSON body into the target type: missing field `question` at line 1 column 2";
        assert_eq!(field_from_serde_msg(msg).as_deref(), Some("question"));
        assert!(hint_for(msg).unwrap().contains("missing field"));
        assert_eq!(field_from_serde_msg("EOF while parsing"), None);
        assert_eq!(hint_for("EOF while parsing"), None);
    }
}
