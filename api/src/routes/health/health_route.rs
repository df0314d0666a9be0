use std::sync::Arc;

use ai_llm_service::health_service::HealthStatus;
use axum::{extract::State, http::StatusCode, response::Response};
use serde::Serialize;

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub chats: usize,
    /// Empty when no hosted provider is configured.
    pub providers: Vec<HealthStatus>,
}

/// Handler: GET /health — probes the chat and embedding providers.
///
/// `503` when any probe fails.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let providers = match &state.llm {
        Some(llm) => llm.health_all().await,
        None => Vec::new(),
    };
    let ok = providers.iter().all(|p| p.ok);
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let report = HealthReport {
        ok,
        chats: state.chats.view().titles.len(),
        providers,
    };
    ApiResponse::success(report).with_status(status)
}
