//! POST /ask — stateless history-aware question.

use std::sync::Arc;

use axum::{Json, extract::State};
use contextor::QaAnswer;
use tracing::info;

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    error_handler::AppResult,
    routes::ask::ask_request::AskRequest,
};

/// Handler: POST /ask
///
/// # Example
/// ```bash
/// curl -X POST http://127.0.0.1:8080/ask \
///   -H 'content-type: application/json' \
///   -d '{"question":"Which of them holds water?",
///        "history":[{"question":"What soil types exist?","answer":"Sand, clay and loam."}]}'
/// ```
pub async fn ask_question(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AskRequest>,
) -> AppResult<ApiResponse<QaAnswer>> {
    let history = body.chat_history();
    let qa = state.chain.ask(&history, &body.question).await?;
    info!(
        history = history.len(),
        context = qa.context.len(),
        "stateless question answered"
    );
    Ok(ApiResponse::success(qa))
}
