//! Chat thread management: list, create, select, inspect, delete.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};

use crate::{
    core::{
        app_state::AppState,
        chat_store::{ChatsView, ThreadSnapshot},
        http::response_envelope::ApiResponse,
    },
    error_handler::AppResult,
    routes::chats::chat_request::CreateChatRequest,
};

type Reply<T> = AppResult<ApiResponse<T>>;

/// Handler: GET /chats
pub async fn list_chats(State(state): State<Arc<AppState>>) -> ApiResponse<ChatsView> {
    ApiResponse::success(state.chats.view())
}

/// Handler: POST /chats — creates a thread and selects it.
pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateChatRequest>,
) -> AppResult<Response> {
    let view = state.chats.create(&body.name)?;
    Ok(ApiResponse::success(view).with_status(StatusCode::CREATED))
}

/// Handler: POST /chats/{name}/select
pub async fn select_chat(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Reply<ChatsView> {
    Ok(ApiResponse::success(state.chats.select(&name)?))
}

/// Handler: GET /chats/{name}
pub async fn get_chat(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Reply<ThreadSnapshot> {
    Ok(ApiResponse::success(state.chats.snapshot(&name)?))
}

/// Handler: DELETE /chats/{name} — also cancels an in-flight answer.
pub async fn delete_chat(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Reply<ChatsView> {
    Ok(ApiResponse::success(state.chats.delete(&name)?))
}
