//! POST /chats/{name}/questions — answers into a thread, streamed back as SSE.
//!
//! Events, in order: an optional `context` (grounded mode), zero or more
//! `delta`, then exactly one of `done` or `error`. The thread is updated
//! alongside, so `/events` subscribers see the same answer grow.

use std::{convert::Infallible, sync::Arc};

use ai_llm_service::{ChatStream, StreamEvent};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use contextor::{ContextorError, used_chunks};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    core::{
        app_state::{AppState, ChatMode},
        chat_store::{ProcessingGuard, TurnTicket},
    },
    error_handler::AppResult,
    routes::chats::chat_request::QuestionRequest,
};

type EventTx = mpsc::Sender<Result<Event, Infallible>>;

/// Handler: POST /chats/{name}/questions
///
/// `204` for a blank question, `409` while the thread is still answering.
///
/// # Example
/// ```bash
/// curl -N -X POST http://127.0.0.1:8080/chats/Intros/questions \
///   -H 'content-type: application/json' \
///   -d '{"question":"What are the different types of soil?"}'
/// ```
pub async fn submit_question(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<QuestionRequest>,
) -> AppResult<Response> {
    let question = body.question.trim();
    if question.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let ticket = state.chats.begin_turn(&name, question)?;
    let guard = ProcessingGuard::new(state.chats.clone(), &ticket);
    let (tx, rx) = mpsc::channel(32);

    // A delete racing this request aborts the task inside attach_task.
    let task = tokio::spawn(generate(state.clone(), ticket.clone(), guard, tx));
    state.chats.attach_task(&ticket, task.abort_handle());

    Ok(Sse::new(ReceiverStream::new(rx))
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// Runs one answer to completion. A disconnected caller does not stop it;
/// deleting the thread does (the task is aborted and `guard` dropped).
async fn generate(state: Arc<AppState>, ticket: TurnTicket, guard: ProcessingGuard, tx: EventTx) {
    let stream = match open_stream(&state, &ticket, &tx).await {
        Ok(stream) => stream,
        Err(e) => return fail(&state, &ticket, guard, &tx, e).await,
    };

    match relay(&state, &ticket, stream, &tx).await {
        Ok(answer) => {
            drop(guard);
            info!(chat = %ticket.thread, chars = answer.len(), "answer streamed");
            emit(&tx, Event::default().event("done").data(json!({ "answer": answer }).to_string())).await;
        }
        Err(e) => fail(&state, &ticket, guard, &tx, e).await,
    }
}

async fn open_stream(state: &AppState, ticket: &TurnTicket, tx: &EventTx) -> Result<ChatStream, ContextorError> {
    match state.mode {
        ChatMode::Plain => state.chain.chat_plain(&ticket.history, &ticket.question).await,
        ChatMode::Grounded => {
            let grounded = state.chain.ask_streaming(&ticket.history, &ticket.question).await?;
            debug!(
                chat = %ticket.thread,
                standalone = %grounded.standalone_question,
                context = grounded.context.len(),
                "context retrieved"
            );
            let context = json!({
                "standalone_question": grounded.standalone_question,
                "context": used_chunks(&grounded.context),
            });
            emit(tx, Event::default().event("context").data(context.to_string())).await;
            Ok(grounded.stream)
        }
    }
}

/// Forwards deltas to the thread and the caller; returns the full text.
async fn relay(
    state: &AppState,
    ticket: &TurnTicket,
    mut stream: ChatStream,
    tx: &EventTx,
) -> Result<String, ContextorError> {
    let mut answer = String::new();
    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::Delta(text) => {
                if text.is_empty() {
                    continue;
                }
                state.chats.append(ticket, &text);
                answer.push_str(&text);
                // SSE frames are line-based; `\n` is split into data lines, `\r` is not allowed.
                emit(tx, Event::default().event("delta").data(text.replace('\r', ""))).await;
            }
            StreamEvent::Done => break,
            StreamEvent::Failed(source) => {
                return Err(ContextorError::StreamInterrupted { partial: answer, source });
            }
        }
    }
    Ok(answer)
}

async fn fail(state: &AppState, ticket: &TurnTicket, guard: ProcessingGuard, tx: &EventTx, e: ContextorError) {
    warn!(chat = %ticket.thread, error = %e, kind = ?e.kind(), "answer failed");
    state.chats.fail(ticket, &e.to_string());
    drop(guard);
    let body = json!({
        "kind": format!("{:?}", e.kind()),
        "message": e.to_string(),
        "partial": e.partial_answer(),
    });
    emit(tx, Event::default().event("error").data(body.to_string())).await;
}

/// Sends to the caller; a closed connection is not an error.
async fn emit(tx: &EventTx, event: Event) {
    if tx.send(Ok(event)).await.is_err() {
        debug!("sse receiver gone");
    }
}
