//! GET /chats/{name}/events — live thread snapshots as server-sent events.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use tokio_stream::{StreamExt, wrappers::WatchStream};

use crate::{
    core::{app_state::AppState, chat_store::ThreadSnapshot},
    error_handler::AppResult,
};

/// Emits the current snapshot, then one `snapshot` event per change.
/// The stream ends when the thread is deleted.
pub async fn chat_events(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let updates = state.chats.subscribe(&name)?;
    let events = WatchStream::new(updates).map(|snap| Ok(snapshot_event(&snap)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn snapshot_event(snap: &ThreadSnapshot) -> Event {
    Event::default()
        .event("snapshot")
        .json_data(snap)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}
