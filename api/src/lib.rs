//! HTTP chat surface: named threads with streamed answers, a stateless
//! `/ask`, and provider health.
//!
//! | Method | Path                      | Body / result                               |
//! |--------|---------------------------|---------------------------------------------|
//! | GET    | `/health`                 | provider probes                             |
//! | POST   | `/ask`                    | `{question, history?}` → answer + context   |
//! | GET    | `/chats`                  | titles + current                            |
//! | POST   | `/chats`                  | `{name}` → 201, selects it                  |
//! | GET    | `/chats/{name}`           | thread snapshot                             |
//! | DELETE | `/chats/{name}`           | cancels an in-flight answer                 |
//! | POST   | `/chats/{name}/select`    | makes it current                            |
//! | POST   | `/chats/{name}/questions` | `{question}` → SSE `context/delta/done/error` |
//! | GET    | `/chats/{name}/events`    | SSE `snapshot` per change                   |

pub mod core;
pub mod error_handler;
mod middleware_layer;
mod routes;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use crate::core::app_state::{AppState, ChatMode};
pub use crate::core::chat_store::{ChatStore, ChatsView, DEFAULT_CHAT, QaTurn, ThreadSnapshot};
pub use crate::error_handler::AppError;

use crate::middleware_layer::json_extractor::json_error_mapper;
use crate::routes::{
    ask::ask_question_route::ask_question,
    chats::{
        chat_events_route::chat_events,
        chats_route::{create_chat, delete_chat, get_chat, list_chats, select_chat},
        submit_question_route::submit_question,
    },
    health::health_route::health,
};

/// All routes over shared `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ask", post(ask_question))
        .route("/chats", get(list_chats).post(create_chat))
        .route("/chats/{name}", get(get_chat).delete(delete_chat))
        .route("/chats/{name}/select", post(select_chat))
        .route("/chats/{name}/questions", post(submit_question))
        .route("/chats/{name}/events", get(chat_events))
        .layer(middleware::from_fn(json_error_mapper))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serves until Ctrl+C.
///
/// # Errors
/// [`AppError::Bind`] if `addr` cannot be bound, [`AppError::Server`] if
/// the server stops with an I/O error.
pub async fn start(addr: &str, state: AppState) -> Result<(), AppError> {
    let listener = TcpListener::bind(addr).await.map_err(|source| AppError::Bind {
        addr: addr.to_string(),
        source,
    })?;
    info!(%addr, "chat api listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    info!("chat api stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            // Without a signal handler the server runs until killed.
            warn!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use contextor::testing::{Script, ScriptedChatModel};
    use contextor::{ContextorConfig, RagChain};
    use rag_store::{ChunkStrategy, ChunkingConfig, Document, HashingEmbedder, IngestOptions, MemoryIndex, RagStore};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    async fn soil_store() -> RagStore {
        let store = RagStore::new(
            Arc::new(MemoryIndex::new("langchain_vector")),
            Arc::new(HashingEmbedder::new(256)),
            ChunkingConfig {
                strategy: ChunkStrategy::Recursive,
                size: 60,
                overlap: 0,
            },
            IngestOptions::default(),
        );
        let doc = Document::new(
            "History.txt",
            "the soil types are sand clay silt loam and peat\n\nclay soil holds water\n\nthe castle on the hill was built from grey stone blocks",
        );
        store.ingest_document(&doc).await.unwrap();
        store
    }

    async fn app_with(mode: ChatMode, scripts: Vec<Script>) -> (Router, Arc<ScriptedChatModel>) {
        let model = Arc::new(ScriptedChatModel::new(scripts));
        let mut cfg = ContextorConfig::default();
        cfg.search.score_threshold = 0.2;
        let chain = RagChain::new(model.clone(), soil_store().await, cfg);
        (router(AppState::new(chain, mode)), model)
    }

    async fn app(scripts: Vec<Script>) -> Router {
        app_with(ChatMode::Grounded, scripts).await.0
    }

    fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_req(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    async fn text(res: Response) -> String {
        let bytes = tokio::time::timeout(Duration::from_secs(5), to_bytes(res.into_body(), usize::MAX))
            .await
            .expect("body did not end")
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn json_body(res: Response) -> Value {
        serde_json::from_str(&text(res).await).unwrap()
    }

    async fn snapshot(app: &Router, name: &str) -> Value {
        let res = app.clone().oneshot(empty_req("GET", &format!("/chats/{name}"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        json_body(res).await["data"].clone()
    }

    #[tokio::test]
    async fn thread_lifecycle() {
        let app = app(vec![]).await;

        let res = app.clone().oneshot(json_req("POST", "/chats", json!({"name": "Soil"}))).await.unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(json_body(res).await["data"]["current"], "Soil");

        let dup = app.clone().oneshot(json_req("POST", "/chats", json!({"name": "Soil"}))).await.unwrap();
        assert_eq!(dup.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(dup).await["error"]["code"], "CHAT_EXISTS");

        let blank = app.clone().oneshot(json_req("POST", "/chats", json!({"name": "  "}))).await.unwrap();
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(blank).await["error"]["code"], "EMPTY_CHAT_NAME");

        let sel = app.clone().oneshot(empty_req("POST", "/chats/Intros/select")).await.unwrap();
        assert_eq!(json_body(sel).await["data"]["current"], "Intros");

        let del = app.clone().oneshot(empty_req("DELETE", "/chats/Intros")).await.unwrap();
        let view = json_body(del).await;
        assert_eq!(view["data"]["titles"], json!(["Soil"]));
        assert_eq!(view["data"]["current"], "Soil");

        let missing = app.clone().oneshot(empty_req("GET", "/chats/Intros")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blank_question_is_ignored() {
        let app = app(vec![]).await;
        let res = app
            .clone()
            .oneshot(json_req("POST", "/chats/Intros/questions", json!({"question": "   "})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(snapshot(&app, "Intros").await["turns"], json!([]));
    }

    #[tokio::test]
    async fn question_streams_into_the_thread() {
        let app = app(vec![Script::tokens(["Sand, clay ", "and loam."])]).await;
        let res = app
            .clone()
            .oneshot(json_req(
                "POST",
                "/chats/Intros/questions",
                json!({"question": "What soil types exist?"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let sse = text(res).await;
        let context = sse.find("event: context").unwrap();
        let delta = sse.find("event: delta").unwrap();
        let done = sse.find("event: done").unwrap();
        assert!(context < delta && delta < done);
        assert!(sse.contains("data: and loam."));

        let snap = snapshot(&app, "Intros").await;
        assert_eq!(snap["processing"], false);
        assert_eq!(snap["turns"][0]["question"], "What soil types exist?");
        assert_eq!(snap["turns"][0]["answer"], "Sand, clay and loam.");
    }

    #[tokio::test]
    async fn busy_thread_rejects_a_second_question() {
        let app = app(vec![Script::slow_tokens(["Clay."], Duration::from_millis(200))]).await;
        let first = app
            .clone()
            .oneshot(json_req("POST", "/chats/Intros/questions", json!({"question": "Which holds water?"})))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .clone()
            .oneshot(json_req("POST", "/chats/Intros/questions", json!({"question": "And sand?"})))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(second).await["error"]["code"], "CHAT_BUSY");

        assert!(text(first).await.contains("event: done"));
        assert_eq!(snapshot(&app, "Intros").await["processing"], false);
    }

    #[tokio::test]
    async fn deleting_a_thread_cancels_its_answer() {
        let app = app(vec![Script::slow_tokens(["never", "sent"], Duration::from_secs(30))]).await;
        let res = app
            .clone()
            .oneshot(json_req("POST", "/chats/Intros/questions", json!({"question": "What is loam?"})))
            .await
            .unwrap();

        let del = app.clone().oneshot(empty_req("DELETE", "/chats/Intros")).await.unwrap();
        assert_eq!(json_body(del).await["data"]["titles"], json!(["Intros"]));

        let sse = text(res).await;
        assert!(!sse.contains("event: done"));
        let snap = snapshot(&app, "Intros").await;
        assert_eq!(snap["processing"], false);
        assert_eq!(snap["turns"], json!([]));
    }

    #[tokio::test]
    async fn interrupted_stream_keeps_partial_answer() {
        let app = app(vec![Script::BreakAfter(vec!["Clay ".into()])]).await;
        let res = app
            .clone()
            .oneshot(json_req("POST", "/chats/Intros/questions", json!({"question": "Which holds water?"})))
            .await
            .unwrap();
        let sse = text(res).await;
        assert!(sse.contains("event: error"));
        assert!(sse.contains("StreamInterrupted"));

        let snap = snapshot(&app, "Intros").await;
        assert_eq!(snap["processing"], false);
        assert_eq!(snap["turns"][0]["answer"], "Clay ");
        assert!(snap["turns"][0]["error"].is_string());
    }

    #[tokio::test]
    async fn plain_mode_skips_retrieval() {
        let (app, model) = app_with(ChatMode::Plain, vec![Script::reply("Hi, I'm Reflex!")]).await;
        let res = app
            .clone()
            .oneshot(json_req("POST", "/chats/Intros/questions", json!({"question": "Hello"})))
            .await
            .unwrap();
        let sse = text(res).await;
        assert!(!sse.contains("event: context"));
        assert!(sse.contains("event: done"));
        assert_eq!(model.calls()[0][0].content, contextor::prompt::PLAIN_PERSONA);
    }

    #[tokio::test]
    async fn events_end_when_the_thread_is_deleted() {
        let app = app(vec![]).await;
        app.clone().oneshot(json_req("POST", "/chats", json!({"name": "Soil"}))).await.unwrap();
        let events = app.clone().oneshot(empty_req("GET", "/chats/Soil/events")).await.unwrap();
        assert_eq!(events.status(), StatusCode::OK);

        app.clone().oneshot(empty_req("DELETE", "/chats/Soil")).await.unwrap();
        let sse = text(events).await;
        assert!(sse.contains("event: snapshot"));
        assert!(sse.contains("\"name\":\"Soil\""));
    }

    #[tokio::test]
    async fn stateless_ask_uses_history() {
        let app = app(vec![
            Script::reply("which clay soil holds water"),
            Script::reply("Clay soil holds water."),
        ])
        .await;
        let res = app
            .clone()
            .oneshot(json_req(
                "POST",
                "/ask",
                json!({
                    "question": "Which of them holds water?",
                    "history": [{"question": "What soil types exist?", "answer": "Sand, clay and loam."}],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["answer"], "Clay soil holds water.");
        assert_eq!(body["data"]["standalone_question"], "which clay soil holds water");
    }

    #[tokio::test]
    async fn malformed_body_gets_the_json_envelope() {
        let app = app(vec![]).await;
        let res = app.clone().oneshot(json_req("POST", "/ask", json!({"history": []}))).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "UNPROCESSABLE_ENTITY");
        assert_eq!(body["error"]["details"][0]["path"], "question");
    }

    #[tokio::test]
    async fn health_without_hosted_providers() {
        let app = app(vec![]).await;
        let res = app.oneshot(empty_req("GET", "/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["data"]["ok"], true);
        assert_eq!(body["data"]["chats"], 1);
    }
}
