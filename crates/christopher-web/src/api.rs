//! REST API route handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use christopher_kernel::{FallbackReason, HandlerContext, HandlerSummary};
use christopher_store::ThreadMessage;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::state::AppState;

/// Context key under which the thread id is passed to handlers.
pub const THREAD_CONTEXT_KEY: &str = "thread_id";

// ---------------------------------------------------------------------------
// POST /chat
// ---------------------------------------------------------------------------

/// Request body for the `/chat` endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Response body for the `/chat` endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    /// Id of the handler that produced `response`.
    pub handler: String,
    pub failed: bool,
    pub fallback: Option<FallbackReason>,
}

fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// Route one message through the pipeline and return the reply.
///
/// When `thread_id` is given, the user message and the reply are recorded
/// in that thread, with the reply attributed to the handler that produced it.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatBody>,
) -> (StatusCode, Json<Value>) {
    if body.message.trim().is_empty() {
        return bad_request("message must not be empty");
    }
    let thread_id = match body.thread_id.as_deref().map(str::trim) {
        Some("") => return bad_request("thread_id must not be blank"),
        other => other,
    };

    let mut context = HandlerContext::new();
    if let Some(id) = thread_id {
        context.insert(THREAD_CONTEXT_KEY.to_owned(), id.to_owned());
    }

    let reply = state.pipeline.run(&body.message, &context).await;

    if let Some(id) = thread_id
        && let Err(e) =
            state
                .threads
                .record_exchange(id, &body.message, &reply.handler_id, &reply.result.text)
    {
        tracing::warn!(thread_id = %id, error = %e, "failed to record exchange");
    }

    let response = ChatResponse {
        response: reply.result.text,
        handler: reply.handler_id,
        failed: reply.result.failed,
        fallback: reply.fallback,
    };
    (StatusCode::OK, Json(json!(response)))
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadList {
    pub threads: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadView {
    pub thread_id: String,
    pub messages: Vec<ThreadMessage>,
}

/// `GET /threads`
pub async fn list_threads(State(state): State<Arc<AppState>>) -> Json<ThreadList> {
    Json(ThreadList {
        threads: state.threads.list_threads(),
    })
}

/// `GET /thread/{id}`.  Unknown threads are empty, not 404.
pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Json<ThreadView> {
    let messages = state.threads.get_thread(&thread_id);
    Json(ThreadView {
        thread_id,
        messages,
    })
}

// ---------------------------------------------------------------------------
// Introspection
// ---------------------------------------------------------------------------

/// `GET /handlers`
pub async fn handlers(State(state): State<Arc<AppState>>) -> Json<Vec<HandlerSummary>> {
    Json(state.pipeline.registry().list())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub handlers: usize,
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        handlers: state.pipeline.registry().len(),
    })
}
