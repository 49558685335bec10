//! HTTP transport for chat turns and conversation management
//!
//! Routes:
//!
//! - `POST /api/chat/stream` streams [`StreamChunk`]s as server-sent events
//! - `POST /api/chat/interrupt/:session_id` cancels a live session
//! - `GET /api/conversations` lists recent conversations
//! - `GET /api/conversations/:id/messages` returns a conversation's messages
//! - `DELETE /api/conversations/:id` removes a conversation
//! - `POST /api/search` runs the search collaborator directly

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::ChatstreamError;
use crate::orchestrator::{ChatRequest, ChatService, StreamChunk};
use crate::search::SearchResult;
use crate::storage::{ConversationSummary, Message};

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
}

impl AppState {
    pub fn new(service: Arc<ChatService>) -> Self {
        Self { service }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/api/chat/stream", post(handle_chat_stream))
        .route("/api/chat/interrupt/:session_id", post(handle_interrupt))
        .route("/api/conversations", get(handle_conversations))
        .route("/api/conversations/:id/messages", get(handle_messages))
        .route("/api/conversations/:id", delete(handle_delete))
        .route("/api/search", post(handle_search))
        .with_state(state)
}

/// JSON error body returned by non-streaming endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error wrapper mapping domain failures to status codes
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl From<ChatstreamError> for ApiError {
    fn from(err: ChatstreamError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<ChatstreamError>() {
            Some(ChatstreamError::ConversationNotFound(_)) => StatusCode::NOT_FOUND,
            _ => {
                tracing::error!("Request failed: {:#}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Response of the interrupt endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct InterruptResponse {
    pub message: String,
    pub interrupted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Body of `POST /api/search`
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    5
}

fn chunk_event(chunk: &StreamChunk) -> Event {
    match serde_json::to_string(chunk) {
        Ok(json) => Event::default().data(json),
        Err(e) => Event::default().data(
            serde_json::json!({"type": "error", "error": e.to_string()}).to_string(),
        ),
    }
}

async fn handle_root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: format!("chatstream {}", env!("CARGO_PKG_VERSION")),
    })
}

async fn handle_chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let started = state.service.start_turn(request).await;

    let sse_stream = async_stream::stream! {
        let turn = match started {
            Ok(turn) => turn,
            Err(e) => {
                tracing::warn!("Chat turn rejected: {:#}", e);
                let chunk = StreamChunk::Error {
                    error: e.to_string(),
                    conversation_id: None,
                };
                yield Ok(chunk_event(&chunk));
                return;
            }
        };

        let conversation_id = turn.conversation_id;
        let mut chunks = turn.stream;
        while let Some(item) = chunks.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => StreamChunk::Error {
                    error: e.to_string(),
                    conversation_id: Some(conversation_id.clone()),
                },
            };
            yield Ok(chunk_event(&chunk));
        }
    };

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

async fn handle_interrupt(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<InterruptResponse> {
    let interrupted = state.service.interrupt(&session_id);
    let message = if interrupted {
        "Chat interrupted"
    } else {
        "No active stream with that id"
    };
    Json(InterruptResponse {
        message: message.to_string(),
        interrupted,
    })
}

async fn handle_conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    Ok(Json(state.service.conversations()?))
}

async fn handle_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.service.history(&id)?))
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.service.delete_conversation(&id)? {
        return Err(ChatstreamError::ConversationNotFound(id).into());
    }
    Ok(Json(MessageResponse {
        message: "Conversation deleted".to_string(),
    }))
}

async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Json<Vec<SearchResult>> {
    let results = match state.service.search_provider() {
        Some(search) => search.search(&request.query, request.max_results).await,
        None => Vec::new(),
    };
    Json(results)
}
