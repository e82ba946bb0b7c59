//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ErrorResponse, MessageRequest, MessagesResponse, PuzzleListResponse, PuzzleSummary,
    RepliesResponse, SessionResponse,
};
use super::AppState;
use crate::runtime::{DispatchError, PuzzleStore, SessionStore, SseEvent, StoreError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // User lifecycle
        .route("/api/users/:id/join", post(join))
        .route("/api/users/:id/leave", post(leave))
        // Conversation
        .route("/api/users/:id/messages", post(send_message).get(get_messages))
        .route("/api/users/:id/stream", get(stream_user))
        .route("/api/users/:id/session", get(get_session))
        // Catalog
        .route("/api/puzzles", get(list_puzzles))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// User Lifecycle
// ============================================================

async fn join(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<RepliesResponse>, AppError> {
    let replies = state.runtime.on_user_joined(&user_id).await?;
    Ok(Json(RepliesResponse { replies }))
}

async fn leave(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<RepliesResponse>, AppError> {
    let replies = state.runtime.on_user_left(&user_id).await?;
    Ok(Json(RepliesResponse { replies }))
}

// ============================================================
// Conversation
// ============================================================

async fn send_message(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<RepliesResponse>, AppError> {
    let replies = state.runtime.on_message(&user_id, &req.text).await?;
    Ok(Json(RepliesResponse { replies }))
}

async fn get_messages(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<MessagesResponse>, AppError> {
    let messages = state
        .runtime
        .storage()
        .database()
        .get_messages(&user_id)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(MessagesResponse { messages }))
}

async fn stream_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, AppError> {
    // Users without a session get no runtime
    state.runtime.storage().get_session(&user_id).await?;
    let broadcast_rx = state.runtime.subscribe(&user_id).await;
    // Read again after subscribing so no change slips between the two
    let session = state.runtime.storage().get_session(&user_id).await?;
    Ok(sse_stream(Some(SseEvent::SessionChanged { session }), broadcast_rx).into_response())
}

async fn get_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.runtime.storage().get_session(&user_id).await?;
    Ok(Json(SessionResponse { user_id, session }))
}

// ============================================================
// Catalog
// ============================================================

async fn list_puzzles(State(state): State<AppState>) -> Result<Json<PuzzleListResponse>, AppError> {
    let max_id = state.runtime.context().max_puzzle_id;
    let puzzles = state
        .runtime
        .storage()
        .list_puzzles()
        .await?
        .into_iter()
        .filter(|p| p.is_listed(max_id))
        .map(|p| PuzzleSummary {
            id: p.id,
            title: p.title,
            problem: p.problem,
        })
        .collect();
    Ok(Json(PuzzleListResponse { puzzles }))
}

async fn get_version() -> &'static str {
    concat!("um-bot ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    NotFound(String),
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SessionNotFound(_) | StoreError::PuzzleNotFound(_) => {
                AppError::NotFound(e.to_string())
            }
            other => {
                tracing::error!(error = %other, "Storage failure while serving request");
                AppError::Internal(other.to_string())
            }
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
