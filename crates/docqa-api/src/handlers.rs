//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors, calls
//! into the coordinator, orchestrator or history store, and returns JSON
//! (or an SSE stream for `/query/stream`).

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tracing::info;
use uuid::Uuid;

use docqa_chat::QuestionRequest;
use docqa_core::events::StreamEvent;
use docqa_core::types::{CitedSnippet, SessionSummary, SourceDocument};
use docqa_vector::{DeleteOutcome, RebuildReport, ReconcileReport, RemoveOutcome};

use crate::error::ApiError;
use crate::sse::SseFrames;
use crate::state::AppState;

const ANONYMOUS_USER: &str = "anonymous";

fn default_user() -> String {
    ANONYMOUS_USER.to_string()
}

// =============================================================================
// Request types
// =============================================================================

/// Body of `POST /query` and `POST /query/stream`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    pub session_id: String,
    #[serde(default = "default_user")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub session_id: String,
    #[serde(default = "default_user")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UserParams {
    #[serde(default = "default_user")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteDocumentsRequest {
    pub file_paths: Vec<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub index_available: bool,
    pub chunk_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<CitedSnippet>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TurnResponse {
    pub question: String,
    pub answer: String,
    pub quotes: Vec<CitedSnippet>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<TurnResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentsResponse {
    pub documents: Vec<SourceDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudiedResponse {
    pub sources: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteDocumentsResponse {
    /// False when no chunk matched; the request itself still succeeds.
    pub removed: bool,
    pub chunks_removed: usize,
    pub sources: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

// =============================================================================
// Health
// =============================================================================

/// GET /health - liveness plus index status.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let index = state.index();
    let index_available = index.is_available().await?;
    let chunk_count = index.len().await? as u64;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        index_available,
        chunk_count,
    }))
}

// =============================================================================
// Question answering
// =============================================================================

fn question_request(body: QueryRequest) -> Result<QuestionRequest, ApiError> {
    if body.session_id.trim().is_empty() {
        return Err(ApiError::BadRequest("session_id must not be empty".to_string()));
    }
    if body.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id must not be empty".to_string()));
    }
    Ok(QuestionRequest {
        question: body.text,
        session_id: body.session_id,
        user_id: body.user_id,
    })
}

/// POST /query/stream - answer a question as server-sent events.
///
/// Validation and a missing index fail with a JSON error before the stream
/// opens. Once open, failures arrive as an error frame followed by `[DONE]`.
pub async fn query_stream(
    State(state): State<AppState>,
    Json(body): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = question_request(body)?;
    let events = state.orchestrator.start(request).await?;

    let sse = Sse::new(SseFrames::new(events))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)));
    Ok(([(header::CACHE_CONTROL, "no-cache")], sse))
}

/// POST /query - answer a question and return the whole answer at once.
pub async fn query(
    State(state): State<AppState>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let request = question_request(body)?;
    let question = request.question.clone();
    let mut events = state.orchestrator.start(request).await?;

    let mut answer = String::new();
    let mut sources = Vec::new();
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Token(token) => answer.push_str(&token),
            StreamEvent::Sources(cited) => sources = cited,
            StreamEvent::Done => break,
            StreamEvent::Error(message) => return Err(ApiError::Internal(message)),
        }
    }

    Ok(Json(QueryResponse {
        question,
        answer,
        sources,
    }))
}

// =============================================================================
// Conversation history
// =============================================================================

/// GET /chat/history - every turn of a session, oldest first, with quotes.
pub async fn chat_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let turns = state
        .history
        .turns(&params.session_id, &params.user_id)?
        .into_iter()
        .map(|turn| TurnResponse {
            question: turn.question,
            answer: turn.answer,
            quotes: turn.sources,
            created_at: turn.created_at,
        })
        .collect();

    Ok(Json(HistoryResponse {
        session_id: params.session_id,
        turns,
    }))
}

/// GET /sessions - a user's sessions, newest first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<UserParams>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let sessions = state.history.sessions(&params.user_id)?;
    Ok(Json(SessionsResponse { sessions }))
}

/// DELETE /sessions/{session_id} - hide a session and its history.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<UserParams>,
) -> Result<Json<DeletedResponse>, ApiError> {
    if !state.history.delete_session(&session_id, &params.user_id)? {
        return Err(ApiError::NotFound(format!("session {} not found", session_id)));
    }
    info!(session_id = %session_id, user_id = %params.user_id, "Session deleted");
    Ok(Json(DeletedResponse { deleted: true }))
}

// =============================================================================
// Documents
// =============================================================================

/// POST /documents/upload/{file_name} - store the raw request body.
pub async fn upload_document(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<SourceDocument>), ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("document body must not be empty".to_string()));
    }
    let document = state.coordinator.upload(&file_name, &body).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET /documents - the catalog.
pub async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResponse>, ApiError> {
    let documents = state.coordinator.documents()?;
    Ok(Json(DocumentsResponse { documents }))
}

/// GET /documents/studied - sources currently present in the index.
pub async fn studied_documents(
    State(state): State<AppState>,
) -> Result<Json<StudiedResponse>, ApiError> {
    let sources = state.coordinator.studied_sources().await?;
    Ok(Json(StudiedResponse { sources }))
}

/// POST /documents/delete - drop chunks for the given sources and mark
/// their documents Stale.
pub async fn delete_documents(
    State(state): State<AppState>,
    Json(body): Json<DeleteDocumentsRequest>,
) -> Result<Json<DeleteDocumentsResponse>, ApiError> {
    if body.file_paths.is_empty() {
        return Err(ApiError::BadRequest("file_paths must not be empty".to_string()));
    }

    let response = match state.coordinator.delete_from_index(&body.file_paths).await? {
        DeleteOutcome::NothingRemoved => DeleteDocumentsResponse {
            removed: false,
            chunks_removed: 0,
            sources: Vec::new(),
        },
        DeleteOutcome::Removed { count, sources } => DeleteDocumentsResponse {
            removed: true,
            chunks_removed: count,
            sources: sources.into_iter().collect(),
        },
    };
    Ok(Json(response))
}

/// DELETE /documents/{id} - remove a document, its chunks and its blob.
pub async fn remove_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RemoveOutcome>, ApiError> {
    let outcome = state.coordinator.remove_document(id).await?;
    Ok(Json(outcome))
}

// =============================================================================
// Index maintenance
// =============================================================================

/// POST /index/rebuild - index every Uploaded or Stale document.
pub async fn rebuild_index(
    State(state): State<AppState>,
) -> Result<Json<RebuildReport>, ApiError> {
    let report = state.coordinator.rebuild_index().await?;
    Ok(Json(report))
}

/// POST /index/reconcile - repair catalog/index drift.
pub async fn reconcile_index(
    State(state): State<AppState>,
) -> Result<Json<ReconcileReport>, ApiError> {
    let report = state.coordinator.reconcile().await?;
    Ok(Json(report))
}
