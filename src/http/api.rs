//! Axum handlers for `/api/*` routes.
//!
//! Chat and study-tool handlers always answer 200 with whatever the
//! assistant produced. Record handlers map a storage failure to
//! `502 {"error": "storage", "message": ...}`.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use super::AxumState;
use crate::llm::Mode;
use crate::storage::{NewPlannerEvent, StorageError};

// ── Request types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct ChatRequest {
    message: String,
    conversation_id: Option<String>,
    mode: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct ResetRequest {
    conversation_id: String,
}

#[derive(Deserialize)]
pub(super) struct TopicRequest {
    topic: String,
}

#[derive(Deserialize)]
pub(super) struct TaskCreate {
    title: String,
}

#[derive(Deserialize)]
pub(super) struct TaskUpdate {
    completed: bool,
}

#[derive(Deserialize)]
pub(super) struct NoteCreate {
    title: String,
    content: String,
}

#[derive(Deserialize)]
pub(super) struct SummarizeRequest {
    text: String,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build a JSON error response body.
fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

fn success() -> Response {
    Json(json!({ "status": "success" })).into_response()
}

/// 200 with the serialized value, or 502 carrying the storage error.
fn respond<T: Serialize>(state: &AxumState, op: &str, result: Result<T, StorageError>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(e) => storage_failure(state, op, e),
    }
}

fn storage_failure(state: &AxumState, op: &str, e: StorageError) -> Response {
    warn!(name = %state.name, %op, error = %e, "storage operation failed");
    (StatusCode::BAD_GATEWAY, json_error("storage", e)).into_response()
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /api/
pub(super) async fn health() -> Response {
    Json(json!({ "status": "ok", "message": "Chatbot API is running" })).into_response()
}

/// POST /api/chat. A missing id starts a new conversation.
pub(super) async fn chat(State(state): State<AxumState>, Json(req): Json<ChatRequest>) -> Response {
    let conversation_id = req
        .conversation_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let mode = req.mode.as_deref().map(Mode::parse).unwrap_or_default();

    let response = state.assistant.ask(&req.message, Some(&conversation_id), mode).await;

    let history = state
        .assistant
        .load_history(Some(&conversation_id))
        .await
        .unwrap_or_else(|e| {
            warn!(name = %state.name, %conversation_id, error = %e, "history reload failed");
            Vec::new()
        });

    Json(json!({
        "response": response,
        "conversation_id": conversation_id,
        "history": history,
    }))
    .into_response()
}

/// POST /api/reset
pub(super) async fn reset(State(state): State<AxumState>, Json(req): Json<ResetRequest>) -> Response {
    match state.assistant.reset_history(&req.conversation_id).await {
        Ok(()) => Json(json!({ "message": "Chat history reset" })).into_response(),
        Err(e) => storage_failure(&state, "reset_history", e),
    }
}

/// GET /api/history/{id}
pub(super) async fn history(State(state): State<AxumState>, Path(id): Path<String>) -> Response {
    match state.assistant.load_history(Some(&id)).await {
        Ok(history) => Json(json!({ "history": history })).into_response(),
        Err(e) => storage_failure(&state, "load_history", e),
    }
}

/// POST /api/flashcards/generate
pub(super) async fn flashcards(State(state): State<AxumState>, Json(req): Json<TopicRequest>) -> Response {
    Json(state.assistant.generate_flashcards(&req.topic).await).into_response()
}

/// POST /api/quiz/generate
pub(super) async fn quiz(State(state): State<AxumState>, Json(req): Json<TopicRequest>) -> Response {
    Json(state.assistant.generate_quiz(&req.topic).await).into_response()
}

// ── Tasks ─────────────────────────────────────────────────────────────────────

pub(super) async fn list_tasks(State(state): State<AxumState>) -> Response {
    let result = state.assistant.list_tasks().await;
    respond(&state, "list_tasks", result)
}

pub(super) async fn create_task(State(state): State<AxumState>, Json(req): Json<TaskCreate>) -> Response {
    let result = state.assistant.create_task(&req.title).await;
    respond(&state, "create_task", result)
}

/// PUT /api/tasks/{id}. `null` body when the id is unknown.
pub(super) async fn update_task(
    State(state): State<AxumState>,
    Path(id): Path<i64>,
    Json(req): Json<TaskUpdate>,
) -> Response {
    let result = state.assistant.update_task(id, req.completed).await;
    respond(&state, "update_task", result)
}

pub(super) async fn delete_task(State(state): State<AxumState>, Path(id): Path<i64>) -> Response {
    match state.assistant.delete_task(id).await {
        Ok(()) => success(),
        Err(e) => storage_failure(&state, "delete_task", e),
    }
}

pub(super) async fn delete_completed_tasks(State(state): State<AxumState>) -> Response {
    match state.assistant.delete_completed_tasks().await {
        Ok(()) => success(),
        Err(e) => storage_failure(&state, "delete_completed_tasks", e),
    }
}

// ── Notes ─────────────────────────────────────────────────────────────────────

pub(super) async fn list_notes(State(state): State<AxumState>) -> Response {
    let result = state.assistant.list_notes().await;
    respond(&state, "list_notes", result)
}

/// POST /api/notes. `content` is the raw transcript; the stored note
/// holds the generated study note instead.
pub(super) async fn create_note(State(state): State<AxumState>, Json(req): Json<NoteCreate>) -> Response {
    let result = state.assistant.create_note(&req.title, &req.content).await;
    respond(&state, "create_note", result)
}

pub(super) async fn summarize(State(state): State<AxumState>, Json(req): Json<SummarizeRequest>) -> Response {
    let summary = state.assistant.summarize_text(&req.text).await;
    Json(json!({ "summary": summary })).into_response()
}

pub(super) async fn delete_note(State(state): State<AxumState>, Path(id): Path<i64>) -> Response {
    match state.assistant.delete_note(id).await {
        Ok(()) => success(),
        Err(e) => storage_failure(&state, "delete_note", e),
    }
}

// ── Planner ───────────────────────────────────────────────────────────────────

pub(super) async fn list_planner(State(state): State<AxumState>) -> Response {
    let result = state.assistant.list_planner_events().await;
    respond(&state, "list_planner_events", result)
}

pub(super) async fn create_planner_event(
    State(state): State<AxumState>,
    Json(event): Json<NewPlannerEvent>,
) -> Response {
    let result = state.assistant.create_planner_event(event).await;
    respond(&state, "create_planner_event", result)
}

pub(super) async fn delete_planner_event(State(state): State<AxumState>, Path(id): Path<i64>) -> Response {
    match state.assistant.delete_planner_event(id).await {
        Ok(()) => success(),
        Err(e) => storage_failure(&state, "delete_planner_event", e),
    }
}
