//! Persistence provider for chat messages, tasks, notes and planner events.
//!
//! `Storage` is an enum over the concrete backends, mirroring how
//! [`LlmProvider`](crate::llm::LlmProvider) dispatches: no trait objects,
//! `async fn` on the enum, one arm per backend.
//!
//! ```text
//! Storage::Json      one JSON document on local disk, rewritten on every mutation
//! Storage::Supabase  PostgREST tables over HTTP
//! ```
//!
//! Both variants share the same contract: ids and timestamps are assigned
//! by the store, history is returned oldest-first, task/note listings
//! newest-first, and deleting a missing id is not an error.

pub mod json;
pub mod supabase;

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, Credentials, StorageConfig};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("store io failed: {0}")]
    Io(String),
    #[error("store encoding failed: {0}")]
    Encode(String),
    #[error("store request failed: {0}")]
    Request(String),
    #[error("store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("store task failed: {0}")]
    Join(String),
    #[error("invalid store credentials: {0}")]
    Credentials(String),
}

// ── Records ───────────────────────────────────────────────────────────────────

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Capitalised label used in flat transcripts (`User: ...`).
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable chat turn half.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(rename = "message")]
    pub text: String,
    pub conversation_id: String,
    #[serde(rename = "timestamp", deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub summary: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Calendar entry in the weekly planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerEvent {
    pub id: i64,
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(rename = "type", default = "default_event_kind")]
    pub kind: String,
}

/// Caller-supplied fields of a planner event; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlannerEvent {
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(rename = "type", default = "default_event_kind")]
    pub kind: String,
}

pub fn default_event_kind() -> String {
    "study".to_string()
}

/// Accept RFC 3339 and offset-less ISO timestamps (read as UTC).
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available persistence backends. Cheap to clone.
#[derive(Debug, Clone)]
pub enum Storage {
    Json(json::JsonStore),
    Supabase(supabase::SupabaseStore),
}

impl Storage {
    pub fn name(&self) -> &'static str {
        match self {
            Storage::Json(_) => "json",
            Storage::Supabase(_) => "supabase",
        }
    }

    // ── Chat history ──────────────────────────────────────────────────

    pub async fn save_message(
        &self,
        role: Role,
        text: &str,
        conversation_id: &str,
    ) -> Result<(), StorageError> {
        match self {
            Storage::Json(s) => {
                let (text, conversation_id) = (text.to_string(), conversation_id.to_string());
                s.run_blocking(move |s| s.save_message(role, &text, &conversation_id)).await
            }
            Storage::Supabase(s) => s.save_message(role, text, conversation_id).await,
        }
    }

    /// Messages of one conversation, oldest first. `None` yields nothing.
    pub async fn load_history(&self, conversation_id: Option<&str>) -> Result<Vec<Message>, StorageError> {
        let Some(conversation_id) = conversation_id else {
            return Ok(Vec::new());
        };
        match self {
            Storage::Json(s) => {
                let conversation_id = conversation_id.to_string();
                s.run_blocking(move |s| s.load_history(&conversation_id)).await
            }
            Storage::Supabase(s) => s.load_history(conversation_id).await,
        }
    }

    pub async fn reset_history(&self, conversation_id: &str) -> Result<(), StorageError> {
        match self {
            Storage::Json(s) => {
                let conversation_id = conversation_id.to_string();
                s.run_blocking(move |s| s.reset_history(&conversation_id)).await
            }
            Storage::Supabase(s) => s.reset_history(conversation_id).await,
        }
    }

    // ── Tasks ─────────────────────────────────────────────────────────

    pub async fn list_tasks(&self) -> Result<Vec<Task>, StorageError> {
        match self {
            Storage::Json(s) => s.run_blocking(|s| s.list_tasks()).await,
            Storage::Supabase(s) => s.list_tasks().await,
        }
    }

    pub async fn create_task(&self, title: &str) -> Result<Task, StorageError> {
        match self {
            Storage::Json(s) => {
                let title = title.to_string();
                s.run_blocking(move |s| s.create_task(&title)).await
            }
            Storage::Supabase(s) => s.create_task(title).await,
        }
    }

    /// `Ok(None)` when no task has `id`.
    pub async fn update_task(&self, id: i64, completed: bool) -> Result<Option<Task>, StorageError> {
        match self {
            Storage::Json(s) => s.run_blocking(move |s| s.update_task(id, completed)).await,
            Storage::Supabase(s) => s.update_task(id, completed).await,
        }
    }

    pub async fn delete_task(&self, id: i64) -> Result<(), StorageError> {
        match self {
            Storage::Json(s) => s.run_blocking(move |s| s.delete_task(id)).await,
            Storage::Supabase(s) => s.delete_task(id).await,
        }
    }

    pub async fn delete_completed_tasks(&self) -> Result<(), StorageError> {
        match self {
            Storage::Json(s) => s.run_blocking(|s| s.delete_completed_tasks()).await,
            Storage::Supabase(s) => s.delete_completed_tasks().await,
        }
    }

    // ── Notes ─────────────────────────────────────────────────────────

    pub async fn create_note(&self, title: &str, content: &str, summary: &str) -> Result<Note, StorageError> {
        match self {
            Storage::Json(s) => {
                let (title, content, summary) = (title.to_string(), content.to_string(), summary.to_string());
                s.run_blocking(move |s| s.create_note(&title, &content, &summary)).await
            }
            Storage::Supabase(s) => s.create_note(title, content, summary).await,
        }
    }

    pub async fn list_notes(&self) -> Result<Vec<Note>, StorageError> {
        match self {
            Storage::Json(s) => s.run_blocking(|s| s.list_notes()).await,
            Storage::Supabase(s) => s.list_notes().await,
        }
    }

    pub async fn delete_note(&self, id: i64) -> Result<(), StorageError> {
        match self {
            Storage::Json(s) => s.run_blocking(move |s| s.delete_note(id)).await,
            Storage::Supabase(s) => s.delete_note(id).await,
        }
    }

    // ── Planner ───────────────────────────────────────────────────────

    /// Events ordered by start time, earliest first.
    pub async fn list_planner_events(&self) -> Result<Vec<PlannerEvent>, StorageError> {
        match self {
            Storage::Json(s) => s.run_blocking(|s| s.list_planner_events()).await,
            Storage::Supabase(s) => s.list_planner_events().await,
        }
    }

    pub async fn create_planner_event(&self, event: NewPlannerEvent) -> Result<PlannerEvent, StorageError> {
        match self {
            Storage::Json(s) => s.run_blocking(move |s| s.create_planner_event(event)).await,
            Storage::Supabase(s) => s.create_planner_event(&event).await,
        }
    }

    pub async fn delete_planner_event(&self, id: i64) -> Result<(), StorageError> {
        match self {
            Storage::Json(s) => s.run_blocking(move |s| s.delete_planner_event(id)).await,
            Storage::Supabase(s) => s.delete_planner_event(id).await,
        }
    }
}

// ── Factory ───────────────────────────────────────────────────────────────────

/// Construct the configured backend.
///
/// Fails when the hosted database is requested but its credentials are
/// missing or malformed; the caller decides whether to fall back.
pub fn build(config: &StorageConfig, credentials: &Credentials) -> Result<Storage, StorageError> {
    match config.provider.as_str() {
        "json" => Ok(Storage::Json(json::JsonStore::open(&config.file))),
        "supabase" => {
            let (Some(url), Some(key)) = (&credentials.supabase_url, &credentials.supabase_key) else {
                return Err(StorageError::Credentials("SUPABASE_URL / SUPABASE_KEY not set".into()));
            };
            let store = supabase::SupabaseStore::new(url, key, config.timeout_seconds)?;
            Ok(Storage::Supabase(store))
        }
        other => Err(StorageError::Credentials(format!("unknown storage provider: {other}"))),
    }
}

/// Select persistence for this process, never failing: anything but a
/// working hosted-database configuration lands on the JSON document.
pub fn select(config: &Config) -> Storage {
    if config.server.mock_mode {
        info!(file = %config.storage.file.display(), "mock mode: using file-backed storage");
        return Storage::Json(json::JsonStore::open(&config.storage.file));
    }
    match build(&config.storage, &config.credentials) {
        Ok(storage) => {
            info!(storage = storage.name(), "storage provider ready");
            storage
        }
        Err(e) => {
            warn!(error = %e, file = %config.storage.file.display(), "falling back to file-backed storage");
            Storage::Json(json::JsonStore::open(&config.storage.file))
        }
    }
}
