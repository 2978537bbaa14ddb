//! Hosted-database store over Supabase's PostgREST API.
//!
//! Each record set is a table (`chat_history`, `tasks`, `notes`,
//! `planner_events`); every operation is one HTTP round-trip against
//! `{project_url}/rest/v1/{table}` with PostgREST filter syntax
//! (`id=eq.4`, `order=created_at.desc`). The database assigns ids and
//! timestamps; inserts and updates ask for the written row back with
//! `Prefer: return=representation`.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, error, trace};

use super::{Message, NewPlannerEvent, Note, PlannerEvent, Role, StorageError, Task};

const CHAT_TABLE: &str = "chat_history";
const TASKS_TABLE: &str = "tasks";
const NOTES_TABLE: &str = "notes";
const PLANNER_TABLE: &str = "planner_events";

type Filters<'a> = &'a [(&'a str, String)];

/// Cheap to clone: `reqwest::Client` is reference-counted.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Client,
    rest_url: Url,
    api_key: String,
}

impl SupabaseStore {
    /// Validate the project URL and key and build the HTTP client.
    pub fn new(project_url: &str, api_key: &str, timeout_seconds: u64) -> Result<Self, StorageError> {
        let rest_url = rest_base(project_url)?;
        if api_key.trim().is_empty() {
            return Err(StorageError::Credentials("empty API key".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| StorageError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, rest_url, api_key: api_key.trim().to_string() })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url.as_str().trim_end_matches('/'))
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.api_key).bearer_auth(&self.api_key)
    }

    // ── Generic PostgREST verbs ───────────────────────────────────────

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: Filters<'_>,
        order: &str,
    ) -> Result<Vec<T>, StorageError> {
        let req = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*"), ("order", order)])
            .query(filters);
        let resp = self.send(table, "select", req).await?;
        decode(table, resp).await
    }

    async fn insert<B: Serialize, T: DeserializeOwned>(&self, table: &str, body: &B) -> Result<T, StorageError> {
        let req = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(body);
        let resp = self.send(table, "insert", req).await?;
        let rows: Vec<T> = decode(table, resp).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::Request(format!("insert into {table} returned no rows")))
    }

    async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        filters: Filters<'_>,
        body: &B,
    ) -> Result<Option<T>, StorageError> {
        let req = self
            .client
            .patch(self.table_url(table))
            .header("Prefer", "return=representation")
            .query(filters)
            .json(body);
        let resp = self.send(table, "update", req).await?;
        let rows: Vec<T> = decode(table, resp).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, table: &str, filters: Filters<'_>) -> Result<(), StorageError> {
        let req = self.client.delete(self.table_url(table)).query(filters);
        self.send(table, "delete", req).await.map(|_| ())
    }

    async fn send(&self, table: &str, op: &str, req: RequestBuilder) -> Result<Response, StorageError> {
        debug!(%table, %op, "supabase request");
        let resp = self.authed(req).send().await.map_err(|e| {
            error!(%table, %op, error = %e, is_timeout = e.is_timeout(), "supabase request failed (transport)");
            StorageError::Request(e.to_string())
        })?;
        check_status(resp).await
    }

    // ── Chat history ──────────────────────────────────────────────────

    pub async fn save_message(&self, role: Role, text: &str, conversation_id: &str) -> Result<(), StorageError> {
        let body = json!({ "role": role, "message": text, "conversation_id": conversation_id });
        let req = self.client.post(self.table_url(CHAT_TABLE)).json(&body);
        self.send(CHAT_TABLE, "insert", req).await.map(|_| ())
    }

    pub async fn load_history(&self, conversation_id: &str) -> Result<Vec<Message>, StorageError> {
        self.select(CHAT_TABLE, &[("conversation_id", eq(conversation_id))], "timestamp.asc")
            .await
    }

    pub async fn reset_history(&self, conversation_id: &str) -> Result<(), StorageError> {
        self.delete(CHAT_TABLE, &[("conversation_id", eq(conversation_id))]).await
    }

    // ── Tasks ─────────────────────────────────────────────────────────

    pub async fn list_tasks(&self) -> Result<Vec<Task>, StorageError> {
        self.select(TASKS_TABLE, &[], "created_at.desc").await
    }

    pub async fn create_task(&self, title: &str) -> Result<Task, StorageError> {
        self.insert(TASKS_TABLE, &json!({ "title": title, "completed": false })).await
    }

    pub async fn update_task(&self, id: i64, completed: bool) -> Result<Option<Task>, StorageError> {
        self.update(TASKS_TABLE, &[("id", eq(id))], &json!({ "completed": completed }))
            .await
    }

    pub async fn delete_task(&self, id: i64) -> Result<(), StorageError> {
        self.delete(TASKS_TABLE, &[("id", eq(id))]).await
    }

    pub async fn delete_completed_tasks(&self) -> Result<(), StorageError> {
        self.delete(TASKS_TABLE, &[("completed", eq(true))]).await
    }

    // ── Notes ─────────────────────────────────────────────────────────

    pub async fn create_note(&self, title: &str, content: &str, summary: &str) -> Result<Note, StorageError> {
        let body = json!({ "title": title, "content": content, "summary": summary });
        self.insert(NOTES_TABLE, &body).await
    }

    pub async fn list_notes(&self) -> Result<Vec<Note>, StorageError> {
        self.select(NOTES_TABLE, &[], "created_at.desc").await
    }

    pub async fn delete_note(&self, id: i64) -> Result<(), StorageError> {
        self.delete(NOTES_TABLE, &[("id", eq(id))]).await
    }

    // ── Planner ───────────────────────────────────────────────────────

    pub async fn list_planner_events(&self) -> Result<Vec<PlannerEvent>, StorageError> {
        self.select(PLANNER_TABLE, &[], "start_time.asc").await
    }

    pub async fn create_planner_event(&self, event: &NewPlannerEvent) -> Result<PlannerEvent, StorageError> {
        self.insert(PLANNER_TABLE, event).await
    }

    pub async fn delete_planner_event(&self, id: i64) -> Result<(), StorageError> {
        self.delete(PLANNER_TABLE, &[("id", eq(id))]).await
    }
}

/// `https://x.supabase.co` → `https://x.supabase.co/rest/v1`.
fn rest_base(project_url: &str) -> Result<Url, StorageError> {
    let url = Url::parse(project_url.trim())
        .map_err(|e| StorageError::Credentials(format!("invalid SUPABASE_URL '{project_url}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(StorageError::Credentials(format!(
            "SUPABASE_URL must be an http(s) URL, got '{project_url}'"
        )));
    }
    let base = format!("{}/rest/v1", url.as_str().trim_end_matches('/'));
    Url::parse(&base).map_err(|e| StorageError::Credentials(format!("invalid REST base '{base}': {e}")))
}

/// PostgREST equality filter value.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

async fn decode<T: DeserializeOwned>(table: &str, resp: Response) -> Result<T, StorageError> {
    let body = resp
        .text()
        .await
        .map_err(|e| StorageError::Request(format!("read {table} response: {e}")))?;
    trace!(%table, %body, "supabase response body");
    serde_json::from_str(&body).map_err(|e| {
        error!(%table, error = %e, "failed to deserialize supabase response");
        StorageError::Encode(format!("decode {table} rows: {e}"))
    })
}

/// Pass successful responses through; turn anything else into
/// [`StorageError::Status`] carrying PostgREST's `message` when present.
async fn check_status(resp: Response) -> Result<Response, StorageError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(body);
    error!(%status, %message, "supabase request returned HTTP error");
    Err(StorageError::Status { status: status.as_u16(), message })
}
