//! File-backed store: one JSON document holding every record set.
//!
//! ```json
//! { "chat_history": [...], "tasks": [...], "notes": [...], "planner_events": [...] }
//! ```
//!
//! The document is loaded once on open and rewritten in full after every
//! mutation. A missing or unreadable document opens as an empty store.
//! One in-process mutex serialises access; the file itself is not locked,
//! so a given document must be owned by a single process.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Message, NewPlannerEvent, Note, PlannerEvent, Role, StorageError, Task};

/// On-disk shape of the document.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    chat_history: Vec<Message>,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(default)]
    planner_events: Vec<PlannerEvent>,
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    path: Arc<PathBuf>,
    doc: Arc<Mutex<Document>>,
}

impl JsonStore {
    /// Open (or create) the document at `path`. Never fails: problems are
    /// logged and the store starts empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let doc = if path.exists() {
            Self::read(&path)
        } else {
            let doc = Document::default();
            if let Err(e) = Self::write(&path, &doc) {
                warn!(path = %path.display(), error = %e, "cannot create store document; continuing in memory");
            }
            doc
        };
        debug!(
            path = %path.display(),
            messages = doc.chat_history.len(),
            tasks = doc.tasks.len(),
            notes = doc.notes.len(),
            "json store opened"
        );
        Self { path: Arc::new(path), doc: Arc::new(Mutex::new(doc)) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Document {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read store document; starting empty");
                return Document::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "malformed store document; starting empty");
            Document::default()
        })
    }

    fn write(path: &Path, doc: &Document) -> Result<(), StorageError> {
        let data = serde_json::to_string_pretty(doc)
            .map_err(|e| StorageError::Encode(format!("serialise document: {e}")))?;
        fs::write(path, data)
            .map_err(|e| StorageError::Io(format!("cannot write {}: {e}", path.display())))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Document>, StorageError> {
        self.doc
            .lock()
            .map_err(|_| StorageError::Io("json store lock poisoned".into()))
    }

    /// Apply `f` to a copy of the document and rewrite the file while still
    /// holding the lock. The live document is replaced only once the write
    /// succeeded, so a failed write leaves the store untouched.
    fn mutate<R>(&self, f: impl FnOnce(&mut Document) -> R) -> Result<R, StorageError> {
        let mut doc = self.lock()?;
        let mut next = doc.clone();
        let out = f(&mut next);
        Self::write(&self.path, &next)?;
        *doc = next;
        Ok(out)
    }

    /// Run a blocking store call on tokio's blocking pool.
    pub(crate) async fn run_blocking<R, F>(&self, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&JsonStore) -> Result<R, StorageError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StorageError::Join(e.to_string()))?
    }

    // ── Chat history ──────────────────────────────────────────────────

    pub fn save_message(&self, role: Role, text: &str, conversation_id: &str) -> Result<(), StorageError> {
        self.mutate(|doc| {
            doc.chat_history.push(Message {
                role,
                text: text.to_string(),
                conversation_id: conversation_id.to_string(),
                created_at: Utc::now(),
            });
        })
    }

    pub fn load_history(&self, conversation_id: &str) -> Result<Vec<Message>, StorageError> {
        let doc = self.lock()?;
        // Append order is creation order.
        Ok(doc
            .chat_history
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    pub fn reset_history(&self, conversation_id: &str) -> Result<(), StorageError> {
        self.mutate(|doc| doc.chat_history.retain(|m| m.conversation_id != conversation_id))
    }

    // ── Tasks ─────────────────────────────────────────────────────────

    pub fn list_tasks(&self) -> Result<Vec<Task>, StorageError> {
        let mut tasks = self.lock()?.tasks.clone();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    pub fn create_task(&self, title: &str) -> Result<Task, StorageError> {
        self.mutate(|doc| {
            let task = Task {
                id: next_id(doc.tasks.iter().map(|t| t.id)),
                title: title.to_string(),
                completed: false,
                created_at: Utc::now(),
            };
            doc.tasks.push(task.clone());
            task
        })
    }

    pub fn update_task(&self, id: i64, completed: bool) -> Result<Option<Task>, StorageError> {
        if !self.lock()?.tasks.iter().any(|t| t.id == id) {
            return Ok(None);
        }
        self.mutate(|doc| {
            let task = doc.tasks.iter_mut().find(|t| t.id == id)?;
            task.completed = completed;
            Some(task.clone())
        })
    }

    pub fn delete_task(&self, id: i64) -> Result<(), StorageError> {
        self.mutate(|doc| doc.tasks.retain(|t| t.id != id))
    }

    pub fn delete_completed_tasks(&self) -> Result<(), StorageError> {
        self.mutate(|doc| doc.tasks.retain(|t| !t.completed))
    }

    // ── Notes ─────────────────────────────────────────────────────────

    pub fn create_note(&self, title: &str, content: &str, summary: &str) -> Result<Note, StorageError> {
        self.mutate(|doc| {
            let note = Note {
                id: next_id(doc.notes.iter().map(|n| n.id)),
                title: title.to_string(),
                content: content.to_string(),
                summary: summary.to_string(),
                created_at: Utc::now(),
            };
            doc.notes.push(note.clone());
            note
        })
    }

    pub fn list_notes(&self) -> Result<Vec<Note>, StorageError> {
        let mut notes = self.lock()?.notes.clone();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notes)
    }

    pub fn delete_note(&self, id: i64) -> Result<(), StorageError> {
        self.mutate(|doc| doc.notes.retain(|n| n.id != id))
    }

    // ── Planner ───────────────────────────────────────────────────────

    pub fn list_planner_events(&self) -> Result<Vec<PlannerEvent>, StorageError> {
        let mut events = self.lock()?.planner_events.clone();
        events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    pub fn create_planner_event(&self, event: NewPlannerEvent) -> Result<PlannerEvent, StorageError> {
        self.mutate(|doc| {
            let created = PlannerEvent {
                id: next_id(doc.planner_events.iter().map(|e| e.id)),
                title: event.title,
                start_time: event.start_time,
                end_time: event.end_time,
                kind: event.kind,
            };
            doc.planner_events.push(created.clone());
            created
        })
    }

    pub fn delete_planner_event(&self, id: i64) -> Result<(), StorageError> {
        self.mutate(|doc| doc.planner_events.retain(|e| e.id != id))
    }
}

/// One past the largest id in use; `1` for an empty set.
fn next_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, JsonStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path().join("local_data.json"));
        (dir, store)
    }

    #[test]
    fn open_creates_empty_document() {
        let (dir, _store) = setup();
        let text = fs::read_to_string(dir.path().join("local_data.json")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["chat_history"], serde_json::json!([]));
        assert_eq!(v["tasks"], serde_json::json!([]));
        assert_eq!(v["notes"], serde_json::json!([]));
    }

    #[test]
    fn corrupt_document_opens_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local_data.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonStore::open(&path);
        assert!(store.list_tasks().unwrap().is_empty());
        // First mutation replaces the corrupt file.
        store.create_task("Read").unwrap();
        let reopened = JsonStore::open(&path);
        assert_eq!(reopened.list_tasks().unwrap().len(), 1);
    }

    #[test]
    fn legacy_document_without_planner_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local_data.json");
        fs::write(
            &path,
            r#"{"chat_history":[{"role":"user","message":"hi","conversation_id":"c","timestamp":"2024-05-01T08:00:00.5"}],
                "tasks":[{"id":4,"title":"Old","completed":true,"created_at":"2024-05-01T08:00:00"}],
                "notes":[]}"#,
        )
        .unwrap();
        let store = JsonStore::open(&path);
        assert_eq!(store.load_history("c").unwrap().len(), 1);
        assert_eq!(store.create_task("New").unwrap().id, 5);
        assert!(store.list_planner_events().unwrap().is_empty());
    }

    #[test]
    fn history_is_scoped_and_ordered() {
        let (_dir, store) = setup();
        store.save_message(Role::User, "q1", "a").unwrap();
        store.save_message(Role::User, "other", "b").unwrap();
        store.save_message(Role::Assistant, "r1", "a").unwrap();

        let h = store.load_history("a").unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h[0].text, "q1");
        assert_eq!(h[1].role, Role::Assistant);
        assert!(h[0].created_at <= h[1].created_at);
    }

    #[test]
    fn reset_only_touches_one_conversation() {
        let (_dir, store) = setup();
        store.save_message(Role::User, "x", "a").unwrap();
        store.save_message(Role::User, "y", "b").unwrap();
        store.reset_history("a").unwrap();
        assert!(store.load_history("a").unwrap().is_empty());
        assert_eq!(store.load_history("b").unwrap().len(), 1);
    }

    #[test]
    fn task_lifecycle() {
        let (_dir, store) = setup();
        let first = store.create_task("Read").unwrap();
        let second = store.create_task("Write").unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(!first.completed);

        let listed = store.list_tasks().unwrap();
        assert_eq!(listed[0].id, second.id, "newest first");

        let updated = store.update_task(first.id, true).unwrap().unwrap();
        assert!(updated.completed);
        assert!(store.update_task(99, true).unwrap().is_none());

        store.delete_completed_tasks().unwrap();
        let remaining = store.list_tasks().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "Write");

        store.delete_task(second.id).unwrap();
        store.delete_task(second.id).unwrap();
        assert!(store.list_tasks().unwrap().is_empty());
    }

    #[test]
    fn ids_are_not_reused_while_max_survives() {
        let (_dir, store) = setup();
        let a = store.create_task("a").unwrap();
        let b = store.create_task("b").unwrap();
        store.delete_task(a.id).unwrap();
        let c = store.create_task("c").unwrap();
        assert_eq!(c.id, b.id + 1);
    }

    #[test]
    fn mutations_persist_across_reopen() {
        let (dir, store) = setup();
        store.create_note("Session 1", "# Body", "Body").unwrap();
        store.save_message(Role::User, "hello", "c1").unwrap();

        let reopened = JsonStore::open(dir.path().join("local_data.json"));
        let notes = reopened.list_notes().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].summary, "Body");
        assert_eq!(reopened.load_history("c1").unwrap()[0].text, "hello");
    }

    #[test]
    fn planner_events_sorted_by_start() {
        let (_dir, store) = setup();
        let ev = |title: &str, start: &str| NewPlannerEvent {
            title: title.into(),
            start_time: start.into(),
            end_time: start.into(),
            kind: "study".into(),
        };
        store.create_planner_event(ev("late", "2025-03-05T10:00:00")).unwrap();
        let early = store.create_planner_event(ev("early", "2025-03-03T10:00:00")).unwrap();
        let listed = store.list_planner_events().unwrap();
        assert_eq!(listed[0].title, "early");
        store.delete_planner_event(early.id).unwrap();
        assert_eq!(store.list_planner_events().unwrap().len(), 1);
    }

    #[test]
    fn write_failure_surfaces_as_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path().join("missing").join("data.json"));
        let err = store.create_task("x").unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[test]
    fn failed_write_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let store = JsonStore::open(&path);
        let kept = store.create_task("kept").unwrap();
        store.save_message(Role::User, "hi", "c").unwrap();

        // Replace the file with a directory so every rewrite fails.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(store.create_task("ghost").is_err());
        assert!(store.update_task(kept.id, true).is_err());
        assert!(store.reset_history("c").is_err());
        assert!(store.create_note("n", "body", "body").is_err());

        let tasks = store.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "kept");
        assert!(!tasks[0].completed);
        assert_eq!(store.load_history("c").unwrap().len(), 1);
        assert!(store.list_notes().unwrap().is_empty());
    }

    #[test]
    fn store_without_backing_file_stays_empty_on_failed_create() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path().join("missing").join("data.json"));
        assert!(store.create_task("ghost").is_err());
        assert!(store.list_tasks().unwrap().is_empty());
    }
}
