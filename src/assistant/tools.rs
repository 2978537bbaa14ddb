//! Study tools and record management on top of the two providers.
//!
//! Generation here is best-effort: failures are logged and replaced by a
//! sentinel (`[]`, [`Quiz::error`], a fixed apology). Record operations pass
//! storage errors through for the transport to report.

use tracing::{info, warn};

use super::Assistant;
use crate::llm::{Flashcard, Quiz};
use crate::storage::{NewPlannerEvent, Note, PlannerEvent, StorageError, Task};

/// Note content used when the study-note generator fails.
pub const STUDY_NOTE_FALLBACK: &str = "Could not generate study note.";

const SUMMARY_CHARS: usize = 150;

/// Short preview of generated note content: the first 150 characters with
/// heading markers removed and an ellipsis, or the content itself when it
/// is no longer than that.
pub fn summary_preview(content: &str) -> String {
    match content.char_indices().nth(SUMMARY_CHARS) {
        Some((cut, _)) => format!("{}...", content[..cut].replace('#', "").trim()),
        None => content.to_string(),
    }
}

impl Assistant {
    // ── Study tools ───────────────────────────────────────────────────

    pub async fn generate_flashcards(&self, topic: &str) -> Vec<Flashcard> {
        self.llm.generate_flashcards(topic).await.unwrap_or_else(|e| {
            warn!(%topic, error = %e, "flashcard generation failed");
            Vec::new()
        })
    }

    pub async fn generate_quiz(&self, topic: &str) -> Quiz {
        self.llm.generate_quiz(topic).await.unwrap_or_else(|e| {
            warn!(%topic, error = %e, "quiz generation failed");
            Quiz::error()
        })
    }

    pub async fn generate_study_note(&self, transcript: &str) -> String {
        self.llm.generate_study_note(transcript).await.unwrap_or_else(|e| {
            warn!(transcript_len = transcript.len(), error = %e, "study note generation failed");
            STUDY_NOTE_FALLBACK.to_string()
        })
    }

    /// Study note for raw text, nothing persisted.
    pub async fn summarize_text(&self, text: &str) -> String {
        self.generate_study_note(text).await
    }

    // ── Tasks ─────────────────────────────────────────────────────────

    pub async fn list_tasks(&self) -> Result<Vec<Task>, StorageError> {
        self.storage.list_tasks().await
    }

    pub async fn create_task(&self, title: &str) -> Result<Task, StorageError> {
        self.storage.create_task(title).await
    }

    /// `Ok(None)` when the id is unknown.
    pub async fn update_task(&self, id: i64, completed: bool) -> Result<Option<Task>, StorageError> {
        self.storage.update_task(id, completed).await
    }

    pub async fn delete_task(&self, id: i64) -> Result<(), StorageError> {
        self.storage.delete_task(id).await
    }

    pub async fn delete_completed_tasks(&self) -> Result<(), StorageError> {
        self.storage.delete_completed_tasks().await
    }

    // ── Notes ─────────────────────────────────────────────────────────

    /// Turn a raw transcript into a stored study note. The stored content is
    /// always generator output, never `raw_content` itself.
    pub async fn create_note(&self, title: &str, raw_content: &str) -> Result<Note, StorageError> {
        let content = self.generate_study_note(raw_content).await;
        let summary = summary_preview(&content);
        let note = self.storage.create_note(title, &content, &summary).await?;
        info!(note_id = note.id, %title, "note created");
        Ok(note)
    }

    pub async fn list_notes(&self) -> Result<Vec<Note>, StorageError> {
        self.storage.list_notes().await
    }

    pub async fn delete_note(&self, id: i64) -> Result<(), StorageError> {
        self.storage.delete_note(id).await
    }

    // ── Planner ───────────────────────────────────────────────────────

    pub async fn list_planner_events(&self) -> Result<Vec<PlannerEvent>, StorageError> {
        self.storage.list_planner_events().await
    }

    pub async fn create_planner_event(&self, event: NewPlannerEvent) -> Result<PlannerEvent, StorageError> {
        self.storage.create_planner_event(event).await
    }

    pub async fn delete_planner_event(&self, id: i64) -> Result<(), StorageError> {
        self.storage.delete_planner_event(id).await
    }
}
