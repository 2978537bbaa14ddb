//! Generation provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities; clone them freely.
//! Every method returns a typed `Result`; turning failures into the
//! user-facing fallback values is the assistant's job, not the provider's.

pub mod prompt;
pub mod providers;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::Message;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("missing credential: {0}")]
    MissingCredential(String),
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("malformed provider output: {0}")]
    Malformed(String),
}

// ── Mode ──────────────────────────────────────────────────────────────────────

/// Explanation depth requested by the student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    School,
    HighSchool,
    College,
    #[default]
    University,
    Researcher,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::School,
        Mode::HighSchool,
        Mode::College,
        Mode::University,
        Mode::Researcher,
    ];

    /// Exact-label lookup; anything unrecognised is `University`.
    pub fn parse(label: &str) -> Mode {
        Mode::ALL
            .into_iter()
            .find(|m| m.label() == label)
            .unwrap_or_default()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::School => "School",
            Mode::HighSchool => "High School",
            Mode::College => "College",
            Mode::University => "University",
            Mode::Researcher => "Researcher",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            Mode::School => {
                "Explain things simply, using analogies suitable for a school student. Avoid complex jargon."
            }
            Mode::HighSchool => {
                "Explain with moderate detail, suitable for a high school student. Prepare them for exams."
            }
            Mode::College => {
                "Explain with academic rigor, suitable for a college student. Focus on concepts and applications."
            }
            Mode::University => {
                "Explain with deep technical detail, suitable for a university student. Cite theories and advanced concepts."
            }
            Mode::Researcher => {
                "Provide comprehensive, highly technical responses with references to current research. Assume expert knowledge."
            }
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Study payloads ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(default)]
    pub id: u32,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub title: String,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// Sentinel returned when no quiz could be produced.
    pub fn error() -> Self {
        Self { title: "Error".to_string(), questions: Vec::new() }
    }

    pub fn is_error(&self) -> bool {
        self.title == "Error" && self.questions.is_empty()
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new arm per method.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Mock(providers::mock::MockProvider),
    Gemini(providers::gemini::GeminiProvider),
}

impl LlmProvider {
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Mock(_) => "mock",
            LlmProvider::Gemini(_) => "gemini",
        }
    }

    /// Tutor reply to `prompt`, given the conversation so far.
    pub async fn generate_response(
        &self,
        prompt: &str,
        history: &[Message],
        mode: Mode,
    ) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Mock(p) => p.generate_response(prompt, history, mode).await,
            LlmProvider::Gemini(p) => p.generate_response(prompt, history, mode).await,
        }
    }

    pub async fn generate_flashcards(&self, topic: &str) -> Result<Vec<Flashcard>, ProviderError> {
        match self {
            LlmProvider::Mock(p) => p.generate_flashcards(topic).await,
            LlmProvider::Gemini(p) => p.generate_flashcards(topic).await,
        }
    }

    pub async fn generate_quiz(&self, topic: &str) -> Result<Quiz, ProviderError> {
        match self {
            LlmProvider::Mock(p) => p.generate_quiz(topic).await,
            LlmProvider::Gemini(p) => p.generate_quiz(topic).await,
        }
    }

    /// Markdown study note distilled from a raw transcript.
    pub async fn generate_study_note(&self, transcript: &str) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Mock(p) => p.generate_study_note(transcript).await,
            LlmProvider::Gemini(p) => p.generate_study_note(transcript).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_labels_round_trip() {
        for m in Mode::ALL {
            assert_eq!(Mode::parse(m.label()), m);
        }
    }

    #[test]
    fn unknown_mode_is_university() {
        assert_eq!(Mode::parse("Unknown"), Mode::University);
        assert_eq!(Mode::parse(""), Mode::University);
        // Lookup is exact: lowercase labels are not recognised.
        assert_eq!(Mode::parse("school"), Mode::University);
        assert_eq!(Mode::parse("Unknown").instruction(), Mode::University.instruction());
    }

    #[test]
    fn instructions_are_distinct() {
        let mut seen: Vec<&str> = Mode::ALL.iter().map(|m| m.instruction()).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), Mode::ALL.len());
    }

    #[test]
    fn quiz_error_sentinel() {
        let q = Quiz::error();
        assert!(q.is_error());
        assert_eq!(serde_json::to_value(&q).unwrap(), serde_json::json!({"title": "Error", "questions": []}));
    }

    #[test]
    fn quiz_question_id_defaults() {
        let q: QuizQuestion = serde_json::from_str(
            r#"{"question":"2+2?","options":["3","4","5","6"],"correct_answer":"4"}"#,
        )
        .unwrap();
        assert_eq!(q.id, 0);
        assert_eq!(q.options.len(), 4);
    }
}
