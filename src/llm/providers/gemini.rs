//! Gemini provider over the `models/{model}:generateContent` REST endpoint.
//!
//! Every capability is one synchronous round-trip: build a prompt from the
//! templates in [`crate::llm::prompt`], send it as a single user turn, take
//! the first candidate's text. All Gemini wire types are private to this
//! module.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::llm::prompt;
use crate::llm::{Flashcard, Mode, ProviderError, Quiz};
use crate::storage::Message;

/// Reply used when the model answers with no usable text (safety block,
/// empty candidate list).
pub const NO_RESPONSE_APOLOGY: &str = "I'm sorry, I couldn't generate a response.";

const MAX_FLASHCARDS: usize = 10;

// ── Public provider ───────────────────────────────────────────────────────────

/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
    api_key: String,
}

impl GeminiProvider {
    /// The client carries a hard per-request timeout; an expired call is a
    /// [`ProviderError::Request`] like any other transport failure.
    pub fn new(
        api_base_url: String,
        model: String,
        temperature: f32,
        timeout_seconds: u64,
        api_key: String,
    ) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredential("GEMINI_API_KEY is empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_base_url, model, temperature, api_key })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base_url.trim_end_matches('/'),
            self.model
        )
    }

    pub async fn generate_response(
        &self,
        user_input: &str,
        history: &[Message],
        mode: Mode,
    ) -> Result<String, ProviderError> {
        let full_prompt = prompt::chat(user_input, history, mode);
        debug!(mode = %mode, history_len = history.len(), "generating tutor reply");
        Ok(self
            .generate(&full_prompt)
            .await?
            .unwrap_or_else(|| NO_RESPONSE_APOLOGY.to_string()))
    }

    pub async fn generate_flashcards(&self, topic: &str) -> Result<Vec<Flashcard>, ProviderError> {
        let text = self.require_text(&prompt::flashcards(topic)).await?;
        parse_flashcards(&text)
    }

    pub async fn generate_quiz(&self, topic: &str) -> Result<Quiz, ProviderError> {
        let text = self.require_text(&prompt::quiz(topic)).await?;
        parse_quiz(&text)
    }

    pub async fn generate_study_note(&self, transcript: &str) -> Result<String, ProviderError> {
        self.require_text(&prompt::study_note(transcript)).await
    }

    async fn require_text(&self, full_prompt: &str) -> Result<String, ProviderError> {
        self.generate(full_prompt)
            .await?
            .ok_or_else(|| ProviderError::Malformed("response carried no text".into()))
    }

    /// One `generateContent` call. `Ok(None)` when the model returned no text.
    async fn generate(&self, full_prompt: &str) -> Result<Option<String>, ProviderError> {
        let payload = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: Some(full_prompt.to_string()) }],
            }],
            generation_config: Some(GenerationConfig { temperature: self.temperature }),
        };

        debug!(model = %self.model, prompt_len = full_prompt.len(), "sending Gemini request");
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full Gemini request payload");
        }

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, is_timeout = e.is_timeout(), "Gemini HTTP request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;

        let response = check_status(response).await?;

        let parsed = response.json::<GenerateContentResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize Gemini response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        debug!(candidates = parsed.candidates.len(), "received Gemini response");
        let text = first_candidate_text(parsed);
        if text.is_none() {
            warn!(model = %self.model, "Gemini response had no usable text");
        }
        Ok(text)
    }
}

/// Parse a flashcard array out of raw model text.
pub fn parse_flashcards(text: &str) -> Result<Vec<Flashcard>, ProviderError> {
    let mut cards: Vec<Flashcard> = serde_json::from_str(&prompt::strip_code_fences(text))
        .map_err(|e| ProviderError::Malformed(format!("flashcards: {e}")))?;
    cards.truncate(MAX_FLASHCARDS);
    Ok(cards)
}

/// Parse a quiz object out of raw model text.
pub fn parse_quiz(text: &str) -> Result<Quiz, ProviderError> {
    serde_json::from_str(&prompt::strip_code_fences(text))
        .map_err(|e| ProviderError::Malformed(format!("quiz: {e}")))
}

fn first_candidate_text(resp: GenerateContentResponse) -> Option<String> {
    let content = resp.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

// Error envelope used by Google APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(env) => {
            let tag = env.error.status.map(|s| format!(" [{s}]")).unwrap_or_default();
            format!("HTTP {status}{tag}: {}", env.error.message)
        }
        Err(_) => format!("HTTP {status}: {body}"),
    };

    error!(%status, %message, "Gemini request returned HTTP error");
    Err(ProviderError::Request(message))
}
