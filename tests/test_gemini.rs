//! Gemini provider against a local stand-in for the remote API.

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

use study_assistant::assistant::{Assistant, STUDY_NOTE_FALLBACK};
use study_assistant::llm::LlmProvider;
use study_assistant::llm::providers::gemini::{GeminiProvider, NO_RESPONSE_APOLOGY};
use study_assistant::storage::{Role, Storage, json::JsonStore};
use study_assistant::Mode;

/// Serve `body` with `status` for every generateContent call; returns the
/// API base URL.
async fn fake_gemini(status: StatusCode, body: Value) -> String {
    let app = Router::new().route(
        "/v1beta/{*rest}",
        post(move |headers: HeaderMap| {
            let body = body.clone();
            async move {
                if headers.get("x-goog-api-key").is_none() {
                    return (StatusCode::UNAUTHORIZED, axum::Json(json!({"error": {"code": 401, "message": "no key"}})));
                }
                (status, axum::Json(body))
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1beta")
}

/// Like [`fake_gemini`], but every reply is held back by `delay`.
async fn slow_gemini(delay: Duration, text: &'static str) -> String {
    let app = Router::new().route(
        "/v1beta/{*rest}",
        post(move || async move {
            tokio::time::sleep(delay).await;
            axum::Json(text_reply(text))
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1beta")
}

fn text_reply(text: &str) -> Value {
    json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
}

fn assistant(dir: &TempDir, base: String) -> Assistant {
    let gemini = GeminiProvider::new(base, "test-model".into(), 0.2, 5, "test-key".into()).unwrap();
    Assistant::new(
        Storage::Json(JsonStore::open(dir.path().join("data.json"))),
        LlmProvider::Gemini(gemini),
    )
}

#[tokio::test]
async fn test_reply_text_is_returned_and_saved() {
    let dir = TempDir::new().unwrap();
    let a = assistant(&dir, fake_gemini(StatusCode::OK, text_reply("Osmosis is diffusion of water.")).await);
    let reply = a.ask("What is osmosis?", Some("c"), Mode::College).await;
    assert_eq!(reply, "Osmosis is diffusion of water.");
    assert_eq!(a.load_history(Some("c")).await.unwrap()[1].text, reply);
}

#[tokio::test]
async fn test_empty_candidates_yield_apology() {
    let dir = TempDir::new().unwrap();
    let a = assistant(&dir, fake_gemini(StatusCode::OK, json!({"candidates": []})).await);
    assert_eq!(a.ask("hi", None, Mode::University).await, NO_RESPONSE_APOLOGY);
}

#[tokio::test]
async fn test_malformed_flashcards_become_empty() {
    let dir = TempDir::new().unwrap();
    let a = assistant(&dir, fake_gemini(StatusCode::OK, text_reply("Sure! Here are your cards.")).await);
    assert!(a.generate_flashcards("Photosynthesis").await.is_empty());
    assert!(a.generate_quiz("Photosynthesis").await.is_error());
}

#[tokio::test]
async fn test_fenced_flashcards_parse() {
    let dir = TempDir::new().unwrap();
    let payload = "```json\n[{\"front\": \"Chlorophyll?\", \"back\": \"Green pigment.\"}]\n```";
    let a = assistant(&dir, fake_gemini(StatusCode::OK, text_reply(payload)).await);
    let cards = a.generate_flashcards("Photosynthesis").await;
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].back, "Green pigment.");
}

#[tokio::test]
async fn test_http_error_is_contained() {
    let dir = TempDir::new().unwrap();
    let envelope = json!({"error": {"code": 429, "message": "Resource exhausted", "status": "RESOURCE_EXHAUSTED"}});
    let a = assistant(&dir, fake_gemini(StatusCode::TOO_MANY_REQUESTS, envelope).await);

    let reply = a.ask("hi", Some("c"), Mode::University).await;
    assert!(reply.starts_with("Error generating response:"), "{reply}");
    assert!(reply.contains("Resource exhausted"));

    assert_eq!(a.summarize_text("lecture").await, STUDY_NOTE_FALLBACK);
    let note = a.create_note("t", "lecture").await.unwrap();
    assert_eq!(note.content, STUDY_NOTE_FALLBACK);
}

#[tokio::test]
async fn test_unreachable_api_is_contained() {
    let dir = TempDir::new().unwrap();
    let a = assistant(&dir, "http://127.0.0.1:9/v1beta".into());
    let reply = a.ask("hi", None, Mode::University).await;
    assert!(reply.starts_with("Error generating response:"));
}

#[tokio::test]
async fn test_reset_during_turn_leaves_no_orphan_reply() {
    let dir = TempDir::new().unwrap();
    let a = assistant(&dir, slow_gemini(Duration::from_millis(400), "slow reply").await);

    let turn = {
        let a = a.clone();
        tokio::spawn(async move { a.ask("q", Some("c"), Mode::University).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    a.reset_history("c").await.unwrap();
    assert_eq!(turn.await.unwrap(), "slow reply");

    // The reset waited for the turn, so the whole exchange is gone.
    assert!(a.load_history(Some("c")).await.unwrap().is_empty());

    a.ask("next", Some("c"), Mode::University).await;
    let h = a.load_history(Some("c")).await.unwrap();
    assert_eq!(h.len(), 2);
    assert_eq!(h[0].role, Role::User);
    assert_eq!(h[0].text, "next");
}
