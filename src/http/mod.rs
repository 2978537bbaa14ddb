//! Axum HTTP transport over the [`Assistant`].
//!
//! Handlers only translate between JSON bodies and assistant calls; all
//! behaviour lives in the assistant. The server shuts down gracefully when
//! the passed [`CancellationToken`] is cancelled.
//!
//! ## URL layout
//!
//! ```text
//! GET    /api/                      health
//! POST   /api/chat                  one chat turn + updated history
//! POST   /api/reset                 clear one conversation
//! GET    /api/history/{id}
//! POST   /api/flashcards/generate
//! POST   /api/quiz/generate
//! GET    /api/tasks                 POST /api/tasks
//! PUT    /api/tasks/{id}            DELETE /api/tasks/{id}
//! DELETE /api/tasks/completed
//! GET    /api/notes                 POST /api/notes
//! POST   /api/notes/summarize       DELETE /api/notes/{id}
//! GET    /api/planner               POST /api/planner
//! DELETE /api/planner/{id}
//! ```

mod api;

use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post, put},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::assistant::Assistant;
use crate::config::ServerConfig;
use crate::error::AppError;

/// Router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone: all fields are reference-counted.
#[derive(Clone)]
pub(crate) struct AxumState {
    /// Service name used in log fields.
    pub name: Arc<str>,
    pub assistant: Assistant,
}

/// Bind `config.bind` and serve until `shutdown` is cancelled.
pub async fn serve(config: &ServerConfig, assistant: Assistant, shutdown: CancellationToken) -> Result<(), AppError> {
    let router = router(&config.name, assistant, config.cors_origins.as_deref());

    let listener = TcpListener::bind(&config.bind)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {}: {e}", config.bind)))?;

    let local = listener
        .local_addr()
        .map_err(|e| AppError::Server(format!("no local address: {e}")))?;
    info!(name = %config.name, bind = %local, "http server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("http server error: {e}")))?;

    info!(name = %config.name, "http server shut down");
    Ok(())
}

/// Full application router with CORS and request tracing.
pub fn router(name: &str, assistant: Assistant, cors_origins: Option<&str>) -> Router {
    let state = AxumState { name: Arc::from(name), assistant };

    Router::new()
        .route("/api/",                    get(api::health))
        .route("/api/chat",                post(api::chat))
        .route("/api/reset",               post(api::reset))
        .route("/api/history/{id}",        get(api::history))
        .route("/api/flashcards/generate", post(api::flashcards))
        .route("/api/quiz/generate",       post(api::quiz))
        .route("/api/tasks",               get(api::list_tasks).post(api::create_task))
        .route("/api/tasks/completed",     delete(api::delete_completed_tasks))
        .route("/api/tasks/{id}",          put(api::update_task).delete(api::delete_task))
        .route("/api/notes",               get(api::list_notes).post(api::create_note))
        .route("/api/notes/summarize",     post(api::summarize))
        .route("/api/notes/{id}",          delete(api::delete_note))
        .route("/api/planner",             get(api::list_planner).post(api::create_planner_event))
        .route("/api/planner/{id}",        delete(api::delete_planner_event))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Any origin unless a comma-separated allow-list is configured.
fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let permissive = CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any);
    let Some(origins) = origins else {
        return permissive;
    };

    let parsed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    if parsed.is_empty() {
        warn!(%origins, "no valid CORS origins configured, allowing any origin");
        return permissive;
    }
    CorsLayer::new().allow_origin(parsed).allow_headers(Any).allow_methods(Any)
}
