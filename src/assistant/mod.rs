//! Conversation orchestrator and the study-tool surface.
//!
//! ```text
//! ask(input, id?, mode)
//!   1. save user message      (id present; failure logged)
//!   2. load history           (id present; failure → empty)
//!   3. generate reply         (failure → inline error text)
//!   4. save assistant reply   (id present; failure logged)
//! ```
//!
//! Each turn runs in its own task so a panic anywhere inside it comes back
//! as labelled error text instead of unwinding into the caller. Turns on the
//! same conversation id are serialized; different ids run in parallel.

mod tools;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as TurnLock;
use tracing::{debug, error, warn};

use crate::llm::{LlmProvider, Mode};
use crate::storage::{Message, Role, Storage, StorageError};

pub use tools::{STUDY_NOTE_FALLBACK, summary_preview};

type TurnLocks = HashMap<String, Arc<TurnLock<()>>>;

/// Injected once at startup and cloned into every request handler.
/// Cheap to clone: providers are reference-counted internally.
#[derive(Debug, Clone)]
pub struct Assistant {
    storage: Storage,
    llm: LlmProvider,
    turns: Arc<Mutex<TurnLocks>>,
}

impl Assistant {
    pub fn new(storage: Storage, llm: LlmProvider) -> Self {
        Self { storage, llm, turns: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn llm(&self) -> &LlmProvider {
        &self.llm
    }

    /// Run one chat turn. Never fails: every error becomes reply text.
    ///
    /// A missing (or empty) conversation id is a stateless single turn:
    /// nothing is read or written.
    pub async fn ask(&self, user_input: &str, conversation_id: Option<&str>, mode: Mode) -> String {
        let this = self.clone();
        let input = user_input.to_string();
        let conversation_id = conversation_id.filter(|id| !id.is_empty()).map(str::to_string);

        let turn = tokio::spawn(async move { this.run_turn(&input, conversation_id.as_deref(), mode).await });
        match turn.await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "chat turn aborted");
                format!("CRITICAL BACKEND ERROR: {e}")
            }
        }
    }

    async fn run_turn(&self, user_input: &str, conversation_id: Option<&str>, mode: Mode) -> String {
        let Some(id) = conversation_id else {
            return self.generate(user_input, &[], mode).await;
        };

        let lock = self.turn_lock(id);
        let reply = {
            let _turn = lock.lock().await;
            self.persisted_turn(user_input, id, mode).await
        };
        self.release_turn_lock(id, lock);
        reply
    }

    async fn persisted_turn(&self, user_input: &str, conversation_id: &str, mode: Mode) -> String {
        debug!(%conversation_id, %mode, "chat turn");

        if let Err(e) = self.storage.save_message(Role::User, user_input, conversation_id).await {
            warn!(%conversation_id, error = %e, "failed to save user message");
        }

        let history = self
            .storage
            .load_history(Some(conversation_id))
            .await
            .unwrap_or_else(|e| {
                warn!(%conversation_id, error = %e, "failed to load history, continuing without it");
                Vec::new()
            });

        let reply = self.generate(user_input, &history, mode).await;

        if let Err(e) = self.storage.save_message(Role::Assistant, &reply, conversation_id).await {
            warn!(%conversation_id, error = %e, "failed to save assistant reply");
        }
        reply
    }

    async fn generate(&self, user_input: &str, history: &[Message], mode: Mode) -> String {
        match self.llm.generate_response(user_input, history, mode).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(provider = self.llm.name(), error = %e, "generation failed");
                format!("Error generating response: {e}")
            }
        }
    }

    /// Messages of one conversation, oldest first. `None` yields nothing.
    pub async fn load_history(&self, conversation_id: Option<&str>) -> Result<Vec<Message>, StorageError> {
        self.storage.load_history(conversation_id).await
    }

    /// Clear one conversation. Waits for a turn in flight on the same id so
    /// its reply cannot land after the reset.
    pub async fn reset_history(&self, conversation_id: &str) -> Result<(), StorageError> {
        let lock = self.turn_lock(conversation_id);
        let result = {
            let _turn = lock.lock().await;
            self.storage.reset_history(conversation_id).await
        };
        self.release_turn_lock(conversation_id, lock);
        result
    }

    // ── Per-conversation serialization ────────────────────────────────

    fn lock_turns(&self) -> std::sync::MutexGuard<'_, TurnLocks> {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn turn_lock(&self, conversation_id: &str) -> Arc<TurnLock<()>> {
        self.lock_turns()
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the map entry once no other turn holds or waits on it.
    /// Clones only happen under the map lock, so a count of 2 (map + ours)
    /// means nobody else can reach it. The entry must still be our lock.
    fn release_turn_lock(&self, conversation_id: &str, lock: Arc<TurnLock<()>>) {
        let mut turns = self.lock_turns();
        let ours = turns.get(conversation_id).is_some_and(|current| Arc::ptr_eq(current, &lock));
        if ours && Arc::strong_count(&lock) == 2 {
            turns.remove(conversation_id);
        }
    }
}
