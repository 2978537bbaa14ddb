//! Prompt templates for the remote model.
//!
//! Templates live under `config/prompts/` and are compiled into the binary.
//! Variables use `{{key}}` syntax and are substituted in a single pass, so
//! user text that happens to contain `{{...}}` is never expanded.

use std::collections::HashMap;

use crate::llm::Mode;
use crate::storage::Message;

pub const CHAT_TEMPLATE: &str = include_str!("../../config/prompts/chat.txt");
pub const FLASHCARDS_TEMPLATE: &str = include_str!("../../config/prompts/flashcards.txt");
pub const QUIZ_TEMPLATE: &str = include_str!("../../config/prompts/quiz.txt");
pub const STUDY_NOTE_TEMPLATE: &str = include_str!("../../config/prompts/study_note.txt");

/// Template plus `{{key}}` → value pairs.
pub struct PromptBuilder<'a> {
    template: &'a str,
    vars: HashMap<&'a str, String>,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(template: &'a str) -> Self {
        Self { template, vars: HashMap::new() }
    }

    pub fn var(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.vars.insert(key, value.into());
        self
    }

    /// Render the template. Unknown placeholders are left as written.
    pub fn build(self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let key = after[..end].trim();
                    match self.vars.get(key) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[start..start + 2 + end + 2]),
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out.trim().to_string()
    }
}

/// `Role: message` per line, in load order.
pub fn flat_transcript(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn chat(user_input: &str, history: &[Message], mode: Mode) -> String {
    PromptBuilder::new(CHAT_TEMPLATE)
        .var("mode", mode.label())
        .var("instruction", mode.instruction())
        .var("history", flat_transcript(history))
        .var("user_input", user_input)
        .build()
}

pub fn flashcards(topic: &str) -> String {
    PromptBuilder::new(FLASHCARDS_TEMPLATE).var("topic", topic).build()
}

pub fn quiz(topic: &str) -> String {
    PromptBuilder::new(QUIZ_TEMPLATE).var("topic", topic).build()
}

pub fn study_note(transcript: &str) -> String {
    PromptBuilder::new(STUDY_NOTE_TEMPLATE).var("transcript", transcript).build()
}

/// Remove Markdown code-fence markup a model may wrap JSON in.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}
