//! Mock provider: deterministic canned output, no network.
//! Used in tests and whenever no Gemini key is configured.

use crate::llm::{Flashcard, Mode, ProviderError, Quiz, QuizQuestion};
use crate::storage::Message;

#[derive(Debug, Clone)]
pub struct MockProvider;

impl MockProvider {
    pub async fn generate_response(
        &self,
        prompt: &str,
        _history: &[Message],
        mode: Mode,
    ) -> Result<String, ProviderError> {
        Ok(format!(
            "[MOCK MODE: {mode}] This is a simulated response for: {}...",
            head(prompt, 50)
        ))
    }

    pub async fn generate_flashcards(&self, topic: &str) -> Result<Vec<Flashcard>, ProviderError> {
        Ok((1..=3)
            .map(|i| Flashcard {
                front: format!("Mock Question {i} about {topic}"),
                back: format!("Mock Answer {i}"),
            })
            .collect())
    }

    pub async fn generate_quiz(&self, topic: &str) -> Result<Quiz, ProviderError> {
        let options = |opts: [&str; 4]| opts.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Ok(Quiz {
            title: format!("Mock Quiz: {topic}"),
            questions: vec![
                QuizQuestion {
                    id: 1,
                    question: format!("What is a mock question about {topic}?"),
                    options: options(["A", "B", "C", "D"]),
                    correct_answer: "A".to_string(),
                },
                QuizQuestion {
                    id: 2,
                    question: format!("Another mock question about {topic}?"),
                    options: options(["X", "Y", "Z", "Q"]),
                    correct_answer: "X".to_string(),
                },
            ],
        })
    }

    pub async fn generate_study_note(&self, transcript: &str) -> Result<String, ProviderError> {
        Ok(format!(
            "# Mock Study Note\n\n## Summary\nThis is a mock summary of the following text:\n\n> {}...\n\n- Key Point 1\n- Key Point 2",
            head(transcript, 100)
        ))
    }
}

/// First `n` characters of `s`, on a char boundary.
fn head(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn response_embeds_mode_and_input() {
        let r = MockProvider.generate_response("What is gravity?", &[], Mode::College).await.unwrap();
        assert_eq!(r, "[MOCK MODE: College] This is a simulated response for: What is gravity?...");
    }

    #[tokio::test]
    async fn response_truncates_long_prompt() {
        let prompt = "é".repeat(80);
        let r = MockProvider.generate_response(&prompt, &[], Mode::University).await.unwrap();
        assert!(r.contains(&"é".repeat(50)));
        assert!(!r.contains(&"é".repeat(51)));
    }

    #[tokio::test]
    async fn three_flashcards() {
        let cards = MockProvider.generate_flashcards("Photosynthesis").await.unwrap();
        assert_eq!(cards.len(), 3);
        assert!(cards.iter().all(|c| !c.front.is_empty() && !c.back.is_empty()));
        assert!(cards[0].front.contains("Photosynthesis"));
    }

    #[tokio::test]
    async fn quiz_has_questions_with_answers_among_options() {
        let quiz = MockProvider.generate_quiz("Cells").await.unwrap();
        assert_eq!(quiz.title, "Mock Quiz: Cells");
        assert!(!quiz.questions.is_empty());
        for q in &quiz.questions {
            assert!(q.options.contains(&q.correct_answer));
        }
    }

    #[tokio::test]
    async fn study_note_is_markdown() {
        let note = MockProvider.generate_study_note("We talked about mitosis").await.unwrap();
        assert!(note.starts_with("# Mock Study Note"));
        assert!(note.contains("mitosis"));
    }

    #[test]
    fn head_respects_char_boundaries() {
        assert_eq!(head("abc", 5), "abc");
        assert_eq!(head("añb", 2), "añ");
    }
}
