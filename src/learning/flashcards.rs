//! Flashcard generation

use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, CompletionOptions, LlmClient};
use crate::{Error, Result};

use super::{default_language, language_name, require};

const MAX_CARDS: u32 = 20;

const fn default_count() -> u32 {
    6
}

/// Parameters for a flashcard set
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_count")]
    pub count: u32,
    /// Very short, simple sentences
    #[serde(default, alias = "simplifiedMode")]
    pub simplified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    #[serde(default)]
    pub id: u32,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub difficulty: String,
    /// Progressive hints, broad to specific
    #[serde(default)]
    pub hints: Vec<String>,
}

/// Cards plus the request they answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashcardSet {
    pub flashcards: Vec<Flashcard>,
    pub language: String,
    pub topic: String,
}

/// Models return either a bare array or `{"flashcards": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum CardsReply {
    List(Vec<Flashcard>),
    Wrapped { flashcards: Vec<Flashcard> },
}

fn prompt(topic: &str, count: u32, language: &str, simplified: bool) -> String {
    let simplified_note = if simplified {
        "Use very short, simple sentences for all questions and answers.\n"
    } else {
        ""
    };

    format!(
        r#"Create {count} flashcards about "{topic}" in {language}.
{simplified_note}Provide 3 progressive hints for each question (hint 1: broad, hint 2: medium, hint 3: specific).
Return ONLY a valid JSON array:
[
  {{
    "id": 1,
    "question": "question text in {language}",
    "answer": "answer text in {language}",
    "difficulty": "easy|medium|hard",
    "hints": ["hint 1", "hint 2", "hint 3"]
  }}
]"#
    )
}

/// Generate a flashcard set
///
/// # Errors
///
/// Returns `InvalidInput` for a blank topic, `InvalidResponse` if no cards
/// come back, or the completion error
pub async fn generate_flashcards(llm: &LlmClient, request: &FlashcardRequest) -> Result<FlashcardSet> {
    let topic = require("topic", &request.topic)?;
    let count = request.count.clamp(1, MAX_CARDS);
    let language = language_name(&request.language);

    let messages = [ChatMessage::user(prompt(
        topic,
        count,
        &language,
        request.simplified,
    ))];
    let options = CompletionOptions::new().temperature(0.6).max_tokens(1024);

    let mut flashcards = match llm.complete_json::<CardsReply>(&messages, options).await? {
        CardsReply::List(cards) | CardsReply::Wrapped { flashcards: cards } => cards,
    };
    if flashcards.is_empty() {
        return Err(Error::InvalidResponse("model returned no flashcards".to_string()));
    }
    number_cards(&mut flashcards);

    tracing::info!(topic, cards = flashcards.len(), "flashcards generated");
    Ok(FlashcardSet {
        flashcards,
        language: request.language.clone(),
        topic: topic.to_string(),
    })
}

/// Give every card a unique 1-based id when the model left them missing or repeated
fn number_cards(cards: &mut [Flashcard]) {
    let mut seen = std::collections::HashSet::new();
    let valid = cards.iter().all(|c| c.id > 0 && seen.insert(c.id));
    if !valid {
        for (id, card) in (1..).zip(cards.iter_mut()) {
            card.id = id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: u32) -> Flashcard {
        Flashcard {
            id,
            question: "q".to_string(),
            answer: "a".to_string(),
            difficulty: String::new(),
            hints: Vec::new(),
        }
    }

    #[test]
    fn request_accepts_browser_fields() {
        let request: FlashcardRequest =
            serde_json::from_str(r#"{"topic": "Atoms", "simplifiedMode": true}"#).unwrap();
        assert_eq!(request.count, 6);
        assert_eq!(request.language, "en");
        assert!(request.simplified);
    }

    #[test]
    fn prompt_includes_count_and_note() {
        let text = prompt("Atoms", 4, "Hindi", true);
        assert!(text.starts_with("Create 4 flashcards about \"Atoms\" in Hindi."));
        assert!(text.contains("very short, simple sentences"));
        assert!(!prompt("Atoms", 4, "Hindi", false).contains("simple sentences"));
    }

    #[test]
    fn reply_shapes() {
        let list: CardsReply =
            serde_json::from_str(r#"[{"question": "q", "answer": "a"}]"#).unwrap();
        assert!(matches!(list, CardsReply::List(ref c) if c.len() == 1));

        let wrapped: CardsReply = serde_json::from_str(
            r#"{"flashcards": [{"question": "q", "answer": "a", "hints": ["h"]}]}"#,
        )
        .unwrap();
        assert!(matches!(wrapped, CardsReply::Wrapped { ref flashcards } if flashcards[0].hints == ["h"]));
    }

    #[test]
    fn renumbers_missing_or_duplicate_ids() {
        let mut cards = vec![card(0), card(0), card(0)];
        number_cards(&mut cards);
        assert_eq!(cards.iter().map(|c| c.id).collect::<Vec<_>>(), [1, 2, 3]);

        let mut cards = vec![card(3), card(3)];
        number_cards(&mut cards);
        assert_eq!(cards.iter().map(|c| c.id).collect::<Vec<_>>(), [1, 2]);

        let mut cards = vec![card(7), card(9)];
        number_cards(&mut cards);
        assert_eq!(cards.iter().map(|c| c.id).collect::<Vec<_>>(), [7, 9]);
    }
}
