//! Slide deck generation

use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, CompletionOptions, LlmClient};
use crate::{Error, Result};

use super::{default_language, language_name, require};

/// Number of slides requested per deck
const SLIDE_COUNT: usize = 5;

fn default_difficulty() -> String {
    "beginner".to_string()
}

/// Parameters for a slide deck
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    /// Simplified language for students with learning needs
    #[serde(default)]
    pub accessibility_mode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideMetadata {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub difficulty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub title: String,
    #[serde(default)]
    pub content: Vec<String>,
}

/// A generated presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideDeck {
    #[serde(default)]
    pub metadata: SlideMetadata,
    pub slides: Vec<Slide>,
}

fn prompt(request: &SlideRequest, topic: &str) -> String {
    let language = language_name(&request.language);
    let style = if request.accessibility_mode {
        "Simplified and clear language for students with learning needs"
    } else {
        "Standard academic language"
    };

    format!(
        r#"You are an expert educator. Create a structured educational presentation about "{topic}".

Language: {language}
Difficulty: {difficulty}
Accessibility Mode: {style}

Output format: Strictly JSON.
Structure:
{{
    "metadata": {{ "topic": string, "language": string, "difficulty": string }},
    "slides": [
        {{ "title": string, "content": string[] (at least 3-4 bullet points) }}
    ]
}}

Create exactly {SLIDE_COUNT} slides. Ensure the content is in {language}.
For Indian languages like Hindi, Telugu, Tamil, Marathi, use the native script."#,
        difficulty = request.difficulty,
    )
}

/// Generate a slide deck
///
/// # Errors
///
/// Returns `InvalidInput` for a blank topic, `InvalidResponse` if the model
/// returns no slides, or the completion error
pub async fn generate_slides(llm: &LlmClient, request: &SlideRequest) -> Result<SlideDeck> {
    let topic = require("topic", &request.topic)?;
    let messages = [ChatMessage::user(prompt(request, topic))];

    let mut deck: SlideDeck = llm
        .complete_json(&messages, CompletionOptions::new().json())
        .await?;

    if deck.slides.is_empty() {
        return Err(Error::InvalidResponse("model returned no slides".to_string()));
    }
    if deck.metadata.topic.is_empty() {
        deck.metadata.topic = topic.to_string();
    }

    tracing::info!(topic, slides = deck.slides.len(), "slide deck generated");
    Ok(deck)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> SlideRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn request_defaults() {
        let request = request(r#"{"topic": "Photosynthesis"}"#);
        assert_eq!(request.language, "en");
        assert_eq!(request.difficulty, "beginner");
        assert!(!request.accessibility_mode);
    }

    #[test]
    fn prompt_reflects_options() {
        let request = request(
            r#"{"topic": "Fractions", "language": "mr", "difficulty": "advanced", "accessibilityMode": true}"#,
        );
        let text = prompt(&request, "Fractions");
        assert!(text.contains("\"Fractions\""));
        assert!(text.contains("Language: Marathi"));
        assert!(text.contains("Difficulty: advanced"));
        assert!(text.contains("Simplified and clear language"));
        assert!(text.contains("exactly 5 slides"));
    }

    #[test]
    fn deck_parses_with_missing_metadata() {
        let deck: SlideDeck =
            serde_json::from_str(r#"{"slides": [{"title": "Intro", "content": ["a", "b"]}]}"#)
                .unwrap();
        assert_eq!(deck.slides[0].content.len(), 2);
        assert!(deck.metadata.topic.is_empty());
    }
}
