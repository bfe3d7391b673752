//! Generated study material
//!
//! Each generator validates its request, builds a prompt, and parses the
//! model's JSON into typed content. Requests use the browser's camelCase
//! field names so they can be deserialized straight from API bodies.

mod flashcards;
mod roadmap;
mod slides;
mod translate;

pub use flashcards::{Flashcard, FlashcardRequest, FlashcardSet, generate_flashcards};
pub use roadmap::{
    LearnerProfile, PersonalizedRoadmap, RoadmapPhase, RoadmapRequest, RoadmapResource,
    RoadmapWeek, WeeklyRoadmap, generate_personalized_roadmap, generate_weekly_roadmap,
};
pub use slides::{Slide, SlideDeck, SlideMetadata, SlideRequest, generate_slides};
pub use translate::{TranslateRequest, translate};

use serde::{Deserialize, Deserializer};

use crate::language::Language;
use crate::{Error, Result};

/// Reject a blank required field
fn require<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("{field} is required")));
    }
    Ok(value)
}

/// Display name for a language given as a code (`hi`) or a name (`Hindi`)
fn language_name(language: &str) -> String {
    language.parse::<Language>().map_or_else(
        |_| {
            let trimmed = language.trim();
            if trimmed.is_empty() {
                Language::default().name().to_string()
            } else {
                trimmed.to_string()
            }
        },
        |lang| lang.name().to_string(),
    )
}

fn default_language() -> String {
    Language::default().code().to_string()
}

/// Accept a string, number, list of strings or null as text
fn flexible_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        List(Vec<String>),
        Nothing,
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
        Raw::List(items) => items.join(", "),
        Raw::Nothing => String::new(),
    })
}
