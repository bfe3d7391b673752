//! Lenient JSON parsing for model output
//!
//! Models asked for JSON sometimes wrap it in prose or code fences. Parsing
//! is strict first, then falls back once to the first braced or bracketed
//! region of the text.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::{Error, Result};

static OBJECT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

static ARRAY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"));

/// Find the outermost JSON-looking region in `text`
///
/// Whichever of `{` or `[` appears first decides the shape.
#[must_use]
pub fn extract_json(text: &str) -> Option<&str> {
    let object = OBJECT_REGEX.find(text);
    let array = ARRAY_REGEX.find(text);

    match (object, array) {
        (Some(o), Some(a)) => Some(if a.start() < o.start() { a } else { o }),
        (o, a) => o.or(a),
    }
    .map(|m| m.as_str())
}

/// Parse model output as `T`, with one extraction fallback
///
/// # Errors
///
/// Returns `InvalidResponse` if neither the text nor its extracted region
/// deserializes
pub fn parse_lenient<T: DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let Some(region) = extract_json(trimmed) else {
        tracing::warn!(chars = trimmed.len(), "model output contained no JSON");
        return Err(Error::InvalidResponse("no JSON found in model output".to_string()));
    };

    serde_json::from_str(region).map_err(|e| {
        tracing::warn!(error = %e, "extracted JSON did not parse");
        Error::InvalidResponse(format!("invalid JSON in model output: {e}"))
    })
}
