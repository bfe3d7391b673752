//! Text translation

use serde::Deserialize;

use crate::llm::{ChatMessage, CompletionOptions, LlmClient};
use crate::Result;

use super::{language_name, require};

/// Body of a translation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default = "super::default_language")]
    pub target_lang: String,
}

fn prompt(text: &str, target: &str) -> String {
    format!(
        "Translate the following text into {target}.\n\
         Provide only the translated text as the output.\n\
         Do not include any explanations or conversational text.\n\n\
         Text: \"{text}\""
    )
}

/// Translate `text` into `target` (a code like `hi` or a language name)
///
/// # Errors
///
/// Returns `InvalidInput` for blank text, or the completion error
pub async fn translate(llm: &LlmClient, text: &str, target: &str) -> Result<String> {
    let text = require("text", text)?;
    let target = language_name(target);

    let messages = [ChatMessage::user(prompt(text, &target))];
    let reply = llm.complete(&messages, CompletionOptions::new()).await?;

    tracing::debug!(target = %target, chars = text.chars().count(), "text translated");
    Ok(strip_quotes(reply.trim()).to_string())
}

/// Models often echo the quotes the prompt put around the text
fn strip_quotes(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}
