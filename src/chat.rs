//! Conversational tutor
//!
//! A [`ChatSession`] keeps an in-memory transcript and asks the model to
//! answer the latest message with the platform's system prompt in front.

use crate::language::Language;
use crate::llm::{ChatMessage, CompletionOptions, LlmClient, Role};
use crate::Result;

/// Reply used when the model returns nothing
pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't process that.";

const CHAT_OPTIONS: CompletionOptions = CompletionOptions::new().temperature(0.7).max_tokens(1024);

/// Build the tutor system prompt for a reply language
#[must_use]
pub fn system_prompt(language: Language) -> String {
    format!(
        "You are \"VidyaMitra AI\", a helpful and friendly educational assistant for the \
VidyaMitra platform.
Your goal is to solve students' doubts and explain how to use the website.

VidyaMitra Features:
1. AI Slide Generator: Generates structured educational slides with multilingual voice narration.
2. AI Flashcards: Interactive cards for quick revision with flip animations and TTS.
3. Personalized Roadmaps: Step-by-step learning paths with a vertical timeline and voice guidance.
4. Careers Page: Real-time search for jobs and internships with city-wise filtering.

Guidelines:
- Respond in the user's language: {name} ({code}).
- Be concise, professional, and encouraging.
- If asked about website info, explain the features listed above.
- Provide clear, step-by-step answers for educational doubts.
- Use markdown for formatting (bold, lists, etc.).",
        name = language.name(),
        code = language.code(),
    )
}

/// Answer the last message of a conversation
///
/// System messages supplied by the caller are dropped in favor of the
/// tutor prompt.
///
/// # Errors
///
/// Returns error if the completion request fails
pub async fn respond(llm: &LlmClient, messages: &[ChatMessage], language: Language) -> Result<String> {
    let mut request = Vec::with_capacity(messages.len() + 1);
    request.push(ChatMessage::system(system_prompt(language)));
    request.extend(messages.iter().filter(|m| m.role != Role::System).cloned());

    let reply = llm.complete(&request, CHAT_OPTIONS).await?;
    if reply.trim().is_empty() {
        tracing::debug!("empty completion, using fallback reply");
        return Ok(FALLBACK_REPLY.to_string());
    }

    Ok(reply)
}

/// An ongoing conversation
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    language: Language,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    #[must_use]
    pub const fn new(language: Language) -> Self {
        Self {
            language,
            history: Vec::new(),
        }
    }

    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    /// Switch the reply language for subsequent turns
    pub const fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    /// Messages so far, oldest first
    #[must_use]
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Send a user message and record the reply
    ///
    /// The user message stays in the history even if the request fails.
    ///
    /// # Errors
    ///
    /// Returns error if the completion request fails
    pub async fn send(&mut self, llm: &LlmClient, text: &str) -> Result<String> {
        self.history.push(ChatMessage::user(text.trim()));

        let reply = respond(llm, &self.history, self.language).await?;
        self.history.push(ChatMessage::assistant(reply.clone()));

        tracing::debug!(turns = self.history.len(), "chat reply recorded");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::Error;

    #[test]
    fn prompt_names_language() {
        let prompt = system_prompt(Language::Tamil);
        assert!(prompt.contains("VidyaMitra AI"));
        assert!(prompt.contains("Tamil (ta)"));
        assert!(prompt.contains("4. Careers Page"));
    }

    #[tokio::test]
    async fn failed_send_keeps_user_message() {
        let llm = LlmClient::new("http://127.0.0.1:9", None, "llama", Duration::from_secs(1)).unwrap();
        let mut session = ChatSession::new(Language::Hindi);

        let result = session.send(&llm, "  what is gravity? ").await;
        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].content, "what is gravity?");
        assert_eq!(session.history()[0].role, Role::User);
    }
}
