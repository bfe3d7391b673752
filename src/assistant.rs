//! Hands-free tutor loop
//!
//! Wake word activations open the chat, capture the spoken request (unless
//! it came inline with the wake phrase), send it to the tutor, and narrate
//! the reply. Observers follow along through [`AssistantEvent`]s.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc, watch};

use crate::chat::ChatSession;
use crate::language::Language;
use crate::llm::LlmClient;
use crate::voice::{Activation, Narrator, SpeechRecognizer, capture_utterance};
use crate::Result;

/// What the assistant is doing, for UIs and logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantEvent {
    /// A wake phrase opened the chat
    ChatOpened { transcript: String },
    /// Waiting for the spoken request
    Listening,
    /// The request that will be sent to the tutor
    Heard { text: String },
    /// The tutor's answer, now being narrated
    Reply { text: String },
    /// The activation could not be completed
    Failed { reason: String },
    /// The chat was closed
    Closed,
}

/// Voice front end for the tutor
pub struct Assistant {
    narrator: Narrator,
    recognizer: Arc<dyn SpeechRecognizer>,
    llm: Arc<LlmClient>,
    chat: Mutex<ChatSession>,
    language: Language,
    events: broadcast::Sender<AssistantEvent>,
}

impl Assistant {
    #[must_use]
    pub fn new(
        narrator: Narrator,
        recognizer: Arc<dyn SpeechRecognizer>,
        llm: Arc<LlmClient>,
        language: Language,
    ) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            narrator,
            recognizer,
            llm,
            chat: Mutex::new(ChatSession::new(language)),
            language,
            events,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub const fn narrator(&self) -> &Narrator {
        &self.narrator
    }

    /// Handle one wake word activation
    ///
    /// Narration already in progress keeps playing until the reply is ready
    /// to be spoken. Returns the reply, or `None` if no request was heard.
    ///
    /// # Errors
    ///
    /// Returns error if capture, the tutor, or narration fails
    pub async fn handle_activation(&self, activation: Activation) -> Result<Option<String>> {
        self.emit(AssistantEvent::ChatOpened {
            transcript: activation.transcript,
        });

        let request = match activation.request {
            Some(request) => Some(request),
            None => {
                self.emit(AssistantEvent::Listening);
                capture_utterance(self.recognizer.as_ref(), self.language.recognition_locale())
                    .await
                    .inspect_err(|e| self.fail(e))?
            }
        };

        let Some(text) = request else {
            tracing::debug!("no request heard after activation");
            self.emit(AssistantEvent::Failed {
                reason: "no speech detected".to_string(),
            });
            return Ok(None);
        };

        tracing::info!(request = %text, "voice request");
        self.emit(AssistantEvent::Heard { text: text.clone() });

        let reply = self
            .chat
            .lock()
            .await
            .send(&self.llm, &text)
            .await
            .inspect_err(|e| self.fail(e))?;

        self.emit(AssistantEvent::Reply {
            text: reply.clone(),
        });
        self.narrator.speak(&reply, self.language).await?;

        Ok(Some(reply))
    }

    /// Process activations until shutdown or until the sender is dropped
    pub async fn run(
        &self,
        mut activations: mpsc::Receiver<Activation>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                activation = activations.recv() => {
                    let Some(activation) = activation else { break };
                    if let Err(e) = self.handle_activation(activation).await {
                        tracing::warn!(error = %e, "voice request failed");
                    }
                }
                () = async { drop(shutdown.wait_for(|stop| *stop).await) } => break,
            }
        }

        if let Err(e) = self.close().await {
            tracing::debug!(error = %e, "close after shutdown failed");
        }
    }

    /// Close the chat and stop any narration
    ///
    /// # Errors
    ///
    /// Returns error if the narrator has shut down
    pub async fn close(&self) -> Result<()> {
        self.narrator.stop().await?;
        self.emit(AssistantEvent::Closed);
        Ok(())
    }

    fn fail(&self, error: &crate::Error) {
        self.emit(AssistantEvent::Failed {
            reason: error.to_string(),
        });
    }

    fn emit(&self, event: AssistantEvent) {
        tracing::trace!(?event, "assistant event");
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
