//! Wake word listening
//!
//! [`WakeWordListener`] is the decision logic: it turns recognition events
//! into restart, activate or disable actions based on an explicit desired
//! state. [`WakeWordService`] drives it against a [`SpeechRecognizer`].
//!
//! Only one service may listen per process; [`ListenerLock`] enforces this.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::language::Language;
use crate::{Error, Result};

use super::engine::{RecognitionError, RecognitionEvent, RecognitionOptions, SpeechRecognizer};

/// Phrases that activate the assistant when none are configured
pub const DEFAULT_WAKE_WORDS: &[&str] = &["vidyamitra", "vidya mitra"];

/// Wake phrases are English words, so the always-on session is recognized
/// in English whatever the tutor language is
pub const WAKE_WORD_LANGUAGE: Language = Language::English;

/// Pause between a recognition session ending and the next one starting
const RESTART_BACKOFF: Duration = Duration::from_millis(300);

/// A detected wake phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    /// Full transcript that contained the phrase
    pub transcript: String,
    /// Speech following the wake phrase in the same utterance, if any
    pub request: Option<String>,
}

/// What the driver should do after a recognition event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerAction {
    /// Nothing to do
    Idle,
    /// The session ended while enabled; start a new one
    Restart,
    /// A wake phrase was heard
    Activate(Activation),
    /// Recognition is not permitted; stop listening for good
    Disable,
}

/// Desired-state machine for always-on wake word detection
#[derive(Debug, Clone)]
pub struct WakeWordListener {
    wake_words: Vec<String>,
    enabled: bool,
}

impl WakeWordListener {
    /// Create a disabled listener for the given phrases
    #[must_use]
    pub fn new(wake_words: Vec<String>) -> Self {
        let wake_words: Vec<String> = wake_words
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        tracing::debug!(wake_words = ?wake_words, "wake word listener initialized");

        Self {
            wake_words,
            enabled: false,
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn wake_words(&self) -> &[String] {
        &self.wake_words
    }

    /// Check a transcript for any configured wake phrase
    #[must_use]
    pub fn detect(&self, transcript: &str) -> Option<Activation> {
        let normalized = transcript.to_lowercase();

        self.wake_words
            .iter()
            .find(|w| normalized.contains(w.as_str()))
            .map(|wake_word| {
                tracing::info!(wake_word, transcript, "wake word detected");
                let request = extract_command(transcript, wake_word);
                Activation {
                    transcript: transcript.to_string(),
                    request: (!request.is_empty()).then_some(request),
                }
            })
    }

    /// Decide how to react to a recognition event
    ///
    /// Interim results are ignored so one utterance cannot activate twice.
    pub fn on_event(&mut self, event: RecognitionEvent) -> ListenerAction {
        match event {
            RecognitionEvent::Result {
                transcript,
                is_final,
            } => {
                if !self.enabled || !is_final {
                    return ListenerAction::Idle;
                }
                self.detect(&transcript)
                    .map_or(ListenerAction::Idle, ListenerAction::Activate)
            }
            RecognitionEvent::Error(error) if error.is_permission() => {
                tracing::warn!(?error, "speech recognition not allowed, disabling wake word");
                self.enabled = false;
                ListenerAction::Disable
            }
            RecognitionEvent::Error(error) => {
                tracing::debug!(?error, "recognition error");
                ListenerAction::Idle
            }
            RecognitionEvent::End if self.enabled => ListenerAction::Restart,
            RecognitionEvent::End => ListenerAction::Idle,
        }
    }
}

/// Strip the wake phrase and separators from the front of a request
#[must_use]
pub fn extract_command(transcript: &str, wake_word: &str) -> String {
    match_end(transcript, wake_word).map_or_else(
        || transcript.to_string(),
        |end| {
            transcript[end..]
                .trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == '.')
                .trim_end()
                .to_string()
        },
    )
}

/// Byte offset in `haystack` just past the first case-insensitive match of
/// `needle`
///
/// Offsets are taken from `haystack` itself; lowercasing can change a
/// character's encoded length.
fn match_end(haystack: &str, needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return Some(0);
    }

    haystack.char_indices().find_map(|(start, _)| {
        let mut expected = needle.iter();
        for (offset, c) in haystack[start..].char_indices() {
            for lower in c.to_lowercase() {
                if expected.next() != Some(&lower) {
                    return None;
                }
            }
            if expected.len() == 0 {
                return Some(start + offset + c.len_utf8());
            }
        }
        None
    })
}

/// Single-instance guard for wake word listening
#[derive(Debug, Default)]
pub struct ListenerLock {
    active: AtomicBool,
}

impl ListenerLock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }

    /// The process-wide lock
    #[must_use]
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<ListenerLock>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Claim the lock until the guard is dropped
    ///
    /// # Errors
    ///
    /// Returns error if another listener already holds it
    pub fn acquire(self: &Arc<Self>) -> Result<ListenerGuard> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::WakeWord("a wake word listener is already running".to_string()))?;

        Ok(ListenerGuard {
            lock: Arc::clone(self),
        })
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases the [`ListenerLock`] on drop
#[derive(Debug)]
pub struct ListenerGuard {
    lock: Arc<ListenerLock>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.lock.active.store(false, Ordering::Release);
    }
}

/// Continuous wake word listening over a recognizer
pub struct WakeWordService {
    recognizer: Arc<dyn SpeechRecognizer>,
    listener: WakeWordListener,
    locale: String,
    lock: Arc<ListenerLock>,
    backoff: Duration,
}

impl WakeWordService {
    /// Create a service guarded by the process-wide lock
    ///
    /// Recognition runs in [`WAKE_WORD_LANGUAGE`]; follow-up requests are
    /// captured separately in the tutor's language.
    #[must_use]
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, wake_words: Vec<String>) -> Self {
        Self {
            recognizer,
            listener: WakeWordListener::new(wake_words),
            locale: WAKE_WORD_LANGUAGE.recognition_locale().to_string(),
            lock: ListenerLock::global(),
            backoff: RESTART_BACKOFF,
        }
    }

    /// Use a different single-instance lock
    #[must_use]
    pub fn with_lock(mut self, lock: Arc<ListenerLock>) -> Self {
        self.lock = lock;
        self
    }

    /// Change the pause between recognition sessions
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Listen until `shutdown` becomes true, sending activations
    ///
    /// Returns once shut down, once the activation receiver is dropped, or
    /// once recognition is refused.
    ///
    /// # Errors
    ///
    /// Returns error if another listener is running, or a permission error
    /// if recognition was refused
    pub async fn run(
        mut self,
        activations: mpsc::Sender<Activation>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let _guard = self.lock.acquire()?;
        self.listener.enable();
        tracing::info!(locale = %self.locale, "wake word listening started");

        let result = 'session: loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            let options = RecognitionOptions::continuous(self.locale.clone());
            let mut events = match self.recognizer.start(options).await {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to start recognition");
                    if wait_or_shutdown(self.backoff, &mut shutdown).await {
                        break Ok(());
                    }
                    continue;
                }
            };

            loop {
                let event = tokio::select! {
                    event = events.recv() => event.unwrap_or(RecognitionEvent::End),
                    _ = shutdown.wait_for(|stop| *stop) => break 'session Ok(()),
                };

                let refusal = match &event {
                    RecognitionEvent::Error(RecognitionError::NotAllowed(reason)) => {
                        Some(reason.clone())
                    }
                    _ => None,
                };
                let ended = event == RecognitionEvent::End;

                match self.listener.on_event(event) {
                    ListenerAction::Idle if ended => break 'session Ok(()),
                    ListenerAction::Idle => {}
                    ListenerAction::Activate(activation) => {
                        if activations.send(activation).await.is_err() {
                            tracing::debug!("activation receiver dropped");
                            break 'session Ok(());
                        }
                    }
                    ListenerAction::Restart => {
                        tracing::debug!("recognition ended, restarting");
                        if wait_or_shutdown(self.backoff, &mut shutdown).await {
                            break 'session Ok(());
                        }
                        continue 'session;
                    }
                    ListenerAction::Disable => {
                        break 'session Err(Error::Permission(
                            refusal.unwrap_or_else(|| "speech recognition not allowed".to_string()),
                        ));
                    }
                }
            }
        };

        self.listener.disable();
        tracing::info!("wake word listening stopped");
        result
    }
}

/// Sleep for `delay`; returns true if shutdown was requested meanwhile
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => *shutdown.borrow(),
        () = async { drop(shutdown.wait_for(|stop| *stop).await) } => true,
    }
}

/// Capture one spoken request
///
/// Returns the first final transcript, or `None` if the session ended
/// without one.
///
/// # Errors
///
/// Returns a permission error if recognition was refused, or the
/// recognizer's error if it could not start
pub async fn capture_utterance(
    recognizer: &dyn SpeechRecognizer,
    locale: &str,
) -> Result<Option<String>> {
    let mut events = recognizer.start(RecognitionOptions::single_shot(locale)).await?;

    while let Some(event) = events.recv().await {
        match event {
            RecognitionEvent::Result {
                transcript,
                is_final: true,
            } if !transcript.trim().is_empty() => {
                return Ok(Some(transcript.trim().to_string()));
            }
            RecognitionEvent::Result { .. } => {}
            RecognitionEvent::Error(RecognitionError::NotAllowed(reason)) => {
                return Err(Error::Permission(reason));
            }
            RecognitionEvent::Error(error) => {
                tracing::debug!(?error, "utterance capture error");
            }
            RecognitionEvent::End => break,
        }
    }

    Ok(None)
}
