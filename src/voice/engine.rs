//! Speech backend interfaces
//!
//! The narrator and wake-word listener only talk to these traits, so the
//! control logic runs the same against audio hardware, the espeak CLI or
//! scripted test doubles.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::language::Language;
use crate::{Error, Result};

/// Audio payload handed to an output device
#[derive(Debug, Clone)]
pub enum AudioClip {
    /// MP3 bytes as returned by the remote speech endpoint
    Mpeg(Vec<u8>),
    /// Mono f32 samples
    Pcm { samples: Vec<f32>, sample_rate: u32 },
}

impl AudioClip {
    /// Size of the payload in bytes or samples, for logging
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Mpeg(bytes) => bytes.len(),
            Self::Pcm { samples, .. } => samples.len(),
        }
    }

    /// Whether the clip carries no audio
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Completion handle for a clip or utterance that has started playing
///
/// Resolves when playback ends naturally, fails, or is stopped.
#[derive(Debug)]
pub struct PlaybackHandle {
    done: oneshot::Receiver<Result<()>>,
}

impl PlaybackHandle {
    /// Create a handle together with the sender that completes it
    #[must_use]
    pub fn channel() -> (oneshot::Sender<Result<()>>, Self) {
        let (tx, done) = oneshot::channel();
        (tx, Self { done })
    }

    /// A handle that is already finished
    #[must_use]
    pub fn finished_with(result: Result<()>) -> Self {
        let (tx, handle) = Self::channel();
        let _ = tx.send(result);
        handle
    }

    /// Wait for playback to end
    ///
    /// # Errors
    ///
    /// Returns the backend's playback error, or a playback error if the
    /// backend dropped the handle without reporting
    pub async fn finished(self) -> Result<()> {
        self.done
            .await
            .map_err(|_| Error::Playback("playback abandoned by backend".to_string()))?
    }
}

/// A speaker the narrator can play clips through
///
/// `start` must begin playback before returning so that a `stop` issued
/// afterwards always halts it.
pub trait AudioOutput: Send + Sync {
    /// Begin playing a clip
    fn start(&self, clip: AudioClip) -> PlaybackHandle;

    /// Pause the active clip, retaining position
    fn pause(&self);

    /// Resume the active clip from its retained position
    fn resume(&self);

    /// Halt the active clip; safe to call when nothing is playing
    fn stop(&self);
}

/// An installed on-device voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    /// Engine-specific voice name
    pub name: String,
    /// BCP-47 style language tag (`hi`, `en-US`)
    pub lang: String,
}

impl VoiceInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// On-device speech synthesis engine
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Voices currently registered with the engine
    async fn voices(&self) -> Vec<VoiceInfo>;

    /// Queue a single utterance in the given locale
    fn speak(&self, text: &str, locale: &str) -> PlaybackHandle;

    /// Pause the active utterance
    fn pause(&self);

    /// Resume the paused utterance
    fn resume(&self);

    /// Cancel the active utterance; safe to call when idle
    fn cancel(&self);
}

/// Remote endpoint that renders text to MP3 audio
#[async_trait]
pub trait SpeechProxy: Send + Sync {
    /// Fetch audio for one chunk of text
    async fn fetch(&self, text: &str, language: Language) -> Result<Vec<u8>>;
}

/// How long a recognition session listens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionMode {
    /// Keep listening across utterances until stopped
    Continuous,
    /// End after the first final result
    SingleShot,
}

/// Parameters for a recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub locale: String,
    pub mode: RecognitionMode,
    pub interim_results: bool,
}

impl RecognitionOptions {
    /// Always-on listening used for wake word detection
    #[must_use]
    pub fn continuous(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            mode: RecognitionMode::Continuous,
            interim_results: true,
        }
    }

    /// One utterance, final results only
    #[must_use]
    pub fn single_shot(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            mode: RecognitionMode::SingleShot,
            interim_results: false,
        }
    }
}

/// Why a recognition session reported an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// Recognition is unsupported or access was denied
    NotAllowed(String),
    /// No speech was heard before the session gave up
    NoSpeech,
    /// Transport or engine failure
    Failed(String),
}

impl RecognitionError {
    /// Whether the error disables recognition for the rest of the session
    #[must_use]
    pub const fn is_permission(&self) -> bool {
        matches!(self, Self::NotAllowed(_))
    }
}

/// Event emitted by a recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// A transcript, interim or final
    Result { transcript: String, is_final: bool },
    /// The session hit an error; `End` follows
    Error(RecognitionError),
    /// The session ended
    End,
}

/// Speech-to-text engine
///
/// Dropping the returned receiver stops the session.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Start a recognition session
    async fn start(&self, options: RecognitionOptions) -> Result<mpsc::Receiver<RecognitionEvent>>;
}
