//! Voice processing module
//!
//! Narration (text to speech through an on-device voice or the chunked
//! remote path) and listening (wake word detection and utterance capture).
//! Control logic talks to the traits in [`engine`]; the concrete backends
//! are cpal output, the espeak CLI, the remote TTS proxy and a microphone
//! recognizer over a Whisper-compatible API.

mod capture;
mod chunking;
mod controller;
pub mod engine;
mod espeak;
mod narrator;
mod playback;
mod recognizer;
mod sanitize;
mod segmenter;
mod selector;
mod stt;
mod tts;
mod wake_word;

pub use capture::{AudioCapture, SAMPLE_RATE, rms_energy, samples_to_wav};
pub use chunking::{MAX_CHUNK_CHARS, chunk_text};
pub use controller::{
    Action, BackendEvent, ChunkProgress, NarrationRequest, PlaybackController, PlaybackState,
    SessionId,
};
pub use engine::{
    AudioClip, AudioOutput, PlaybackHandle, RecognitionError, RecognitionEvent, RecognitionMode,
    RecognitionOptions, SpeechProxy, SpeechRecognizer, SpeechSynthesizer, VoiceInfo,
};
pub use espeak::{DEFAULT_ESPEAK_BINARY, EspeakSynthesizer};
pub use narrator::{Narrator, NarratorBackends, PlaybackStatus};
pub use playback::{CpalOutput, decode_mp3};
pub use recognizer::MicrophoneRecognizer;
pub use sanitize::{MARKUP_CHARS, sanitize};
pub use segmenter::{SegmenterState, SpeechSegmenter};
pub use selector::{DEFAULT_LOCAL_LANGUAGES, VoiceRoute, VoiceSelector};
pub use stt::{DEFAULT_STT_MODEL, Transcriber};
pub use tts::{DEFAULT_TIMEOUT as DEFAULT_TTS_TIMEOUT, DEFAULT_UPSTREAM_URL, RemoteTts};
pub use wake_word::{
    Activation, DEFAULT_WAKE_WORDS, ListenerAction, ListenerGuard, ListenerLock, WAKE_WORD_LANGUAGE,
    WakeWordListener, WakeWordService, capture_utterance, extract_command,
};
