//! Error types for the VidyaMitra gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the VidyaMitra gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing credentials, bad settings)
    #[error("configuration error: {0}")]
    Config(String),

    /// Voice processing error
    #[error("voice error: {0}")]
    Voice(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Playback failed mid-narration
    #[error("playback error: {0}")]
    Playback(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Wake word listener error
    #[error("wake word error: {0}")]
    WakeWord(String),

    /// Speech recognition unsupported or denied
    #[error("permission error: {0}")]
    Permission(String),

    /// LLM provider returned an error status
    #[error("LLM error: {0}")]
    Llm(String),

    /// LLM output could not be parsed as the requested structure
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Caller supplied unusable input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
