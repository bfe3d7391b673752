//! VidyaMitra Gateway - Voice narration and tutoring backend
//!
//! This library provides the core functionality for the VidyaMitra gateway:
//! - Narration of lesson text in Indian languages (on-device or remote voices)
//! - Wake word listening with single-shot speech capture
//! - The VidyaMitra tutor chat and generated study material
//! - An HTTP API for browser frontends
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │      Browser (HTTP API)      │   Microphone/Speaker  │
//! └──────────────┬───────────────┴──────────┬───────────┘
//!                │                          │
//! ┌──────────────▼───────────┐  ┌───────────▼───────────┐
//! │  Chat │ Learning │ TTS   │  │ Wake Word │ Narrator  │
//! │        routes            │  │       Assistant       │
//! └──────────────┬───────────┘  └───────────┬───────────┘
//!                │                          │
//! ┌──────────────▼──────────────────────────▼───────────┐
//! │   Groq (chat, transcription)  │  Speech endpoint     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod assistant;
pub mod chat;
pub mod config;
pub mod daemon;
pub mod error;
pub mod language;
pub mod learning;
pub mod llm;
pub mod voice;

pub use assistant::{Assistant, AssistantEvent};
pub use chat::ChatSession;
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use language::Language;
pub use llm::{ChatMessage, LlmClient};
