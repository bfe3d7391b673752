//! TOML configuration file loading
//!
//! Supports `~/.config/vidyamitra/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VidyaMitraConfigFile {
    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Narration and listening configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// API key for the completion endpoint
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    pub base_url: Option<String>,

    /// Model identifier (e.g. "llama-3.3-70b-versatile")
    pub model: Option<String>,
}

/// Voice configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable the wake word assistant when serving
    pub enabled: Option<bool>,

    /// Languages allowed to use on-device voices
    pub local_languages: Option<Vec<String>>,

    /// Wake phrases
    pub wake_words: Option<Vec<String>>,

    /// Speech proxy the narrator fetches chunks from
    pub tts_proxy_url: Option<String>,

    /// Upstream speech endpoint
    pub tts_upstream_url: Option<String>,

    /// Transcription API base URL
    pub stt_url: Option<String>,

    /// Transcription model (e.g. "whisper-large-v3")
    pub stt_model: Option<String>,

    /// Transcription API key, when different from the LLM key
    pub stt_api_key: Option<String>,

    /// Path or name of the espeak-ng binary
    pub espeak_binary: Option<String>,

    /// Maximum characters per remote speech chunk
    pub chunk_chars: Option<usize>,
}

/// Server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Requests per minute across all clients
    pub rate_limit: Option<u32>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VidyaMitraConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VidyaMitraConfigFile {
    config_file_path().map_or_else(VidyaMitraConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path
pub fn load_from(path: &Path) -> VidyaMitraConfigFile {
    if !path.exists() {
        return VidyaMitraConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VidyaMitraConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VidyaMitraConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/vidyamitra/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("vidyamitra").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("config.toml"));
        assert!(config.llm.model.is_none());
        assert!(config.server.port.is_none());
    }

    #[test]
    fn partial_file_overlays() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[llm]\nmodel = \"mixtral\"\n\n[voice]\nwake_words = [\"hey vidya\"]\nchunk_chars = 120\n\n[server]\nport = 8080"
        )
        .unwrap();

        let config = load_from(file.path());
        assert_eq!(config.llm.model.as_deref(), Some("mixtral"));
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.voice.wake_words, Some(vec!["hey vidya".to_string()]));
        assert_eq!(config.voice.chunk_chars, Some(120));
        assert_eq!(config.server.port, Some(8080));
    }

    #[test]
    fn invalid_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"not a number\"").unwrap();
        assert!(load_from(file.path()).server.port.is_none());
    }
}
