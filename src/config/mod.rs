//! Configuration management for the VidyaMitra gateway
//!
//! Values resolve as environment > TOML file > built-in default.

pub mod file;

use std::time::Duration;

use secrecy::SecretString;

use crate::language::Language;
use crate::voice::{
    DEFAULT_ESPEAK_BINARY, DEFAULT_LOCAL_LANGUAGES, DEFAULT_STT_MODEL, DEFAULT_TTS_TIMEOUT,
    DEFAULT_UPSTREAM_URL, DEFAULT_WAKE_WORDS, MAX_CHUNK_CHARS,
};
use crate::{Error, Result};

use file::VidyaMitraConfigFile;

/// Default OpenAI-compatible API base
pub const DEFAULT_LLM_URL: &str = "https://api.groq.com/openai/v1";

/// Default chat model
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3001;

/// Timeout for completion and transcription requests
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// VidyaMitra gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Completion endpoint
    pub llm: LlmConfig,

    /// Narration and listening
    pub voice: VoiceConfig,

    /// HTTP API server
    pub api_server: ApiServerConfig,
}

/// LLM endpoint configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key (`GROQ_API_KEY`); LLM features are unavailable without it
    pub api_key: Option<SecretString>,

    /// Base URL of an OpenAI-compatible API
    pub base_url: String,

    /// Model identifier
    pub model: String,

    pub timeout: Duration,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Run the wake word assistant alongside the server
    pub enabled: bool,

    /// Languages allowed to use an on-device voice
    pub local_languages: Vec<Language>,

    /// Phrases that activate the assistant
    pub wake_words: Vec<String>,

    /// `/api/tts` proxy for the narrator; the upstream is called directly when unset
    pub tts_proxy_url: Option<String>,

    /// Upstream speech endpoint used by the proxy route
    pub tts_upstream_url: String,

    pub tts_timeout: Duration,

    /// Transcription API base URL
    pub stt_url: String,

    /// Transcription model
    pub stt_model: String,

    /// Transcription key, falling back to the LLM key
    pub stt_api_key: Option<SecretString>,

    pub stt_timeout: Duration,

    /// espeak-ng binary
    pub espeak_binary: String,

    /// Maximum characters per remote speech chunk
    pub chunk_chars: usize,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Global requests per minute; unlimited when unset
    pub rate_limit: Option<u32>,
}

impl Config {
    /// Load configuration from the environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if a configured value cannot be parsed
    pub fn load(disable_voice: bool) -> Result<Self> {
        let config = Self::resolve(
            |key| std::env::var(key).ok(),
            file::load_config_file(),
            disable_voice,
        )?;

        if disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
        }

        Ok(config)
    }

    /// Resolve configuration from a variable lookup and a parsed file
    ///
    /// # Errors
    ///
    /// Returns error if a configured value cannot be parsed
    pub fn resolve(
        env: impl Fn(&str) -> Option<String>,
        fc: VidyaMitraConfigFile,
        disable_voice: bool,
    ) -> Result<Self> {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        // LLM (env > toml > default)
        let llm_key = var("GROQ_API_KEY").or(fc.llm.api_key);
        let llm = LlmConfig {
            api_key: llm_key.clone().map(SecretString::from),
            base_url: var("VIDYAMITRA_LLM_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_LLM_URL.to_string()),
            model: var("VIDYAMITRA_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            timeout: DEFAULT_LLM_TIMEOUT,
        };

        // API server (env > toml > default)
        let port = match var("VIDYAMITRA_PORT").or_else(|| var("PORT")) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid port: {raw}")))?,
            None => fc.server.port.unwrap_or(DEFAULT_PORT),
        };
        let rate_limit = match var("VIDYAMITRA_RATE_LIMIT") {
            Some(raw) => Some(
                raw.trim()
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid rate limit: {raw}")))?,
            ),
            None => fc.server.rate_limit,
        }
        .filter(|&n: &u32| n > 0);
        let api_server = ApiServerConfig { port, rate_limit };

        // Voice (env > toml > default)
        let local_languages = match var("VIDYAMITRA_LOCAL_VOICES") {
            Some(raw) => parse_languages(&split_list(&raw))?,
            None => match fc.voice.local_languages {
                Some(codes) => parse_languages(&codes)?,
                None => DEFAULT_LOCAL_LANGUAGES.to_vec(),
            },
        };

        let wake_words = var("VIDYAMITRA_WAKE_WORDS")
            .map(|raw| split_list(&raw))
            .or(fc.voice.wake_words)
            .filter(|words| !words.is_empty())
            .unwrap_or_else(|| DEFAULT_WAKE_WORDS.iter().map(ToString::to_string).collect());

        let stt_url = var("VIDYAMITRA_STT_URL")
            .or(fc.voice.stt_url)
            .unwrap_or_else(|| llm.base_url.clone());

        let voice = VoiceConfig {
            enabled: !disable_voice && fc.voice.enabled.unwrap_or(true),
            local_languages,
            wake_words,
            tts_proxy_url: var("VIDYAMITRA_TTS_PROXY_URL").or(fc.voice.tts_proxy_url),
            tts_upstream_url: var("VIDYAMITRA_TTS_UPSTREAM_URL")
                .or(fc.voice.tts_upstream_url)
                .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
            tts_timeout: DEFAULT_TTS_TIMEOUT,
            stt_url,
            stt_model: var("VIDYAMITRA_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
            stt_api_key: var("VIDYAMITRA_STT_API_KEY")
                .or(fc.voice.stt_api_key)
                .or(llm_key)
                .map(SecretString::from),
            stt_timeout: DEFAULT_LLM_TIMEOUT,
            espeak_binary: var("VIDYAMITRA_ESPEAK")
                .or(fc.voice.espeak_binary)
                .unwrap_or_else(|| DEFAULT_ESPEAK_BINARY.to_string()),
            chunk_chars: fc
                .voice
                .chunk_chars
                .filter(|&n| n > 0)
                .unwrap_or(MAX_CHUNK_CHARS),
        };

        Ok(Self {
            llm,
            voice,
            api_server,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_languages(codes: &[String]) -> Result<Vec<Language>> {
    codes
        .iter()
        .map(|code| {
            code.parse()
                .map_err(|_| Error::Config(format!("unsupported local voice language: {code}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn resolve_with(vars: &[(&str, &str)], fc: VidyaMitraConfigFile) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::resolve(|key| vars.get(key).cloned(), fc, false)
    }

    #[test]
    fn defaults_without_sources() {
        let config = resolve_with(&[], VidyaMitraConfigFile::default()).unwrap();

        assert!(config.llm.api_key.is_none());
        assert_eq!(config.llm.base_url, DEFAULT_LLM_URL);
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert_eq!(config.api_server.port, 3001);
        assert!(config.api_server.rate_limit.is_none());
        assert_eq!(config.voice.local_languages, vec![Language::English, Language::Hindi]);
        assert_eq!(config.voice.wake_words, vec!["vidyamitra", "vidya mitra"]);
        assert_eq!(config.voice.chunk_chars, 180);
        assert_eq!(config.voice.stt_model, "whisper-large-v3");
        assert_eq!(config.voice.stt_url, DEFAULT_LLM_URL);
        assert!(config.voice.enabled);
    }

    #[test]
    fn env_overrides_file() {
        let mut fc = VidyaMitraConfigFile::default();
        fc.llm.model = Some("from-file".to_string());
        fc.server.port = Some(9000);
        fc.voice.stt_model = Some("whisper-file".to_string());

        let config = resolve_with(
            &[("VIDYAMITRA_LLM_MODEL", "from-env"), ("PORT", "4000")],
            fc,
        )
        .unwrap();

        assert_eq!(config.llm.model, "from-env");
        assert_eq!(config.api_server.port, 4000);
        assert_eq!(config.voice.stt_model, "whisper-file");
    }

    #[test]
    fn stt_key_falls_back_to_llm_key() {
        let config = resolve_with(&[("GROQ_API_KEY", "gsk_test")], VidyaMitraConfigFile::default())
            .unwrap();
        assert_eq!(
            config.voice.stt_api_key.as_ref().map(|k| k.expose_secret()),
            Some("gsk_test")
        );
        assert!(!format!("{config:?}").contains("gsk_test"));
    }

    #[test]
    fn parses_lists() {
        let config = resolve_with(
            &[
                ("VIDYAMITRA_LOCAL_VOICES", "en, ta ,"),
                ("VIDYAMITRA_WAKE_WORDS", "hey vidya"),
                ("VIDYAMITRA_RATE_LIMIT", "120"),
            ],
            VidyaMitraConfigFile::default(),
        )
        .unwrap();

        assert_eq!(config.voice.local_languages, vec![Language::English, Language::Tamil]);
        assert_eq!(config.voice.wake_words, vec!["hey vidya"]);
        assert_eq!(config.api_server.rate_limit, Some(120));
    }

    #[test]
    fn rejects_bad_values() {
        let bad_port = resolve_with(&[("VIDYAMITRA_PORT", "abc")], VidyaMitraConfigFile::default());
        assert!(matches!(bad_port, Err(Error::Config(_))));

        let bad_lang =
            resolve_with(&[("VIDYAMITRA_LOCAL_VOICES", "xx")], VidyaMitraConfigFile::default());
        assert!(matches!(bad_lang, Err(Error::Config(_))));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let config = resolve_with(&[("GROQ_API_KEY", "  ")], VidyaMitraConfigFile::default())
            .unwrap();
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn disable_voice_wins() {
        let config = Config::resolve(|_| None, VidyaMitraConfigFile::default(), true).unwrap();
        assert!(!config.voice.enabled);
    }
}
