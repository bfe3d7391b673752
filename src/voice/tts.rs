//! Remote text-to-speech over HTTP
//!
//! Two endpoint shapes are supported: the gateway's own `/api/tts` proxy,
//! and the upstream translate speech endpoint that the proxy forwards to.

use std::time::Duration;

use async_trait::async_trait;

use crate::language::Language;
use crate::{Error, Result};

use super::engine::SpeechProxy;

/// Default upstream speech endpoint
pub const DEFAULT_UPSTREAM_URL: &str = "https://translate.google.com/translate_tts";

/// Default request timeout for speech fetches
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Browser User-Agent sent upstream; the endpoint rejects bare clients
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Shape of the remote endpoint
#[derive(Clone, Debug)]
enum TtsEndpoint {
    /// `GET {url}?text=..&lang=..`
    Proxy { url: String },
    /// `GET {url}?ie=UTF-8&q=..&tl=..&client=tw-ob`
    Upstream { url: String },
}

/// Fetches MP3 audio for short text from a remote endpoint
#[derive(Clone, Debug)]
pub struct RemoteTts {
    client: reqwest::Client,
    endpoint: TtsEndpoint,
}

impl RemoteTts {
    /// Client for the gateway's `/api/tts` proxy at `url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty or the HTTP client cannot be built
    pub fn proxy(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(Error::Config("TTS proxy URL required".to_string()));
        }
        Self::build(TtsEndpoint::Proxy { url }, timeout)
    }

    /// Client for the upstream speech endpoint at `url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty or the HTTP client cannot be built
    pub fn upstream(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(Error::Config("TTS upstream URL required".to_string()));
        }
        Self::build(TtsEndpoint::Upstream { url }, timeout)
    }

    fn build(endpoint: TtsEndpoint, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self { client, endpoint })
    }

    /// Full request URL for `text` in `lang`
    #[must_use]
    pub fn request_url(&self, text: &str, lang: &str) -> String {
        let text = urlencoding::encode(text);
        let lang = urlencoding::encode(lang);
        match &self.endpoint {
            TtsEndpoint::Proxy { url } => format!("{url}?text={text}&lang={lang}"),
            TtsEndpoint::Upstream { url } => {
                format!("{url}?ie=UTF-8&q={text}&tl={lang}&client=tw-ob")
            }
        }
    }

    /// Synthesize text to speech
    ///
    /// `lang` is passed through as-is so callers can request languages
    /// beyond the ones the narrator knows.
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the endpoint returns a non-success status
    pub async fn synthesize(&self, text: &str, lang: &str) -> Result<Vec<u8>> {
        let url = self.request_url(text, lang);
        tracing::debug!(chars = text.chars().count(), lang, "requesting speech audio");

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!(error = %e, "speech request failed");
            e
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("speech endpoint error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(Error::Tts("speech endpoint returned no audio".to_string()));
        }

        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechProxy for RemoteTts {
    async fn fetch(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        self.synthesize(text, language.code()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_url_encodes_text() {
        let tts = RemoteTts::proxy("http://localhost:3001/api/tts", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            tts.request_url("नमस्ते दुनिया & more", "hi"),
            "http://localhost:3001/api/tts?text=%E0%A4%A8%E0%A4%AE%E0%A4%B8%E0%A5%8D%E0%A4%A4%E0%A5%87%20%E0%A4%A6%E0%A5%81%E0%A4%A8%E0%A4%BF%E0%A4%AF%E0%A4%BE%20%26%20more&lang=hi"
        );
    }

    #[test]
    fn upstream_url_uses_translate_params() {
        let tts = RemoteTts::upstream(DEFAULT_UPSTREAM_URL, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            tts.request_url("hello world", "ta"),
            "https://translate.google.com/translate_tts?ie=UTF-8&q=hello%20world&tl=ta&client=tw-ob"
        );
    }

    #[test]
    fn empty_url_is_config_error() {
        assert!(matches!(
            RemoteTts::proxy("", DEFAULT_TIMEOUT),
            Err(Error::Config(_))
        ));
    }
}
