//! Speech-to-text (STT) processing
//!
//! Uses the Whisper-compatible `/audio/transcriptions` endpoint, which Groq
//! and OpenAI both serve.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

use super::capture::samples_to_wav;

/// Default transcription model
pub const DEFAULT_STT_MODEL: &str = "whisper-large-v3";

/// Response from the transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes speech to text
pub struct Transcriber {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl Transcriber {
    /// Create a transcriber for an OpenAI-compatible API at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("API key required for transcription".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    /// Transcribe WAV audio
    ///
    /// `language` is an ISO-639-1 hint (`hi`, `ta`); pass `None` to let the
    /// model detect it.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API returns a non-success status
    pub async fn transcribe(&self, audio: &[u8], language: Option<&str>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), language, "starting transcription");

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!("transcription API error {status}: {body}")));
        }

        let result: TranscriptionResponse = response.json().await?;
        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    /// Transcribe raw mono samples
    ///
    /// # Errors
    ///
    /// Returns error if encoding or transcription fails
    pub async fn transcribe_samples(
        &self,
        samples: &[f32],
        sample_rate: u32,
        language: Option<&str>,
    ) -> Result<String> {
        let wav = samples_to_wav(samples, sample_rate)?;
        self.transcribe(&wav, language).await
    }
}
