//! Gateway daemon
//!
//! Runs the HTTP API and, when audio hardware is available, the voice
//! assistant: wake word listener, single-shot capture, tutor reply and
//! narration. Ctrl-C flips a shared shutdown flag that every task watches.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::api::{ApiServer, ApiServerBuilder};
use crate::assistant::Assistant;
use crate::config::{Config, VoiceConfig};
use crate::language::Language;
use crate::llm::LlmClient;
use crate::voice::engine::{AudioOutput, SpeechProxy, SpeechRecognizer};
use crate::voice::{
    CpalOutput, EspeakSynthesizer, MicrophoneRecognizer, Narrator, NarratorBackends, RemoteTts,
    Transcriber, VoiceSelector, WakeWordService,
};
use crate::{Error, Result};

/// Activations queued while the assistant is busy answering
const ACTIVATION_QUEUE: usize = 4;

/// The VidyaMitra gateway daemon
pub struct Daemon {
    config: Config,
    llm: Arc<LlmClient>,
    server: ApiServer,
    language: Language,
}

impl Daemon {
    /// Create a daemon from loaded configuration
    ///
    /// `language` is the tutor language used by the voice assistant.
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be constructed
    pub fn new(config: Config, language: Language) -> Result<Self> {
        let server = ApiServerBuilder::from_config(&config)?.build();
        let llm = Arc::clone(server.llm());

        Ok(Self {
            config,
            llm,
            server,
            language,
        })
    }

    /// Run until interrupted or until the API server fails
    ///
    /// # Errors
    ///
    /// Returns error if the API server fails to bind or run
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            port = self.server.port(),
            language = self.language.code(),
            voice = self.config.voice.enabled,
            "daemon running"
        );

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let signal_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = signal_tx.send(true);
            }
        });

        let voice = if self.config.voice.enabled {
            match build_voice(&self.config, Arc::clone(&self.llm), self.language) {
                Ok((assistant, wake)) => Some(tokio::spawn(run_voice(
                    assistant,
                    wake,
                    shutdown_rx.clone(),
                ))),
                Err(e) => {
                    tracing::error!(error = %e, "voice assistant unavailable, serving API only");
                    None
                }
            }
        } else {
            tracing::info!("voice disabled, serving API only");
            None
        };

        let mut api = self.server.spawn();

        let result = tokio::select! {
            joined = &mut api => match joined {
                Ok(result) => result,
                Err(e) => Err(Error::Config(format!("API server task failed: {e}"))),
            },
            _ = shutdown_rx.wait_for(|stop| *stop) => {
                tracing::info!("shutdown requested");
                api.abort();
                Ok(())
            }
        };

        let _ = shutdown_tx.send(true);
        if let Some(voice) = voice {
            if let Err(e) = voice.await {
                tracing::warn!(error = %e, "voice task ended abnormally");
            }
        }

        tracing::info!("daemon stopped");
        result
    }
}

/// Narrator over the default output device
///
/// # Errors
///
/// Returns error if there is no output device or a speech client cannot be built
pub fn build_narrator(voice: &VoiceConfig) -> Result<Narrator> {
    let output: Arc<dyn AudioOutput> = Arc::new(CpalOutput::new()?);
    let synthesizer = Arc::new(EspeakSynthesizer::new(
        voice.espeak_binary.clone(),
        Arc::clone(&output),
    ));
    let proxy: Arc<dyn SpeechProxy> = match &voice.tts_proxy_url {
        Some(url) => Arc::new(RemoteTts::proxy(url.clone(), voice.tts_timeout)?),
        None => Arc::new(RemoteTts::upstream(
            voice.tts_upstream_url.clone(),
            voice.tts_timeout,
        )?),
    };

    Ok(Narrator::spawn(
        NarratorBackends {
            synthesizer,
            proxy,
            output,
        },
        VoiceSelector::new(voice.local_languages.clone()),
        voice.chunk_chars,
    ))
}

/// Recognizer over the default microphone
///
/// # Errors
///
/// Returns error if no transcription key is configured
pub fn build_recognizer(voice: &VoiceConfig) -> Result<Arc<dyn SpeechRecognizer>> {
    let api_key = voice.stt_api_key.clone().ok_or_else(|| {
        Error::Config("GROQ_API_KEY or VIDYAMITRA_STT_API_KEY is required for voice".to_string())
    })?;
    let transcriber = Arc::new(Transcriber::new(
        voice.stt_url.clone(),
        api_key,
        voice.stt_model.clone(),
        voice.stt_timeout,
    )?);

    Ok(Arc::new(MicrophoneRecognizer::new(transcriber)))
}

/// Wire the voice assistant to the default audio devices
///
/// # Errors
///
/// Returns error if there is no output device or no transcription key
pub fn build_voice(
    config: &Config,
    llm: Arc<LlmClient>,
    language: Language,
) -> Result<(Assistant, WakeWordService)> {
    let recognizer = build_recognizer(&config.voice)?;
    let narrator = build_narrator(&config.voice)?;

    let wake = WakeWordService::new(Arc::clone(&recognizer), config.voice.wake_words.clone());
    let assistant = Assistant::new(narrator, recognizer, llm, language);

    Ok((assistant, wake))
}

/// Listen for the wake word and answer until shutdown
pub async fn run_voice(
    assistant: Assistant,
    wake: WakeWordService,
    shutdown: watch::Receiver<bool>,
) {
    let (activations_tx, activations_rx) = mpsc::channel(ACTIVATION_QUEUE);

    let listener = tokio::spawn(wake.run(activations_tx, shutdown.clone()));
    assistant.run(activations_rx, shutdown).await;

    match listener.await {
        Ok(Ok(())) => {}
        Ok(Err(Error::Permission(reason))) => {
            tracing::error!(%reason, "microphone access refused, wake word disabled");
        }
        Ok(Err(e)) => tracing::error!(error = %e, "wake word listener failed"),
        Err(e) => tracing::warn!(error = %e, "wake word task ended abnormally"),
    }
}
