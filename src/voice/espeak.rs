//! On-device speech synthesis through the `espeak-ng` CLI
//!
//! `espeak-ng --stdout` renders WAV which is decoded with `hound` and played
//! through the shared [`AudioOutput`]. The installed voice list comes from
//! `espeak-ng --voices`.

use std::io::Cursor;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{Error, Result};

use super::engine::{AudioClip, AudioOutput, PlaybackHandle, SpeechSynthesizer, VoiceInfo};

/// Maximum time to wait for espeak-ng to render or list voices
const ESPEAK_TIMEOUT: Duration = Duration::from_secs(30);

/// Default binary name
pub const DEFAULT_ESPEAK_BINARY: &str = "espeak-ng";

/// Speech synthesizer backed by `espeak-ng`
#[derive(Clone)]
pub struct EspeakSynthesizer {
    binary: String,
    output: Arc<dyn AudioOutput>,
    /// Bumped on every speak and cancel; renders finishing under an older
    /// ticket are discarded instead of played
    generation: Arc<Mutex<u64>>,
    /// Pause requested for the current utterance, possibly before its
    /// render finished
    paused: Arc<AtomicBool>,
}

impl EspeakSynthesizer {
    /// Create a synthesizer that plays through `output`
    #[must_use]
    pub fn new(binary: impl Into<String>, output: Arc<dyn AudioOutput>) -> Self {
        Self {
            binary: binary.into(),
            output,
            generation: Arc::new(Mutex::new(0)),
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Render text to mono samples without playing it
    ///
    /// # Errors
    ///
    /// Returns error if espeak-ng is missing, fails, or times out
    pub async fn render(&self, text: &str, locale: &str) -> Result<(Vec<f32>, u32)> {
        let voice = espeak_voice(locale);
        let mut command = Command::new(&self.binary);
        command
            .arg("--stdout")
            .arg("-v")
            .arg(&voice)
            .arg(text)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = run_with_timeout(&mut command, &self.binary).await?;
        tracing::debug!(voice, bytes = output.len(), "espeak render complete");
        decode_wav(&output)
    }
}

#[async_trait]
impl SpeechSynthesizer for EspeakSynthesizer {
    async fn voices(&self) -> Vec<VoiceInfo> {
        let mut command = Command::new(&self.binary);
        command
            .arg("--voices")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match run_with_timeout(&mut command, &self.binary).await {
            Ok(stdout) => parse_voice_list(&String::from_utf8_lossy(&stdout)),
            Err(e) => {
                tracing::warn!(error = %e, "could not list espeak voices");
                Vec::new()
            }
        }
    }

    fn speak(&self, text: &str, locale: &str) -> PlaybackHandle {
        let ticket = {
            let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
            *generation += 1;
            self.paused.store(false, Ordering::SeqCst);
            *generation
        };

        let (done, handle) = PlaybackHandle::channel();
        let this = self.clone();
        let text = text.to_string();
        let locale = locale.to_string();

        tokio::spawn(async move {
            let result = match this.render(&text, &locale).await {
                Ok((samples, sample_rate)) => {
                    let playing = {
                        let generation =
                            this.generation.lock().unwrap_or_else(PoisonError::into_inner);
                        (*generation == ticket).then(|| {
                            let handle = this.output.start(AudioClip::Pcm {
                                samples,
                                sample_rate,
                            });
                            if this.paused.load(Ordering::SeqCst) {
                                this.output.pause();
                            }
                            handle
                        })
                    };
                    match playing {
                        Some(handle) => handle.finished().await,
                        None => Ok(()),
                    }
                }
                Err(e) => Err(e),
            };
            let _ = done.send(result);
        });

        handle
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        self.output.pause();
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.output.resume();
    }

    fn cancel(&self) {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        self.paused.store(false, Ordering::SeqCst);
        self.output.stop();
    }
}

async fn run_with_timeout(command: &mut Command, binary: &str) -> Result<Vec<u8>> {
    let child = command
        .spawn()
        .map_err(|e| Error::Tts(format!("failed to spawn {binary}: {e}")))?;

    let output = tokio::time::timeout(ESPEAK_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| {
            Error::Tts(format!(
                "{binary} timed out after {} seconds",
                ESPEAK_TIMEOUT.as_secs()
            ))
        })?
        .map_err(|e| Error::Tts(format!("failed to wait for {binary}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Tts(format!("{binary} failed: {stderr}")));
    }

    Ok(output.stdout)
}

/// Map a locale tag (`hi-IN`) to an espeak voice name (`hi`)
fn espeak_voice(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .to_ascii_lowercase()
}

/// Decode espeak's WAV output
///
/// When writing to a pipe espeak cannot seek back to patch the data length,
/// so samples are read until the stream runs out rather than trusting the header.
fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| Error::Tts(format!("invalid WAV from espeak: {e}")))?;
    let sample_rate = reader.spec().sample_rate;

    let samples = reader
        .samples::<i16>()
        .map_while(std::result::Result::ok)
        .map(|s| f32::from(s) / 32768.0)
        .collect();

    Ok((samples, sample_rate))
}

/// Parse the table printed by `espeak-ng --voices`
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  hi              --/M      Hindi              inc/hi
/// ```
fn parse_voice_list(listing: &str) -> Vec<VoiceInfo> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let lang = columns.nth(1)?;
            let name = columns.nth(1)?;
            Some(VoiceInfo::new(name, lang))
        })
        .collect()
}
