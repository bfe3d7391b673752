//! Microphone speech recognition
//!
//! A capture thread feeds [`SpeechSegmenter`], complete utterances go to the
//! [`Transcriber`], and transcripts come back as [`RecognitionEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::{Error, Result};

use super::capture::{AudioCapture, SAMPLE_RATE};
use super::engine::{
    RecognitionError, RecognitionEvent, RecognitionMode, RecognitionOptions, SpeechRecognizer,
};
use super::segmenter::SpeechSegmenter;
use super::stt::Transcriber;

/// How often the capture thread drains the microphone buffer
const CAPTURE_TICK: Duration = Duration::from_millis(100);

/// How long a single-shot session waits for speech before giving up
const NO_SPEECH_TIMEOUT: Duration = Duration::from_secs(10);

/// Speech recognizer over the default microphone
pub struct MicrophoneRecognizer {
    transcriber: Arc<Transcriber>,
}

impl MicrophoneRecognizer {
    #[must_use]
    pub const fn new(transcriber: Arc<Transcriber>) -> Self {
        Self { transcriber }
    }
}

#[async_trait]
impl SpeechRecognizer for MicrophoneRecognizer {
    async fn start(&self, options: RecognitionOptions) -> Result<mpsc::Receiver<RecognitionEvent>> {
        let (events_tx, events_rx) = mpsc::channel(32);
        let (segments_tx, segments_rx) = mpsc::channel::<Vec<f32>>(4);
        let (ready_tx, ready_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || capture_loop(&segments_tx, ready_tx))?;

        let ready = ready_rx
            .await
            .map_err(|_| Error::Audio("capture thread exited".to_string()))?;

        if let Err(e) = ready {
            let error = match e {
                Error::Permission(msg) => RecognitionError::NotAllowed(msg),
                other => RecognitionError::Failed(other.to_string()),
            };
            let _ = events_tx.send(RecognitionEvent::Error(error)).await;
            let _ = events_tx.send(RecognitionEvent::End).await;
            return Ok(events_rx);
        }

        tracing::debug!(locale = %options.locale, mode = ?options.mode, "recognition started");
        tokio::spawn(transcribe_loop(
            Arc::clone(&self.transcriber),
            options,
            segments_rx,
            events_tx,
        ));

        Ok(events_rx)
    }
}

/// Runs on a dedicated thread because the cpal stream is not `Send`
fn capture_loop(segments: &mpsc::Sender<Vec<f32>>, ready: oneshot::Sender<Result<()>>) {
    let mut capture = match AudioCapture::new().and_then(|mut c| c.start().map(|()| c)) {
        Ok(capture) => {
            let _ = ready.send(Ok(()));
            capture
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut segmenter = SpeechSegmenter::new();
    while !segments.is_closed() {
        std::thread::sleep(CAPTURE_TICK);

        let samples = capture.drain();
        if samples.is_empty() {
            continue;
        }
        if let Some(segment) = segmenter.push(&samples) {
            if segments.blocking_send(segment).is_err() {
                break;
            }
        }
    }

    capture.stop();
}

async fn transcribe_loop(
    transcriber: Arc<Transcriber>,
    options: RecognitionOptions,
    mut segments: mpsc::Receiver<Vec<f32>>,
    events: mpsc::Sender<RecognitionEvent>,
) {
    let language = options
        .locale
        .split(['-', '_'])
        .next()
        .map(str::to_ascii_lowercase);
    let single_shot = options.mode == RecognitionMode::SingleShot;

    loop {
        let wait = async {
            if single_shot {
                tokio::time::timeout(NO_SPEECH_TIMEOUT, segments.recv())
                    .await
                    .map_err(|_| RecognitionError::NoSpeech)
            } else {
                Ok(segments.recv().await)
            }
        };

        let segment = tokio::select! {
            () = events.closed() => {
                tracing::debug!("event receiver dropped, stopping recognition");
                break;
            }
            segment = wait => match segment {
                Ok(segment) => segment,
                Err(error) => {
                    let _ = events.send(RecognitionEvent::Error(error)).await;
                    break;
                }
            },
        };

        let Some(segment) = segment else { break };

        match transcriber
            .transcribe_samples(&segment, SAMPLE_RATE, language.as_deref())
            .await
        {
            Ok(transcript) if transcript.trim().is_empty() => {}
            Ok(transcript) => {
                let event = RecognitionEvent::Result {
                    transcript: transcript.trim().to_string(),
                    is_final: true,
                };
                if events.send(event).await.is_err() || single_shot {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                let _ = events
                    .send(RecognitionEvent::Error(RecognitionError::Failed(e.to_string())))
                    .await;
                break;
            }
        }
    }

    // Dropping the segment receiver stops the capture thread
    drop(segments);
    let _ = events.send(RecognitionEvent::End).await;
    tracing::debug!("recognition ended");
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn transcriber() -> Arc<Transcriber> {
        Arc::new(
            Transcriber::new(
                "http://127.0.0.1:9",
                SecretString::from("test-key".to_string()),
                "whisper-large-v3",
                Duration::from_secs(1),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn dropped_receiver_releases_capture_without_speech() {
        let (segments_tx, segments_rx) = mpsc::channel::<Vec<f32>>(4);
        let (events_tx, events_rx) = mpsc::channel(4);

        let task = tokio::spawn(transcribe_loop(
            transcriber(),
            RecognitionOptions::continuous("en-US"),
            segments_rx,
            events_tx,
        ));
        drop(events_rx);

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("recognition kept running after the receiver was dropped")
            .unwrap();
        // The capture thread watches this to release the microphone
        assert!(segments_tx.is_closed());
    }

    #[tokio::test]
    async fn closed_segment_stream_ends_session() {
        let (segments_tx, segments_rx) = mpsc::channel::<Vec<f32>>(4);
        let (events_tx, mut events_rx) = mpsc::channel(4);
        drop(segments_tx);

        transcribe_loop(
            transcriber(),
            RecognitionOptions::single_shot("hi-IN"),
            segments_rx,
            events_tx,
        )
        .await;

        assert_eq!(events_rx.recv().await, Some(RecognitionEvent::End));
        assert_eq!(events_rx.recv().await, None);
    }
}
