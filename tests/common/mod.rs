//! Shared test utilities
//!
//! In-memory speech backends that record what the narrator and wake word
//! listener ask of them. Tests decide when clips and utterances finish.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc, oneshot};
use vidyamitra_gateway::voice::engine::{
    AudioClip, AudioOutput, PlaybackHandle, RecognitionEvent, RecognitionOptions, SpeechProxy,
    SpeechRecognizer, SpeechSynthesizer, VoiceInfo,
};
use vidyamitra_gateway::voice::{MAX_CHUNK_CHARS, Narrator, NarratorBackends, VoiceSelector};
use vidyamitra_gateway::{Error, Language, Result};

/// Poll `condition` until it holds, panicking after five seconds
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let wait = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

/// `count` space-separated four letter words
#[must_use]
pub fn words(count: usize) -> String {
    (0..count).map(|_| "abcd").collect::<Vec<_>>().join(" ")
}

#[derive(Default)]
struct OutputState {
    clips: Vec<String>,
    calls: Vec<&'static str>,
    pending: Option<oneshot::Sender<Result<()>>>,
}

/// Speaker that records clips and finishes them on request
#[derive(Default)]
pub struct ScriptedOutput {
    state: Mutex<OutputState>,
}

impl ScriptedOutput {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Text of every clip started so far (the fake proxy returns text as audio)
    #[must_use]
    pub fn clips(&self) -> Vec<String> {
        self.state.lock().unwrap().clips.clone()
    }

    #[must_use]
    pub fn started(&self) -> usize {
        self.state.lock().unwrap().clips.len()
    }

    /// Control calls in order: `start`, `pause`, `resume`, `stop`
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Finish the playing clip with `result`
    pub fn finish(&self, result: Result<()>) {
        let pending = self.state.lock().unwrap().pending.take();
        pending
            .expect("no clip is playing")
            .send(result)
            .expect("narrator dropped the clip");
    }
}

impl AudioOutput for ScriptedOutput {
    fn start(&self, clip: AudioClip) -> PlaybackHandle {
        let (tx, handle) = PlaybackHandle::channel();
        let mut state = self.state.lock().unwrap();
        let text = match clip {
            AudioClip::Mpeg(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            AudioClip::Pcm { samples, .. } => format!("<{} samples>", samples.len()),
        };
        state.clips.push(text);
        state.calls.push("start");
        state.pending = Some(tx);
        handle
    }

    fn pause(&self) {
        self.state.lock().unwrap().calls.push("pause");
    }

    fn resume(&self) {
        self.state.lock().unwrap().calls.push("resume");
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.push("stop");
        state.pending = None;
    }
}

/// Speech proxy that echoes chunk text back as audio bytes
#[derive(Default)]
pub struct FakeProxy {
    requests: Mutex<Vec<(String, Language)>>,
    fail_on: Option<usize>,
    /// When set, each fetch waits for a [`FakeProxy::release`]
    gate: Option<Semaphore>,
}

impl FakeProxy {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the request with the given zero-based position
    #[must_use]
    pub fn failing_on(request: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_on: Some(request),
            ..Self::default()
        })
    }

    /// Hold every fetch until it is released
    #[must_use]
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        })
    }

    /// Let one held fetch complete
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    #[must_use]
    pub fn requests(&self) -> Vec<(String, Language)> {
        self.requests.lock().unwrap().clone()
    }

    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.requests().into_iter().map(|(text, _)| text).collect()
    }
}

#[async_trait]
impl SpeechProxy for FakeProxy {
    async fn fetch(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        let position = {
            let mut requests = self.requests.lock().unwrap();
            requests.push((text.to_string(), language));
            requests.len() - 1
        };

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }
        if self.fail_on == Some(position) {
            return Err(Error::Tts("upstream returned 500".to_string()));
        }
        Ok(text.as_bytes().to_vec())
    }
}

#[derive(Default)]
struct SynthState {
    spoken: Vec<(String, String)>,
    calls: Vec<&'static str>,
    pending: Option<oneshot::Sender<Result<()>>>,
}

/// On-device engine with a fixed voice list
#[derive(Default)]
pub struct FakeSynthesizer {
    voices: Vec<VoiceInfo>,
    state: Mutex<SynthState>,
}

impl FakeSynthesizer {
    /// An engine with no installed voices
    #[must_use]
    pub fn silent() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn with_voices(voices: Vec<VoiceInfo>) -> Arc<Self> {
        Arc::new(Self {
            voices,
            state: Mutex::default(),
        })
    }

    /// `(text, locale)` of every utterance
    #[must_use]
    pub fn spoken(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().spoken.clone()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn finish(&self, result: Result<()>) {
        let pending = self.state.lock().unwrap().pending.take();
        pending
            .expect("no utterance is playing")
            .send(result)
            .expect("narrator dropped the utterance");
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    fn speak(&self, text: &str, locale: &str) -> PlaybackHandle {
        let (tx, handle) = PlaybackHandle::channel();
        let mut state = self.state.lock().unwrap();
        state.spoken.push((text.to_string(), locale.to_string()));
        state.calls.push("speak");
        state.pending = Some(tx);
        handle
    }

    fn pause(&self) {
        self.state.lock().unwrap().calls.push("pause");
    }

    fn resume(&self) {
        self.state.lock().unwrap().calls.push("resume");
    }

    fn cancel(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.push("cancel");
        state.pending = None;
    }
}

/// Recognizer that replays one script per session
///
/// Once the scripts run out, sessions stay open without events until the
/// receiver is dropped.
#[derive(Default)]
pub struct FakeRecognizer {
    scripts: Mutex<VecDeque<Vec<RecognitionEvent>>>,
    sessions: Mutex<Vec<RecognitionOptions>>,
    idle: Mutex<Vec<mpsc::Sender<RecognitionEvent>>>,
}

impl FakeRecognizer {
    #[must_use]
    pub fn new(scripts: Vec<Vec<RecognitionEvent>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        })
    }

    /// Options of every session started so far
    #[must_use]
    pub fn sessions(&self) -> Vec<RecognitionOptions> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn start(&self, options: RecognitionOptions) -> Result<mpsc::Receiver<RecognitionEvent>> {
        self.sessions.lock().unwrap().push(options);

        let script = self.scripts.lock().unwrap().pop_front();
        let (tx, rx) = mpsc::channel(16);
        match script {
            Some(events) => {
                for event in events {
                    tx.send(event).await.expect("receiver open");
                }
            }
            None => self.idle.lock().unwrap().push(tx),
        }
        Ok(rx)
    }
}

/// A final transcript
#[must_use]
pub fn heard(transcript: &str) -> RecognitionEvent {
    RecognitionEvent::Result {
        transcript: transcript.to_string(),
        is_final: true,
    }
}

/// An interim transcript
#[must_use]
pub fn partial(transcript: &str) -> RecognitionEvent {
    RecognitionEvent::Result {
        transcript: transcript.to_string(),
        is_final: false,
    }
}

/// Narrator over scripted backends with the default chunk bound
#[must_use]
pub fn narrator(
    synthesizer: Arc<FakeSynthesizer>,
    proxy: Arc<FakeProxy>,
    output: Arc<ScriptedOutput>,
) -> Narrator {
    Narrator::spawn(
        NarratorBackends {
            synthesizer,
            proxy,
            output,
        },
        VoiceSelector::default(),
        MAX_CHUNK_CHARS,
    )
}
