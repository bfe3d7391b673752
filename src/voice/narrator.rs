//! Narration driver
//!
//! [`Narrator`] is a cloneable handle to a single actor task that owns the
//! [`PlaybackController`]. Commands and backend completions are processed
//! one at a time on that task, so starting, stopping and advancing never
//! interleave. Spawned helper tasks only wait on backends and report back.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;

use crate::language::Language;
use crate::{Error, Result};

use super::controller::{
    Action, BackendEvent, ChunkProgress, NarrationRequest, PlaybackController, PlaybackState,
    SessionId,
};
use super::engine::{AudioClip, AudioOutput, SpeechProxy, SpeechSynthesizer};
use super::selector::VoiceSelector;

/// Speech backends used by the narrator
#[derive(Clone)]
pub struct NarratorBackends {
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub proxy: Arc<dyn SpeechProxy>,
    pub output: Arc<dyn AudioOutput>,
}

/// Snapshot of narration state published to observers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub session: Option<SessionId>,
    pub chunk: Option<ChunkProgress>,
    /// Why the last session ended early, if it failed
    pub error: Option<String>,
}

impl PlaybackStatus {
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.state == PlaybackState::Speaking
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Pause,
    Resume,
    Stop,
}

enum Command {
    Speak {
        request: NarrationRequest,
        reply: oneshot::Sender<SessionId>,
    },
    Control {
        control: Control,
        reply: oneshot::Sender<()>,
    },
}

enum Completion {
    Fetched {
        session: SessionId,
        index: usize,
        audio: Vec<u8>,
    },
    Event(BackendEvent),
}

/// Handle for narrating text aloud
#[derive(Clone)]
pub struct Narrator {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<PlaybackStatus>,
}

impl Narrator {
    /// Spawn the narration actor on the current tokio runtime
    #[must_use]
    pub fn spawn(backends: NarratorBackends, selector: VoiceSelector, chunk_limit: usize) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(PlaybackStatus::default());

        let task = NarratorTask {
            controller: PlaybackController::new(chunk_limit),
            selector,
            backends,
            fetched: None,
            fetch_task: None,
            commands: commands_rx,
            completions_tx,
            completions: completions_rx,
            status: status_tx,
        };
        tokio::spawn(task.run());

        Self {
            commands: commands_tx,
            status: status_rx,
        }
    }

    /// Narrate `text` in `language`, replacing any active narration
    ///
    /// Returns the new session id, or `None` when the text had nothing
    /// speakable after sanitization.
    ///
    /// # Errors
    ///
    /// Returns error if the narration task has shut down
    pub async fn speak(&self, text: &str, language: Language) -> Result<Option<SessionId>> {
        let Some(request) = NarrationRequest::new(text, language) else {
            tracing::debug!("nothing to narrate after sanitizing");
            return Ok(None);
        };

        let (reply, rx) = oneshot::channel();
        self.send(Command::Speak { request, reply })?;
        rx.await.map(Some).map_err(|_| closed())
    }

    /// Pause the active narration
    ///
    /// # Errors
    ///
    /// Returns error if the narration task has shut down
    pub async fn pause(&self) -> Result<()> {
        self.control(Control::Pause).await
    }

    /// Resume a paused narration
    ///
    /// # Errors
    ///
    /// Returns error if the narration task has shut down
    pub async fn resume(&self) -> Result<()> {
        self.control(Control::Resume).await
    }

    /// Stop narration; a no-op when idle
    ///
    /// # Errors
    ///
    /// Returns error if the narration task has shut down
    pub async fn stop(&self) -> Result<()> {
        self.control(Control::Stop).await
    }

    /// Current status snapshot
    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.clone()
    }

    /// Wait until no narration is active
    ///
    /// # Errors
    ///
    /// Returns error if the narration task has shut down
    pub async fn wait_idle(&self) -> Result<PlaybackStatus> {
        let mut rx = self.status.clone();
        let status = rx
            .wait_for(|s| s.state == PlaybackState::Idle)
            .await
            .map_err(|_| closed())?;
        Ok(status.clone())
    }

    async fn control(&self, control: Control) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Control { control, reply })?;
        rx.await.map_err(|_| closed())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| closed())
    }
}

fn closed() -> Error {
    Error::Voice("narrator task has shut down".to_string())
}

struct NarratorTask {
    controller: PlaybackController,
    selector: VoiceSelector,
    backends: NarratorBackends,
    /// Audio fetched for the current chunk, waiting for a `Play` action
    fetched: Option<(SessionId, usize, Vec<u8>)>,
    fetch_task: Option<AbortHandle>,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    status: watch::Sender<PlaybackStatus>,
}

impl NarratorTask {
    async fn run(mut self) {
        tracing::debug!("narrator started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command).await;
                }
                Some(completion) = self.completions.recv() => {
                    self.handle_completion(completion);
                    self.publish();
                }
            }
        }

        let actions = self.controller.stop();
        self.perform(actions);
        self.publish();
        tracing::debug!("narrator stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Speak { request, reply } => {
                let route = self
                    .selector
                    .select_for(request.language(), self.backends.synthesizer.as_ref())
                    .await;
                let actions = self.controller.start(request, route);
                self.perform(actions);
                self.publish();

                if let Some(session) = self.controller.session() {
                    let _ = reply.send(session);
                }
            }
            Command::Control { control, reply } => {
                let actions = match control {
                    Control::Pause => self.controller.pause(),
                    Control::Resume => self.controller.resume(),
                    Control::Stop => self.controller.stop(),
                };
                self.perform(actions);
                self.publish();
                let _ = reply.send(());
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        let event = match completion {
            Completion::Fetched {
                session,
                index,
                audio,
            } => {
                if self.controller.session() != Some(session) {
                    tracing::trace!(session = session.get(), index, "dropping audio for stale session");
                    return;
                }
                self.fetch_task = None;
                self.fetched = Some((session, index, audio));
                BackendEvent::ChunkFetched { session, index }
            }
            Completion::Event(event) => event,
        };

        let actions = self.controller.on_event(event);
        self.perform(actions);
    }

    fn perform(&mut self, actions: Vec<Action>) {
        for action in actions {
            tracing::trace!(?action, "narrator action");
            match action {
                Action::CancelSpeech => self.backends.synthesizer.cancel(),
                Action::StopAudio => {
                    if let Some(task) = self.fetch_task.take() {
                        task.abort();
                    }
                    self.fetched = None;
                    self.backends.output.stop();
                }
                Action::Speak {
                    session,
                    text,
                    locale,
                } => {
                    let handle = self.backends.synthesizer.speak(&text, locale);
                    let tx = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let event = match handle.finished().await {
                            Ok(()) => BackendEvent::SpeechEnded { session },
                            Err(e) => BackendEvent::SpeechFailed {
                                session,
                                reason: e.to_string(),
                            },
                        };
                        let _ = tx.send(Completion::Event(event));
                    });
                }
                Action::Fetch {
                    session,
                    index,
                    text,
                    language,
                } => {
                    let proxy = Arc::clone(&self.backends.proxy);
                    let tx = self.completions_tx.clone();
                    let task = tokio::spawn(async move {
                        let completion = match proxy.fetch(&text, language).await {
                            Ok(audio) => Completion::Fetched {
                                session,
                                index,
                                audio,
                            },
                            Err(e) => Completion::Event(BackendEvent::ChunkFailed {
                                session,
                                index,
                                reason: e.to_string(),
                            }),
                        };
                        let _ = tx.send(completion);
                    });
                    self.fetch_task = Some(task.abort_handle());
                }
                Action::Play { session, index } => self.play(session, index),
                Action::PauseSpeech => self.backends.synthesizer.pause(),
                Action::ResumeSpeech => self.backends.synthesizer.resume(),
                Action::PauseAudio => self.backends.output.pause(),
                Action::ResumeAudio => self.backends.output.resume(),
            }
        }
    }

    fn play(&mut self, session: SessionId, index: usize) {
        let tx = self.completions_tx.clone();

        let audio = match self.fetched.take() {
            Some((s, i, audio)) if s == session && i == index => audio,
            _ => {
                let _ = tx.send(Completion::Event(BackendEvent::ChunkFailed {
                    session,
                    index,
                    reason: "chunk audio missing".to_string(),
                }));
                return;
            }
        };

        tracing::debug!(session = session.get(), index, bytes = audio.len(), "playing chunk");
        let handle = self.backends.output.start(AudioClip::Mpeg(audio));

        tokio::spawn(async move {
            let event = match handle.finished().await {
                Ok(()) => BackendEvent::ChunkEnded { session, index },
                Err(e) => BackendEvent::ChunkFailed {
                    session,
                    index,
                    reason: e.to_string(),
                },
            };
            let _ = tx.send(Completion::Event(event));
        });
    }

    fn publish(&self) {
        let next = PlaybackStatus {
            state: self.controller.state(),
            session: self.controller.session(),
            chunk: self.controller.progress(),
            error: self.controller.last_error().map(ToString::to_string),
        };
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
