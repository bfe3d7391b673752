//! Narration playback state machine
//!
//! [`PlaybackController`] owns the single active narration session and
//! decides what the speech backends should do next. It performs no I/O:
//! every operation returns the [`Action`]s to carry out, and backend
//! callbacks are fed back in as [`BackendEvent`]s. This keeps pause/resume,
//! cancellation and chunk sequencing testable without audio hardware.
//!
//! ```text
//!            start                 pause
//!   Idle ───────────▶ Speaking ───────────▶ Paused
//!    ▲                 │   ▲                 │
//!    │  done/fail/stop │   └──── resume ─────┤
//!    └─────────────────┴──────── stop ───────┘
//! ```

use std::fmt;

use crate::language::Language;

use super::chunking::chunk_text;
use super::sanitize::sanitize;
use super::selector::VoiceRoute;

/// Identifies one narration session
///
/// Ids increase monotonically, so callbacks carrying an older id belong to a
/// superseded session and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Speaking,
    Paused,
}

/// Sanitized text ready to narrate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationRequest {
    text: String,
    language: Language,
}

impl NarrationRequest {
    /// Sanitize `text`; returns `None` when nothing speakable remains
    #[must_use]
    pub fn new(text: &str, language: Language) -> Option<Self> {
        let text = sanitize(text);
        if text.is_empty() {
            return None;
        }
        Some(Self { text, language })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }
}

/// Work the driver must perform against the speech backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Cancel the on-device utterance
    CancelSpeech,
    /// Halt remote audio and drop any fetched-but-unplayed chunk
    StopAudio,
    /// Queue an on-device utterance
    Speak {
        session: SessionId,
        text: String,
        locale: &'static str,
    },
    /// Request audio for a chunk from the remote endpoint
    Fetch {
        session: SessionId,
        index: usize,
        text: String,
        language: Language,
    },
    /// Start playing the chunk whose audio was just fetched
    Play { session: SessionId, index: usize },
    PauseSpeech,
    ResumeSpeech,
    PauseAudio,
    ResumeAudio,
}

/// Completion callback from a speech backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    SpeechEnded { session: SessionId },
    SpeechFailed { session: SessionId, reason: String },
    ChunkFetched { session: SessionId, index: usize },
    ChunkEnded { session: SessionId, index: usize },
    ChunkFailed {
        session: SessionId,
        index: usize,
        reason: String,
    },
}

impl BackendEvent {
    /// Session the event belongs to
    #[must_use]
    pub const fn session(&self) -> SessionId {
        match self {
            Self::SpeechEnded { session }
            | Self::SpeechFailed { session, .. }
            | Self::ChunkFetched { session, .. }
            | Self::ChunkEnded { session, .. }
            | Self::ChunkFailed { session, .. } => *session,
        }
    }
}

/// Position within a chunked narration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub index: usize,
    pub total: usize,
}

/// Where the current chunk is in its fetch/play cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkStage {
    Fetching,
    /// Audio arrived while paused; waits for resume
    Ready,
    Playing,
    /// Finished while paused; advancing waits for resume
    Ended,
}

#[derive(Debug)]
struct ChunkCursor {
    chunks: Vec<String>,
    index: usize,
    stage: ChunkStage,
}

#[derive(Debug)]
enum Handle {
    Utterance,
    Chunks(ChunkCursor),
}

#[derive(Debug)]
struct Session {
    id: SessionId,
    language: Language,
    paused: bool,
    handle: Handle,
}

impl Session {
    /// Move to the next chunk, or `None` when the narration is complete
    fn advance(&mut self) -> Option<Action> {
        let Handle::Chunks(cursor) = &mut self.handle else {
            return None;
        };

        cursor.index += 1;
        let text = cursor.chunks.get(cursor.index)?.clone();
        cursor.stage = ChunkStage::Fetching;

        Some(Action::Fetch {
            session: self.id,
            index: cursor.index,
            text,
            language: self.language,
        })
    }
}

/// State machine behind the narrator
#[derive(Debug)]
pub struct PlaybackController {
    next_id: u64,
    chunk_limit: usize,
    session: Option<Session>,
    last_error: Option<String>,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(super::chunking::MAX_CHUNK_CHARS)
    }
}

impl PlaybackController {
    /// Create an idle controller splitting remote narration at `chunk_limit` chars
    #[must_use]
    pub const fn new(chunk_limit: usize) -> Self {
        Self {
            next_id: 0,
            chunk_limit,
            session: None,
            last_error: None,
        }
    }

    /// Current playback state
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        match &self.session {
            None => PlaybackState::Idle,
            Some(s) if s.paused => PlaybackState::Paused,
            Some(_) => PlaybackState::Speaking,
        }
    }

    /// Id of the active session, if any
    #[must_use]
    pub fn session(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Chunk position of the active session when using the remote route
    #[must_use]
    pub fn progress(&self) -> Option<ChunkProgress> {
        match &self.session.as_ref()?.handle {
            Handle::Chunks(cursor) => Some(ChunkProgress {
                index: cursor.index,
                total: cursor.chunks.len(),
            }),
            Handle::Utterance => None,
        }
    }

    /// Reason the most recent session failed, cleared when a new one starts
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Begin a narration, cancelling any active session first
    pub fn start(&mut self, request: NarrationRequest, route: VoiceRoute) -> Vec<Action> {
        let mut actions = self.stop();
        self.last_error = None;

        self.next_id += 1;
        let id = SessionId(self.next_id);
        let NarrationRequest { text, language } = request;

        let handle = match route {
            VoiceRoute::Local => {
                actions.push(Action::Speak {
                    session: id,
                    text,
                    locale: language.synthesis_locale(),
                });
                Handle::Utterance
            }
            VoiceRoute::Remote => {
                let chunks = chunk_text(&text, self.chunk_limit);
                if let Some(first) = chunks.first() {
                    actions.push(Action::Fetch {
                        session: id,
                        index: 0,
                        text: first.clone(),
                        language,
                    });
                }
                Handle::Chunks(ChunkCursor {
                    chunks,
                    index: 0,
                    stage: ChunkStage::Fetching,
                })
            }
        };

        tracing::debug!(session = id.0, ?route, language = language.code(), "narration started");

        self.session = Some(Session {
            id,
            language,
            paused: false,
            handle,
        });

        actions
    }

    /// Pause the active session; no-op unless speaking
    pub fn pause(&mut self) -> Vec<Action> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if session.paused {
            return Vec::new();
        }
        session.paused = true;

        match &session.handle {
            Handle::Utterance => vec![Action::PauseSpeech],
            Handle::Chunks(cursor) if cursor.stage == ChunkStage::Playing => {
                vec![Action::PauseAudio]
            }
            Handle::Chunks(_) => Vec::new(),
        }
    }

    /// Resume a paused session; no-op unless paused
    pub fn resume(&mut self) -> Vec<Action> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if !session.paused {
            return Vec::new();
        }
        session.paused = false;

        let id = session.id;
        match &mut session.handle {
            Handle::Utterance => vec![Action::ResumeSpeech],
            Handle::Chunks(cursor) => match cursor.stage {
                ChunkStage::Playing => vec![Action::ResumeAudio],
                ChunkStage::Ready => {
                    cursor.stage = ChunkStage::Playing;
                    vec![Action::Play {
                        session: id,
                        index: cursor.index,
                    }]
                }
                ChunkStage::Fetching => Vec::new(),
                ChunkStage::Ended => match session.advance() {
                    Some(fetch) => vec![fetch],
                    None => {
                        self.finish("completed");
                        Vec::new()
                    }
                },
            },
        }
    }

    /// Halt the active session; safe to call when idle
    pub fn stop(&mut self) -> Vec<Action> {
        let Some(session) = self.session.take() else {
            return Vec::new();
        };

        tracing::debug!(session = session.id.0, "narration stopped");

        match session.handle {
            Handle::Utterance => vec![Action::CancelSpeech],
            Handle::Chunks(_) => vec![Action::StopAudio],
        }
    }

    /// Apply a backend callback; events from superseded sessions are ignored
    pub fn on_event(&mut self, event: BackendEvent) -> Vec<Action> {
        let Some(session) = self.session.as_mut() else {
            tracing::trace!(?event, "event while idle, ignoring");
            return Vec::new();
        };
        if session.id != event.session() {
            tracing::trace!(?event, active = session.id.0, "stale event, ignoring");
            return Vec::new();
        }

        match (event, &mut session.handle) {
            (BackendEvent::SpeechEnded { .. }, Handle::Utterance) => {
                self.finish("completed");
                Vec::new()
            }
            (BackendEvent::SpeechFailed { reason, .. }, Handle::Utterance) => {
                self.fail(reason);
                Vec::new()
            }
            (BackendEvent::ChunkFetched { index, .. }, Handle::Chunks(cursor))
                if cursor.index == index && cursor.stage == ChunkStage::Fetching =>
            {
                if session.paused {
                    cursor.stage = ChunkStage::Ready;
                    Vec::new()
                } else {
                    cursor.stage = ChunkStage::Playing;
                    vec![Action::Play {
                        session: session.id,
                        index,
                    }]
                }
            }
            (BackendEvent::ChunkEnded { index, .. }, Handle::Chunks(cursor))
                if cursor.index == index && cursor.stage == ChunkStage::Playing =>
            {
                if session.paused {
                    cursor.stage = ChunkStage::Ended;
                    return Vec::new();
                }
                match session.advance() {
                    Some(fetch) => vec![fetch],
                    None => {
                        self.finish("completed");
                        Vec::new()
                    }
                }
            }
            (BackendEvent::ChunkFailed { index, reason, .. }, Handle::Chunks(cursor))
                if cursor.index == index =>
            {
                self.fail(reason);
                vec![Action::StopAudio]
            }
            (event, _) => {
                tracing::trace!(?event, "event does not match session stage, ignoring");
                Vec::new()
            }
        }
    }

    fn finish(&mut self, outcome: &'static str) {
        if let Some(session) = self.session.take() {
            tracing::debug!(session = session.id.0, outcome, "narration finished");
        }
    }

    fn fail(&mut self, reason: String) {
        if let Some(session) = self.session.take() {
            tracing::warn!(session = session.id.0, reason = %reason, "narration failed");
        }
        self.last_error = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str, language: Language) -> NarrationRequest {
        NarrationRequest::new(text, language).unwrap()
    }

    fn five_chunk_text() -> String {
        // 5 words of 10 chars with a limit of 10 gives one word per chunk
        (0..5).map(|i| format!("chunk{i:05}")).collect::<Vec<_>>().join(" ")
    }

    fn fetch_index(actions: &[Action]) -> Option<usize> {
        actions.iter().find_map(|a| match a {
            Action::Fetch { index, .. } => Some(*index),
            _ => None,
        })
    }

    #[test]
    fn empty_text_is_not_a_request() {
        assert!(NarrationRequest::new("** \n ##", Language::English).is_none());
    }

    #[test]
    fn local_route_speaks_single_utterance() {
        let mut controller = PlaybackController::default();
        let actions = controller.start(request("Namaste", Language::Hindi), VoiceRoute::Local);

        let id = controller.session().unwrap();
        assert_eq!(
            actions,
            vec![Action::Speak {
                session: id,
                text: "Namaste".to_string(),
                locale: "hi-IN",
            }]
        );
        assert_eq!(controller.state(), PlaybackState::Speaking);

        controller.on_event(BackendEvent::SpeechEnded { session: id });
        assert_eq!(controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn remote_route_plays_chunks_in_order() {
        let mut controller = PlaybackController::new(10);
        let mut actions = controller.start(request(&five_chunk_text(), Language::Tamil), VoiceRoute::Remote);
        let id = controller.session().unwrap();

        let mut played = Vec::new();
        while let Some(index) = fetch_index(&actions) {
            let play = controller.on_event(BackendEvent::ChunkFetched { session: id, index });
            assert_eq!(play, vec![Action::Play { session: id, index }]);
            played.push(index);
            actions = controller.on_event(BackendEvent::ChunkEnded { session: id, index });
        }

        assert_eq!(played, vec![0, 1, 2, 3, 4]);
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(controller.last_error().is_none());
    }

    #[test]
    fn stop_mid_narration_ignores_late_callbacks() {
        let mut controller = PlaybackController::new(10);
        let actions = controller.start(request(&five_chunk_text(), Language::Tamil), VoiceRoute::Remote);
        let id = controller.session().unwrap();
        assert_eq!(fetch_index(&actions), Some(0));

        controller.on_event(BackendEvent::ChunkFetched { session: id, index: 0 });
        assert_eq!(controller.stop(), vec![Action::StopAudio]);
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(controller.progress().is_none());

        // The player and the next fetch report back after the stop
        assert!(controller.on_event(BackendEvent::ChunkEnded { session: id, index: 0 }).is_empty());
        assert!(controller.on_event(BackendEvent::ChunkFetched { session: id, index: 1 }).is_empty());
        assert!(controller.resume().is_empty());
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(controller.last_error().is_none());
    }

    #[test]
    fn stop_while_paused_cancels_utterance() {
        let mut controller = PlaybackController::default();
        controller.start(request("Namaste", Language::Hindi), VoiceRoute::Local);
        let id = controller.session().unwrap();
        controller.pause();

        assert_eq!(controller.stop(), vec![Action::CancelSpeech]);
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(controller.on_event(BackendEvent::SpeechEnded { session: id }).is_empty());
        assert!(controller.stop().is_empty());
    }

    #[test]
    fn new_narration_cancels_previous_session() {
        let mut controller = PlaybackController::new(10);
        controller.start(request(&five_chunk_text(), Language::Tamil), VoiceRoute::Remote);
        let first = controller.session().unwrap();

        let actions = controller.start(request("hello", Language::English), VoiceRoute::Local);
        let second = controller.session().unwrap();

        assert!(second > first);
        assert_eq!(actions[0], Action::StopAudio);
        assert!(matches!(actions[1], Action::Speak { session, .. } if session == second));
        assert_eq!(actions.len(), 2);

        // Late callbacks from the first session change nothing
        let late = controller.on_event(BackendEvent::ChunkFetched { session: first, index: 0 });
        assert!(late.is_empty());
        assert_eq!(controller.session(), Some(second));
        assert_eq!(controller.state(), PlaybackState::Speaking);
    }

    #[test]
    fn restart_while_paused_cancels_first() {
        let mut controller = PlaybackController::default();
        controller.start(request("one", Language::English), VoiceRoute::Local);
        controller.pause();
        assert_eq!(controller.state(), PlaybackState::Paused);

        let actions = controller.start(request("two", Language::English), VoiceRoute::Local);
        assert_eq!(actions[0], Action::CancelSpeech);
        assert_eq!(controller.state(), PlaybackState::Speaking);
    }

    #[test]
    fn stop_when_idle_is_noop() {
        let mut controller = PlaybackController::default();
        assert!(controller.stop().is_empty());
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(controller.pause().is_empty());
        assert!(controller.resume().is_empty());
    }

    #[test]
    fn pause_mid_chunk_resumes_same_chunk() {
        let mut controller = PlaybackController::new(10);
        controller.start(request(&five_chunk_text(), Language::Tamil), VoiceRoute::Remote);
        let id = controller.session().unwrap();

        for index in 0..2 {
            controller.on_event(BackendEvent::ChunkFetched { session: id, index });
            controller.on_event(BackendEvent::ChunkEnded { session: id, index });
        }
        controller.on_event(BackendEvent::ChunkFetched { session: id, index: 2 });

        assert_eq!(controller.pause(), vec![Action::PauseAudio]);
        assert_eq!(controller.state(), PlaybackState::Paused);
        assert_eq!(controller.resume(), vec![Action::ResumeAudio]);
        assert_eq!(controller.progress(), Some(ChunkProgress { index: 2, total: 5 }));

        let next = controller.on_event(BackendEvent::ChunkEnded { session: id, index: 2 });
        assert_eq!(fetch_index(&next), Some(3));
    }

    #[test]
    fn chunk_ending_while_paused_waits_for_resume() {
        let mut controller = PlaybackController::new(10);
        controller.start(request(&five_chunk_text(), Language::Tamil), VoiceRoute::Remote);
        let id = controller.session().unwrap();
        controller.on_event(BackendEvent::ChunkFetched { session: id, index: 0 });

        controller.pause();
        let ended = controller.on_event(BackendEvent::ChunkEnded { session: id, index: 0 });
        assert!(ended.is_empty());
        assert_eq!(controller.state(), PlaybackState::Paused);

        let resumed = controller.resume();
        assert_eq!(fetch_index(&resumed), Some(1));
    }

    #[test]
    fn audio_fetched_while_paused_starts_on_resume() {
        let mut controller = PlaybackController::new(10);
        controller.start(request(&five_chunk_text(), Language::Tamil), VoiceRoute::Remote);
        let id = controller.session().unwrap();

        assert!(controller.pause().is_empty());
        assert!(controller
            .on_event(BackendEvent::ChunkFetched { session: id, index: 0 })
            .is_empty());
        assert_eq!(controller.resume(), vec![Action::Play { session: id, index: 0 }]);
    }

    #[test]
    fn last_chunk_ending_while_paused_completes_on_resume() {
        let mut controller = PlaybackController::default();
        controller.start(request("short", Language::Tamil), VoiceRoute::Remote);
        let id = controller.session().unwrap();
        controller.on_event(BackendEvent::ChunkFetched { session: id, index: 0 });
        controller.pause();
        controller.on_event(BackendEvent::ChunkEnded { session: id, index: 0 });

        assert!(controller.resume().is_empty());
        assert_eq!(controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn chunk_failure_is_fail_fast() {
        let mut controller = PlaybackController::new(10);
        controller.start(request(&five_chunk_text(), Language::Tamil), VoiceRoute::Remote);
        let id = controller.session().unwrap();
        controller.on_event(BackendEvent::ChunkFetched { session: id, index: 0 });
        controller.on_event(BackendEvent::ChunkEnded { session: id, index: 0 });

        let actions = controller.on_event(BackendEvent::ChunkFailed {
            session: id,
            index: 1,
            reason: "upstream 500".to_string(),
        });

        assert_eq!(actions, vec![Action::StopAudio]);
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert_eq!(controller.last_error(), Some("upstream 500"));
    }

    #[test]
    fn speech_failure_resets_to_idle() {
        let mut controller = PlaybackController::default();
        controller.start(request("hello", Language::English), VoiceRoute::Local);
        let id = controller.session().unwrap();

        controller.on_event(BackendEvent::SpeechFailed {
            session: id,
            reason: "engine error".to_string(),
        });
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert_eq!(controller.last_error(), Some("engine error"));
    }
}
