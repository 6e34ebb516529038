//! Utterance playback state machine.
//!
//! ```text
//!            request                can-play-through             ended / stop
//!   Idle ───────────────▶ AwaitingAudio ─────────────▶ Playing ──────────────▶ Finished
//!                               │                         │
//!                               └──── audio error ────────┴──────────────────▶ Failed
//! ```
//!
//! A new request while a session is `AwaitingAudio` or `Playing` first tears
//! that session down (clip pair unregistered, audio paused and released) and
//! records it as `Finished`. Only then is the new session's audio loaded, so
//! two speech pairs are never registered at once.
//!
//! The coordinator owns no animation or audio state itself; the compositor
//! and audio host are passed into each transition.

use std::fmt;

use crate::avatar::compositor::{AnimationCompositor, SpeechSlot};
use crate::avatar::host::{AudioEvent, AudioHandle, AudioHost};
use crate::avatar::synthesizer::SpeechClipPair;
use crate::errors::AudioFailure;

/// Message shown to the user when audio cannot be played.
pub const AUDIO_ERROR_NOTICE: &str = "Error playing audio";
/// Message shown to the user when the speech backend fails.
pub const BACKEND_ERROR_NOTICE: &str = "Error generating speech";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One utterance: its audio handle and speech clip pair.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub id: SessionId,
    pub audio: AudioHandle,
    pub clips: SpeechClipPair,
    slot: Option<SpeechSlot>,
}

impl PlaybackSession {
    /// Whether the clip pair was handed to the compositor. The compositor may
    /// already have released it after it played out.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.slot.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The audio played to its end.
    Completed,
    /// Explicit stop request.
    Stopped,
    /// A newer utterance took over.
    Superseded,
}

#[derive(Debug, Clone)]
pub enum PlaybackState {
    Idle,
    AwaitingAudio(PlaybackSession),
    Playing(PlaybackSession),
    Finished { id: SessionId, reason: FinishReason },
    Failed { id: SessionId, failure: AudioFailure },
}

/// Data-free view of [`PlaybackState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    AwaitingAudio,
    Playing,
    Finished,
    Failed,
}

/// How a session left `AwaitingAudio`/`Playing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Finished(FinishReason),
    Failed(AudioFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub id: SessionId,
    pub end: SessionEnd,
    /// Whether its clip pair was ever registered with the compositor.
    pub animated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub session: Option<SessionId>,
    pub message: String,
}

pub struct PlaybackCoordinator {
    state: PlaybackState,
    next_id: u64,
    speech_time_scale: f32,
    notices: Vec<UserNotice>,
    outcomes: Vec<SessionOutcome>,
}

impl Default for PlaybackCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            next_id: 1,
            speech_time_scale: 1.0,
            notices: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_speech_time_scale(mut self, time_scale: f32) -> Self {
        self.speech_time_scale = time_scale;
        self
    }

    #[must_use]
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        match self.state {
            PlaybackState::Idle => PlaybackStatus::Idle,
            PlaybackState::AwaitingAudio(_) => PlaybackStatus::AwaitingAudio,
            PlaybackState::Playing(_) => PlaybackStatus::Playing,
            PlaybackState::Finished { .. } => PlaybackStatus::Finished,
            PlaybackState::Failed { .. } => PlaybackStatus::Failed,
        }
    }

    /// The session in `AwaitingAudio` or `Playing`, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<&PlaybackSession> {
        match &self.state {
            PlaybackState::AwaitingAudio(s) | PlaybackState::Playing(s) => Some(s),
            _ => None,
        }
    }

    /// Drains the user-visible messages produced since the last call.
    pub fn take_notices(&mut self) -> Vec<UserNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Drains the ended sessions, oldest first.
    pub fn take_outcomes(&mut self) -> Vec<SessionOutcome> {
        std::mem::take(&mut self.outcomes)
    }

    /// Starts a new utterance, superseding any active one.
    ///
    /// The session waits in `AwaitingAudio` until the host reports
    /// [`AudioEvent::CanPlayThrough`] for its audio. There is no timeout; use
    /// [`Self::abort`] to bound the wait.
    pub fn request_utterance(
        &mut self,
        audio_url: &str,
        clips: SpeechClipPair,
        compositor: &mut AnimationCompositor,
        audio: &mut dyn AudioHost,
    ) -> SessionId {
        if let Some(previous) = self.take_active() {
            log::info!("Playback: session {} superseded", previous.id);
            self.finish(previous, FinishReason::Superseded, compositor, audio);
        }

        let id = SessionId(self.next_id);
        self.next_id += 1;

        let handle = audio.load(audio_url);
        log::debug!("Playback: session {id} awaiting audio {audio_url}");
        self.state = PlaybackState::AwaitingAudio(PlaybackSession {
            id,
            audio: handle,
            clips,
            slot: None,
        });
        id
    }

    /// Feeds an audio host callback into the state machine.
    ///
    /// Events for handles other than the active session's are stale (the
    /// session was superseded or already ended) and are ignored.
    pub fn on_audio_event(
        &mut self,
        handle: AudioHandle,
        event: AudioEvent,
        compositor: &mut AnimationCompositor,
        audio: &mut dyn AudioHost,
    ) -> PlaybackStatus {
        if self.active_session().is_none_or(|s| s.audio != handle) {
            log::debug!("Playback: ignoring {event:?} for stale audio {handle:?}");
            return self.status();
        }
        let Some(mut session) = self.take_active() else {
            return self.status();
        };
        let was_playing = session.slot.is_some();

        match event {
            AudioEvent::CanPlayThrough if was_playing => {
                self.state = PlaybackState::Playing(session);
            }
            AudioEvent::CanPlayThrough => match audio.play(session.audio) {
                Ok(()) => {
                    session.slot =
                        Some(compositor.play_speech(&session.clips, self.speech_time_scale));
                    log::debug!("Playback: session {} playing", session.id);
                    self.state = PlaybackState::Playing(session);
                }
                Err(failure) => self.fail(session, failure, compositor, audio),
            },
            AudioEvent::Ended => self.finish(session, FinishReason::Completed, compositor, audio),
            AudioEvent::Error(failure) => self.fail(session, failure, compositor, audio),
        }

        self.status()
    }

    /// Ends the active session, if any, as `Finished(Stopped)`.
    pub fn stop(&mut self, compositor: &mut AnimationCompositor, audio: &mut dyn AudioHost) {
        if let Some(session) = self.take_active() {
            self.finish(session, FinishReason::Stopped, compositor, audio);
        }
    }

    /// Forces the active session into `Failed`, e.g. from an external timeout.
    pub fn abort(
        &mut self,
        failure: AudioFailure,
        compositor: &mut AnimationCompositor,
        audio: &mut dyn AudioHost,
    ) {
        if let Some(session) = self.take_active() {
            self.fail(session, failure, compositor, audio);
        }
    }

    /// Records that the speech backend could not produce an utterance. The
    /// active session, if any, keeps playing.
    pub fn report_backend_failure(&mut self, detail: &str) {
        log::error!("Playback: speech backend failed: {detail}");
        self.notices.push(UserNotice {
            session: None,
            message: BACKEND_ERROR_NOTICE.to_string(),
        });
    }

    /// Moves the active session out, leaving `Idle` in its place.
    fn take_active(&mut self) -> Option<PlaybackSession> {
        match std::mem::replace(&mut self.state, PlaybackState::Idle) {
            PlaybackState::AwaitingAudio(s) | PlaybackState::Playing(s) => Some(s),
            other => {
                self.state = other;
                None
            }
        }
    }

    fn finish(
        &mut self,
        session: PlaybackSession,
        reason: FinishReason,
        compositor: &mut AnimationCompositor,
        audio: &mut dyn AudioHost,
    ) {
        let id = session.id;
        self.teardown(session, SessionEnd::Finished(reason), compositor, audio);
        self.state = PlaybackState::Finished { id, reason };
    }

    fn fail(
        &mut self,
        session: PlaybackSession,
        failure: AudioFailure,
        compositor: &mut AnimationCompositor,
        audio: &mut dyn AudioHost,
    ) {
        let id = session.id;
        log::error!("Playback: session {id} failed: {failure}");
        self.teardown(session, SessionEnd::Failed(failure.clone()), compositor, audio);
        self.notices.push(UserNotice {
            session: Some(id),
            message: AUDIO_ERROR_NOTICE.to_string(),
        });
        self.state = PlaybackState::Failed { id, failure };
    }

    /// Unregisters the clip pair, pauses and releases the audio.
    fn teardown(
        &mut self,
        session: PlaybackSession,
        end: SessionEnd,
        compositor: &mut AnimationCompositor,
        audio: &mut dyn AudioHost,
    ) {
        let animated = session.slot.is_some();
        if let Some(slot) = session.slot {
            compositor.stop_speech(slot);
        }
        audio.pause(session.audio);
        audio.release(session.audio);
        log::debug!("Playback: session {} torn down ({end:?})", session.id);
        self.outcomes.push(SessionOutcome {
            id: session.id,
            end,
            animated,
        });
    }
}
