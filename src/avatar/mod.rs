//! Speech-driven facial animation.
//!
//! Data flow for one utterance:
//!
//! ```text
//! SpeechResponse ─▶ BlendFrameSource ─▶ TrackSynthesizer ─▶ SpeechClipPair
//!                                                                │
//!              audio host ── can-play-through ─▶ PlaybackCoordinator
//!                                                                │
//!                                   AnimationCompositor (idle + blink + speech) ─▶ tick
//! ```
//!
//! [`Avatar`] wires these together for the common case. Each piece is also
//! usable on its own.

pub mod blend_frames;
pub mod blink;
pub mod compositor;
pub mod config;
pub mod coordinator;
pub mod host;
pub mod idle;
pub mod morph_dictionary;
pub mod speech;
pub mod synthesizer;

pub use blend_frames::{BlendFrame, BlendFrameSource, BlendFrames};
pub use blink::BlinkCycleProvider;
pub use compositor::{AnimationCompositor, SpeechSlot};
pub use config::{AvatarConfig, IdleChannelRule, NameConvention};
pub use coordinator::{
    FinishReason, PlaybackCoordinator, PlaybackSession, PlaybackState, PlaybackStatus, SessionEnd,
    SessionId, SessionOutcome, UserNotice,
};
pub use host::{AudioEvent, AudioHandle, AudioHost};
pub use idle::IdleLoopProvider;
pub use morph_dictionary::{AvatarRig, MorphDictionary};
pub use speech::SpeechResponse;
pub use synthesizer::{SpeechClipPair, Synthesis, SynthesisReport, TrackSynthesizer};

use crate::animation::{AnimationClip, AnimationTarget};
use crate::errors::{AudioFailure, AvatarError, Result};

impl AvatarRig {
    /// Builds both dictionaries from glTF-style target name lists, using the
    /// mesh names in `config`.
    pub fn from_config<S: AsRef<str>>(
        config: &AvatarConfig,
        body_targets: &[S],
        teeth_targets: &[S],
    ) -> Result<Self> {
        Ok(Self::new(
            MorphDictionary::from_target_names(config.body_mesh.as_str(), body_targets)?,
            MorphDictionary::from_target_names(config.teeth_mesh.as_str(), teeth_targets)?,
        ))
    }
}

/// One mounted talking avatar.
///
/// The render host calls [`Avatar::tick`] once per frame and forwards audio
/// callbacks to [`Avatar::handle_audio_event`]. The audio host is borrowed
/// per call; the avatar never stores it.
pub struct Avatar {
    config: AvatarConfig,
    rig: AvatarRig,
    synthesizer: TrackSynthesizer,
    compositor: AnimationCompositor,
    coordinator: PlaybackCoordinator,
}

impl Avatar {
    /// Filters the idle clip, builds the blink clip and starts both loops.
    pub fn mount(config: AvatarConfig, rig: AvatarRig, idle_source: &AnimationClip) -> Result<Self> {
        config.validate()?;
        if rig.body.mesh() != config.body_mesh || rig.teeth.mesh() != config.teeth_mesh {
            return Err(AvatarError::Config(format!(
                "rig meshes ({}, {}) do not match configuration ({}, {})",
                rig.body.mesh(),
                rig.teeth.mesh(),
                config.body_mesh,
                config.teeth_mesh
            )));
        }

        let synthesizer = TrackSynthesizer::from_config(&config);
        let idle = IdleLoopProvider::from_config(&config).build(idle_source)?;
        let blink = if config.blink_enabled {
            Some(BlinkCycleProvider::builtin()?.build(&rig.body, &synthesizer, &config.body_mesh)?)
        } else {
            None
        };

        log::info!(
            "Avatar mounted: {} idle tracks, {} blink tracks, {} body / {} teeth morphs",
            idle.tracks.len(),
            blink.as_ref().map_or(0, |c| c.tracks.len()),
            rig.body.len(),
            rig.teeth.len()
        );

        Ok(Self {
            coordinator: PlaybackCoordinator::new()
                .with_speech_time_scale(config.speech_time_scale),
            compositor: AnimationCompositor::new(idle, blink),
            config,
            rig,
            synthesizer,
        })
    }

    /// Starts speaking `response`, superseding any active utterance.
    ///
    /// Malformed blend data does not stop the audio: the utterance plays
    /// with an empty clip pair and the face stays on idle + blink.
    pub fn speak(
        &mut self,
        response: &SpeechResponse,
        host: &str,
        audio: &mut dyn AudioHost,
    ) -> SessionId {
        let clips = match response.blend_frames() {
            Ok(frames) => self.synthesizer.synthesize_pair(&frames, &self.rig),
            Err(err) => {
                log::warn!("Avatar: {err}; speaking without facial animation");
                SpeechClipPair::silent(&self.config.body_mesh, &self.config.teeth_mesh)
            }
        };

        self.coordinator.request_utterance(
            &response.audio_url(host),
            clips,
            &mut self.compositor,
            audio,
        )
    }

    pub fn handle_audio_event(
        &mut self,
        handle: AudioHandle,
        event: AudioEvent,
        audio: &mut dyn AudioHost,
    ) -> PlaybackStatus {
        self.coordinator
            .on_audio_event(handle, event, &mut self.compositor, audio)
    }

    pub fn stop(&mut self, audio: &mut dyn AudioHost) {
        self.coordinator.stop(&mut self.compositor, audio);
    }

    /// Fails the active utterance, e.g. when an external readiness timeout fires.
    pub fn abort(&mut self, failure: AudioFailure, audio: &mut dyn AudioHost) {
        self.coordinator.abort(failure, &mut self.compositor, audio);
    }

    pub fn report_backend_failure(&mut self, detail: &str) {
        self.coordinator.report_backend_failure(detail);
    }

    /// Advances idle, blink and speech by `dt` seconds into `target`.
    pub fn tick(&mut self, dt: f32, target: &mut dyn AnimationTarget) {
        self.compositor.tick(dt, target);
    }

    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        self.coordinator.status()
    }

    pub fn take_notices(&mut self) -> Vec<UserNotice> {
        self.coordinator.take_notices()
    }

    #[must_use]
    pub fn config(&self) -> &AvatarConfig {
        &self.config
    }

    #[must_use]
    pub fn rig(&self) -> &AvatarRig {
        &self.rig
    }

    #[must_use]
    pub fn compositor(&self) -> &AnimationCompositor {
        &self.compositor
    }

    #[must_use]
    pub fn coordinator(&self) -> &PlaybackCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut PlaybackCoordinator {
        &mut self.coordinator
    }
}
