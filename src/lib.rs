//! # Talking Avatar
//!
//! Speech-driven facial animation for a 3D character: viseme weights from a
//! text-to-speech backend become morph-target tracks, composited over an
//! idle head loop and an eye-blink loop, and played only once the matching
//! audio can play through.
//!
//! - [`animation`]: keyframe tracks, clips, actions and the mixer.
//! - [`avatar`]: blend-frame decoding, track synthesis, idle/blink providers,
//!   the compositor and the playback state machine.
//! - [`errors`]: [`AvatarError`] and the crate [`Result`](errors::Result).

pub mod animation;
pub mod avatar;
pub mod errors;

pub use animation::{AnimationAction, AnimationClip, AnimationMixer, AnimationTarget, LoopMode, Pose, PoseNode};
pub use avatar::{
    AnimationCompositor, AudioEvent, AudioHandle, AudioHost, Avatar, AvatarConfig, AvatarRig,
    BlendFrameSource, BlinkCycleProvider, IdleLoopProvider, MorphDictionary, PlaybackCoordinator,
    PlaybackStatus, SpeechResponse, TrackSynthesizer,
};
pub use errors::{AudioFailure, AvatarError};
