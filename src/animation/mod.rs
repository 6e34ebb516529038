pub mod action;
pub mod binder;
pub mod binding;
pub mod clip;
pub mod mixer;
pub mod pose;
pub mod tracks;
pub mod values;

pub use action::{AnimationAction, LoopMode, TrackValue};
pub use binder::{AnimationTarget, Binder};
pub use binding::{NodeId, PropertyBinding, PropertyPath, TargetPath};
pub use clip::{AnimationClip, Track, TrackData};
pub use mixer::{ActionKey, AnimationMixer};
pub use pose::{Pose, PoseNode};
pub use tracks::{InterpolationMode, KeyframeCursor, KeyframeTrack};
