//! Blend frames → morph-weight animation clips.
//!
//! One scalar track is produced per morph name that both appears in the
//! series and resolves in the mesh's [`MorphDictionary`]. A frame that omits
//! a morph holds that morph's previous weight: when the name reappears after
//! a gap, a hold keyframe is inserted at the preceding frame so linear
//! interpolation does not ramp across the gap.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::animation::{AnimationClip, InterpolationMode, KeyframeTrack, PropertyPath, Track, TrackData};
use crate::avatar::blend_frames::BlendFrames;
use crate::avatar::config::{AvatarConfig, NameConvention};
use crate::avatar::morph_dictionary::{AvatarRig, MorphDictionary};

/// What happened to each morph name during one synthesis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisReport {
    /// Tracks emitted.
    pub mapped: usize,
    /// Names absent from the dictionary.
    pub unmapped: Vec<String>,
    /// Names that resolved to a channel already driven by an earlier name.
    pub shadowed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Synthesis {
    pub clip: AnimationClip,
    pub report: SynthesisReport,
}

/// The body and lower-teeth clips of one utterance. Always played together.
#[derive(Debug, Clone)]
pub struct SpeechClipPair {
    pub body: Arc<AnimationClip>,
    pub teeth: Arc<AnimationClip>,
}

impl SpeechClipPair {
    /// Pair with no tracks, used when the blend data was unusable.
    #[must_use]
    pub fn silent(body_mesh: &str, teeth_mesh: &str) -> Self {
        Self {
            body: Arc::new(AnimationClip::empty(body_mesh)),
            teeth: Arc::new(AnimationClip::empty(teeth_mesh)),
        }
    }

    #[must_use]
    pub fn duration(&self) -> f32 {
        self.body.duration.max(self.teeth.duration)
    }

    #[must_use]
    pub fn track_count(&self) -> usize {
        self.body.tracks.len() + self.teeth.tracks.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackSynthesizer {
    convention: NameConvention,
    offsets: FxHashMap<String, f32>,
}

impl TrackSynthesizer {
    #[must_use]
    pub fn new(convention: NameConvention) -> Self {
        Self {
            convention,
            offsets: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn from_config(config: &AvatarConfig) -> Self {
        Self {
            convention: config.name_convention,
            offsets: config.weight_offsets.clone(),
        }
    }

    /// Adds `offset` to every weight of `morph` before clamping.
    #[must_use]
    pub fn with_offset(mut self, morph: impl Into<String>, offset: f32) -> Self {
        self.offsets.insert(morph.into(), offset);
        self
    }

    /// Builds the clip for one mesh. The clip is named after `target_mesh`.
    #[must_use]
    pub fn synthesize(
        &self,
        frames: &BlendFrames,
        dictionary: &MorphDictionary,
        target_mesh: &str,
    ) -> Synthesis {
        let mut report = SynthesisReport::default();
        let mut claimed = FxHashSet::default();
        let mut tracks = Vec::new();

        for name in frames.morph_names() {
            let Some(channel) = dictionary.resolve(name, self.convention) else {
                report.unmapped.push(name.to_string());
                continue;
            };
            if !claimed.insert(channel) {
                report.shadowed.push(name.to_string());
                continue;
            }

            let offset = self.offsets.get(name).copied().unwrap_or(0.0);
            let (times, values) = Self::sample_morph(frames, name, offset);
            tracks.push(Track::new(
                PropertyPath::morph(target_mesh, channel),
                TrackData::Scalar(KeyframeTrack::new(times, values, InterpolationMode::Linear)),
            ));
        }

        report.mapped = tracks.len();
        if !report.unmapped.is_empty() {
            log::debug!(
                "{target_mesh}: dropped {} unmapped morph(s): {:?}",
                report.unmapped.len(),
                report.unmapped
            );
        }
        if !report.shadowed.is_empty() {
            log::warn!(
                "{target_mesh}: morphs {:?} share a channel with an earlier name",
                report.shadowed
            );
        }

        let mut clip = AnimationClip::new(target_mesh, tracks);
        // Held weights last until the final frame, matching the audio length.
        if !clip.is_empty() {
            clip.duration = clip.duration.max(frames.duration());
        }

        Synthesis { clip, report }
    }

    /// Runs [`Self::synthesize`] against both meshes of `rig`.
    #[must_use]
    pub fn synthesize_pair(&self, frames: &BlendFrames, rig: &AvatarRig) -> SpeechClipPair {
        let body = self.synthesize(frames, &rig.body, rig.body.mesh());
        let teeth = self.synthesize(frames, &rig.teeth, rig.teeth.mesh());
        SpeechClipPair {
            body: Arc::new(body.clip),
            teeth: Arc::new(teeth.clip),
        }
    }

    fn sample_morph(frames: &BlendFrames, name: &str, offset: f32) -> (Vec<f32>, Vec<f32>) {
        let frames = frames.frames();
        let mut times = Vec::with_capacity(frames.len());
        let mut values = Vec::with_capacity(frames.len());
        let mut last_seen: Option<usize> = None;

        for (index, frame) in frames.iter().enumerate() {
            let Some(weight) = frame.weight(name) else {
                continue;
            };

            if let (Some(seen), Some(held)) = (last_seen, values.last().copied())
                && seen + 1 < index
            {
                times.push(frames[index - 1].time);
                values.push(held);
            }

            times.push(frame.time);
            values.push((weight + offset).clamp(0.0, 1.0));
            last_seen = Some(index);
        }

        (times, values)
    }
}
