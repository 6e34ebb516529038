use crate::animation::{AnimationClip, TrackData};
use crate::avatar::blend_frames::{BlendFrameSource, BlendFrames};
use crate::avatar::morph_dictionary::MorphDictionary;
use crate::avatar::synthesizer::TrackSynthesizer;
use crate::errors::Result;

/// One blink, in the speech backend's payload format.
const BUILTIN_BLINK: &str = include_str!("../../assets/blink.json");

/// Builds the looping eye-blink clip from a pre-authored blend-frame series.
#[derive(Debug, Clone)]
pub struct BlinkCycleProvider {
    frames: BlendFrames,
}

impl BlinkCycleProvider {
    pub const CLIP_NAME: &'static str = "blink";

    /// Provider over the bundled blink series.
    pub fn builtin() -> Result<Self> {
        Ok(Self::with_frames(Self::builtin_frames()?))
    }

    pub fn builtin_frames() -> Result<BlendFrames> {
        BlendFrameSource::from_json(BUILTIN_BLINK)
    }

    #[must_use]
    pub fn with_frames(frames: BlendFrames) -> Self {
        Self { frames }
    }

    #[must_use]
    pub fn frames(&self) -> &BlendFrames {
        &self.frames
    }

    /// Synthesizes the blink clip for `mesh`. Seams where a track's last
    /// weight differs from its first are logged, since they pop on wrap.
    pub fn build(
        &self,
        dictionary: &MorphDictionary,
        synthesizer: &TrackSynthesizer,
        mesh: &str,
    ) -> Result<AnimationClip> {
        let mut clip = synthesizer.synthesize(&self.frames, dictionary, mesh).clip;
        clip.name = Self::CLIP_NAME.to_string();
        clip.validate()?;

        for track in &clip.tracks {
            if let TrackData::Scalar(t) = &track.data
                && let (Some(first), Some(last)) = (t.values.first(), t.values.last())
                && (first - last).abs() > 1e-3
            {
                log::warn!("Blink: track {} does not loop cleanly", track.path);
            }
        }

        Ok(clip)
    }
}
