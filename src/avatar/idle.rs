//! Idle loop extraction.
//!
//! A full-body idle animation would fight whatever else owns the body pose,
//! so only the head, neck and upper-spine rotations are kept. Everything else
//! is removed from the clip rather than muted.

use rustc_hash::FxHashSet;

use crate::animation::{AnimationClip, PropertyPath, TargetPath, Track, TrackData};
use crate::avatar::config::{AvatarConfig, IdleChannelRule};
use crate::errors::Result;

#[derive(Debug, Clone)]
pub struct IdleLoopProvider {
    rules: Vec<IdleChannelRule>,
}

impl IdleLoopProvider {
    pub const CLIP_NAME: &'static str = "idle";

    #[must_use]
    pub fn new(rules: Vec<IdleChannelRule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn from_config(config: &AvatarConfig) -> Self {
        Self::new(config.idle_channels.clone())
    }

    /// Bone a source node is retargeted to, if any rule accepts it.
    #[must_use]
    pub fn bone_for(&self, node_name: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| node_name.contains(rule.contains.as_str()))
            .map(|rule| rule.bone.as_str())
    }

    /// Filters `source` down to allow-listed rotation tracks and renames them
    /// to `<bone>.quaternion`. The first source track for a bone wins.
    ///
    /// Kept tracks are validated, since the source comes from the host's
    /// asset loader.
    pub fn build(&self, source: &AnimationClip) -> Result<AnimationClip> {
        let mut bound = FxHashSet::default();
        let mut tracks = Vec::new();

        for track in &source.tracks {
            if track.path.target != TargetPath::Rotation
                || !matches!(track.data, TrackData::Quaternion(_))
            {
                continue;
            }
            let Some(bone) = self.bone_for(&track.path.node_name) else {
                continue;
            };
            if !bound.insert(bone) {
                log::debug!("Idle: '{}' also maps to '{bone}', ignored", track.path);
                continue;
            }
            tracks.push(Track::new(PropertyPath::rotation(bone), track.data.clone()));
        }

        log::debug!(
            "Idle: kept {} of {} tracks from '{}'",
            tracks.len(),
            source.tracks.len(),
            source.name
        );
        if tracks.is_empty() {
            log::warn!("Idle: source clip '{}' has no head/neck/spine rotation", source.name);
        }

        let clip = AnimationClip::new(Self::CLIP_NAME, tracks);
        clip.validate()?;
        Ok(clip)
    }
}

impl Default for IdleLoopProvider {
    fn default() -> Self {
        Self::from_config(&AvatarConfig::default())
    }
}
