use glam::{Quat, Vec3};

use crate::animation::binding::{PropertyPath, TargetPath};
use crate::animation::tracks::{KeyframeTrack, TrackDefect};
use crate::errors::{AvatarError, Result};

#[derive(Debug, Clone)]
pub enum TrackData {
    Vector3(KeyframeTrack<Vec3>),
    Quaternion(KeyframeTrack<Quat>),
    Scalar(KeyframeTrack<f32>),
}

impl TrackData {
    #[must_use]
    pub fn times(&self) -> &[f32] {
        match self {
            TrackData::Vector3(t) => &t.times,
            TrackData::Quaternion(t) => &t.times,
            TrackData::Scalar(t) => &t.times,
        }
    }

    #[must_use]
    pub fn end_time(&self) -> f32 {
        self.times().last().copied().unwrap_or(0.0)
    }

    fn check(&self) -> std::result::Result<(), TrackDefect> {
        match self {
            TrackData::Vector3(t) => t.check(),
            TrackData::Quaternion(t) => t.check(),
            TrackData::Scalar(t) => t.check(),
        }
    }
}

/// Keyframe data plus the property it animates.
#[derive(Debug, Clone)]
pub struct Track {
    pub path: PropertyPath,
    pub data: TrackData,
}

impl Track {
    #[must_use]
    pub fn new(path: PropertyPath, data: TrackData) -> Self {
        Self { path, data }
    }
}

/// Immutable bundle of tracks. Duration is the latest keyframe over all tracks.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    #[must_use]
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let duration = tracks
            .iter()
            .map(|t| t.data.end_time())
            .fold(0.0_f32, f32::max);

        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }

    /// A clip with no tracks and zero duration. Playing it is a no-op.
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Morph channels animated on `mesh`, in track order.
    pub fn morph_channels<'a>(&'a self, mesh: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.tracks.iter().filter_map(move |t| match t.path.target {
            TargetPath::MorphWeight(channel) if t.path.node_name == mesh => Some(channel),
            _ => None,
        })
    }

    #[must_use]
    pub fn track(&self, path: &PropertyPath) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.path == path)
    }

    /// Checks every track's keyframe invariants.
    pub fn validate(&self) -> Result<()> {
        for track in &self.tracks {
            track
                .data
                .check()
                .map_err(|defect| AvatarError::InvalidTrack {
                    track: track.path.to_string(),
                    reason: defect.to_string(),
                })?;
        }
        Ok(())
    }
}
