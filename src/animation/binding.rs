use std::fmt;
use std::str::FromStr;

use crate::animation::action::TrackValue;

/// Defines the target property for animation data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetPath {
    Translation, // node.position
    Rotation,    // node.quaternion
    Scale,       // node.scale
    /// A single morph-target influence on a mesh.
    MorphWeight(usize),
}

/// Fully qualified animated property, e.g. `head.quaternion` or
/// `HG_Body.morphTargetInfluences[3]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    pub node_name: String,
    pub target: TargetPath,
}

impl PropertyPath {
    #[must_use]
    pub fn new(node_name: impl Into<String>, target: TargetPath) -> Self {
        Self {
            node_name: node_name.into(),
            target,
        }
    }

    #[must_use]
    pub fn morph(mesh: impl Into<String>, channel: usize) -> Self {
        Self::new(mesh, TargetPath::MorphWeight(channel))
    }

    #[must_use]
    pub fn rotation(bone: impl Into<String>) -> Self {
        Self::new(bone, TargetPath::Rotation)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            TargetPath::Translation => write!(f, "{}.position", self.node_name),
            TargetPath::Rotation => write!(f, "{}.quaternion", self.node_name),
            TargetPath::Scale => write!(f, "{}.scale", self.node_name),
            TargetPath::MorphWeight(channel) => {
                write!(f, "{}.morphTargetInfluences[{channel}]", self.node_name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPathError(pub String);

impl fmt::Display for PropertyPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognised property path '{}'", self.0)
    }
}

impl std::error::Error for PropertyPathError {}

impl FromStr for PropertyPath {
    type Err = PropertyPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PropertyPathError(s.to_string());
        // Node names may themselves contain dots (e.g. "mixamorig:Spine2.001").
        let (node, property) = s.rsplit_once('.').ok_or_else(err)?;
        if node.is_empty() {
            return Err(err());
        }

        let target = match property {
            "position" | "translation" => TargetPath::Translation,
            "quaternion" | "rotation" => TargetPath::Rotation,
            "scale" => TargetPath::Scale,
            other => {
                let channel = other
                    .strip_prefix("morphTargetInfluences[")
                    .and_then(|rest| rest.strip_suffix(']'))
                    .and_then(|idx| idx.parse::<usize>().ok())
                    .ok_or_else(err)?;
                TargetPath::MorphWeight(channel)
            }
        };

        Ok(Self::new(node, target))
    }
}

/// Handle of a node resolved by the host's [`AnimationTarget`](crate::animation::AnimationTarget).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Binding relationship: maps track `track_index` of a clip to a resolved
/// host node and the property on it.
#[derive(Debug, Clone, Copy)]
pub struct PropertyBinding {
    pub track_index: usize,
    pub node: NodeId,
    pub target: TargetPath,
    /// Property value before the action first wrote it. Written back when
    /// the action is removed from its mixer.
    pub rest: Option<TrackValue>,
}
