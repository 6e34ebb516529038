//! In-memory [`AnimationTarget`]: a flat list of named nodes holding a
//! transform and morph weights.
//!
//! Hosts can use it as a staging buffer (tick the mixer into a `Pose`, then
//! copy the values into their scene graph), and tests use it to observe what
//! the mixer wrote.

use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;

use crate::animation::action::TrackValue;
use crate::animation::binder::AnimationTarget;
use crate::animation::binding::{NodeId, TargetPath};

#[derive(Debug, Clone)]
pub struct PoseNode {
    pub name: String,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub morph_weights: Vec<f32>,
}

impl PoseNode {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            morph_weights: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_morph_targets(mut self, count: usize) -> Self {
        self.morph_weights = vec![0.0; count];
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pose {
    nodes: Vec<PoseNode>,
    by_name: FxHashMap<String, NodeId>,
}

impl Pose {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node; a node with the same name is replaced in place.
    pub fn insert(&mut self, node: PoseNode) -> NodeId {
        if let Some(&id) = self.by_name.get(&node.name) {
            self.nodes[id.0 as usize] = node;
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.by_name.insert(node.name.clone(), id);
        self.nodes.push(node);
        id
    }

    #[must_use]
    pub fn with_node(mut self, node: PoseNode) -> Self {
        self.insert(node);
        self
    }

    #[must_use]
    pub fn node(&self, name: &str) -> Option<&PoseNode> {
        let id = self.by_name.get(name)?;
        self.nodes.get(id.0 as usize)
    }

    #[must_use]
    pub fn morph_weight(&self, mesh: &str, channel: usize) -> Option<f32> {
        self.node(mesh)?.morph_weights.get(channel).copied()
    }

    #[must_use]
    pub fn rotation(&self, bone: &str) -> Option<Quat> {
        self.node(bone).map(|n| n.rotation)
    }
}

impl AnimationTarget for Pose {
    fn resolve_node(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    fn morph_target_count(&self, node: NodeId) -> usize {
        self.nodes
            .get(node.0 as usize)
            .map_or(0, |n| n.morph_weights.len())
    }

    fn read(&self, node: NodeId, target: TargetPath) -> Option<TrackValue> {
        let node = self.nodes.get(node.0 as usize)?;
        match target {
            TargetPath::Translation => Some(TrackValue::Vector3(node.translation)),
            TargetPath::Rotation => Some(TrackValue::Quaternion(node.rotation)),
            TargetPath::Scale => Some(TrackValue::Vector3(node.scale)),
            TargetPath::MorphWeight(channel) => {
                node.morph_weights.get(channel).copied().map(TrackValue::Scalar)
            }
        }
    }

    fn apply(&mut self, node: NodeId, target: TargetPath, value: TrackValue) {
        let Some(node) = self.nodes.get_mut(node.0 as usize) else {
            return;
        };
        match (target, value) {
            (TargetPath::Translation, TrackValue::Vector3(v)) => node.translation = v,
            (TargetPath::Scale, TrackValue::Vector3(v)) => node.scale = v,
            (TargetPath::Rotation, TrackValue::Quaternion(q)) => node.rotation = q,
            (TargetPath::MorphWeight(channel), TrackValue::Scalar(w)) => {
                if let Some(slot) = node.morph_weights.get_mut(channel) {
                    *slot = w;
                }
            }
            _ => {}
        }
    }
}
