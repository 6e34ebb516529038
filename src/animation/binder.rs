use crate::animation::action::TrackValue;
use crate::animation::binding::{NodeId, PropertyBinding, TargetPath};
use crate::animation::clip::{AnimationClip, TrackData};

/// The animated object graph, as seen by the mixer.
///
/// Implemented by the rendering host. Names are resolved once per action, so
/// `resolve_node` may be slow; `apply` runs for every bound track every frame.
pub trait AnimationTarget {
    fn resolve_node(&self, name: &str) -> Option<NodeId>;

    /// Number of morph influences on the node's mesh, `0` if it has none.
    fn morph_target_count(&self, node: NodeId) -> usize;

    /// Current value of a property, `None` if it cannot be read back.
    fn read(&self, node: NodeId, target: TargetPath) -> Option<TrackValue>;

    fn apply(&mut self, node: NodeId, target: TargetPath, value: TrackValue);
}

pub struct Binder;

impl Binder {
    /// Resolves every track of `clip` against `target`.
    ///
    /// Tracks whose node is missing, whose morph channel is out of range, or
    /// whose data type does not fit the property are left unbound.
    pub fn bind(target: &dyn AnimationTarget, clip: &AnimationClip) -> Vec<PropertyBinding> {
        let mut bindings = Vec::with_capacity(clip.tracks.len());

        for (track_index, track) in clip.tracks.iter().enumerate() {
            let Some(node) = target.resolve_node(&track.path.node_name) else {
                log::debug!("Clip '{}': no node for track {}", clip.name, track.path);
                continue;
            };

            let compatible = match (&track.data, track.path.target) {
                (TrackData::Scalar(_), TargetPath::MorphWeight(channel)) => {
                    channel < target.morph_target_count(node)
                }
                (TrackData::Quaternion(_), TargetPath::Rotation)
                | (TrackData::Vector3(_), TargetPath::Translation | TargetPath::Scale) => true,
                _ => false,
            };

            if compatible {
                bindings.push(PropertyBinding {
                    track_index,
                    node,
                    target: track.path.target,
                    rest: target.read(node, track.path.target),
                });
            } else {
                log::warn!(
                    "Clip '{}': track {} does not fit its target, skipping",
                    clip.name,
                    track.path
                );
            }
        }

        bindings
    }
}
