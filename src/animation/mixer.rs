use slotmap::{SlotMap, new_key_type};

use crate::animation::action::{AnimationAction, TrackValue};
use crate::animation::binder::{AnimationTarget, Binder};
use crate::animation::binding::{NodeId, TargetPath};

new_key_type! {
    /// Stable handle to an action registered with an [`AnimationMixer`].
    pub struct ActionKey;
}

/// Evaluates every registered action against one target.
///
/// Actions are applied in registration order, so when two actions drive the
/// same property the most recently registered one wins for that frame.
///
/// Removing an action hands its properties back: their rest values are
/// written at the start of the next [`AnimationMixer::update`], before any
/// remaining action runs.
#[derive(Default)]
pub struct AnimationMixer {
    actions: SlotMap<ActionKey, AnimationAction>,
    order: Vec<ActionKey>,
    pending_restore: Vec<(NodeId, TargetPath, TrackValue)>,
}

impl AnimationMixer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_action(&mut self, action: AnimationAction) -> ActionKey {
        let key = self.actions.insert(action);
        self.order.push(key);
        key
    }

    /// Stops and drops an action. Returns it if it was registered.
    pub fn remove_action(&mut self, key: ActionKey) -> Option<AnimationAction> {
        let action = self.actions.remove(key)?;
        self.order.retain(|&k| k != key);
        if let Some(bindings) = &action.bindings {
            self.pending_restore.extend(
                bindings
                    .iter()
                    .filter_map(|b| b.rest.map(|rest| (b.node, b.target, rest))),
            );
        }
        Some(action)
    }

    /// Number of property values waiting to be written back.
    #[must_use]
    pub fn pending_restore_count(&self) -> usize {
        self.pending_restore.len()
    }

    #[must_use]
    pub fn action(&self, key: ActionKey) -> Option<&AnimationAction> {
        self.actions.get(key)
    }

    pub fn action_mut(&mut self, key: ActionKey) -> Option<&mut AnimationAction> {
        self.actions.get_mut(key)
    }

    #[must_use]
    pub fn contains(&self, key: ActionKey) -> bool {
        self.actions.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Advance all actions by `dt` and write their values into `target`.
    pub fn update(&mut self, dt: f32, target: &mut dyn AnimationTarget) {
        for (node, property, rest) in self.pending_restore.drain(..) {
            target.apply(node, property, rest);
        }

        for &key in &self.order {
            let Some(action) = self.actions.get_mut(key) else {
                continue;
            };

            action.update(dt);
            if !action.is_running() {
                continue;
            }

            if action.bindings.is_none() {
                action.bindings = Some(Binder::bind(&*target, action.clip()));
            }

            let bindings = action.bindings.take().unwrap_or_default();
            for binding in &bindings {
                if let Some(value) = action.sample_track(binding.track_index) {
                    target.apply(binding.node, binding.target, value);
                }
            }
            action.bindings = Some(bindings);
        }
    }
}
