//! Animation compositing for one avatar.
//!
//! The compositor owns the [`AnimationMixer`] and registers, in this order:
//!
//! 1. the idle loop (head/neck/spine rotations, looping forever),
//! 2. the blink loop (eyelid morphs, looping forever),
//! 3. at most one speech clip pair (body + lower teeth, played once).
//!
//! The mixer applies actions in registration order, so a playing speech pair
//! overrides blink on shared channels. Once the pair is removed, every
//! channel it drove is written back to its rest weight on the next tick, and
//! blink takes over the channels it shares. A pair that has played to its
//! end is removed by [`AnimationCompositor::tick`] itself, even while its
//! audio is still running.

use std::sync::Arc;

use crate::animation::{ActionKey, AnimationAction, AnimationClip, AnimationMixer, AnimationTarget, LoopMode};
use crate::avatar::synthesizer::SpeechClipPair;

/// Mixer handles of a registered speech clip pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechSlot {
    body: ActionKey,
    teeth: ActionKey,
}

pub struct AnimationCompositor {
    mixer: AnimationMixer,
    idle: ActionKey,
    blink: Option<ActionKey>,
    speech: Option<SpeechSlot>,
}

impl AnimationCompositor {
    /// Starts the idle loop and, if given, the blink loop.
    #[must_use]
    pub fn new(idle: AnimationClip, blink: Option<AnimationClip>) -> Self {
        let mut mixer = AnimationMixer::new();
        let idle = mixer.add_action(AnimationAction::new(Arc::new(idle)).with_loop(LoopMode::Loop));
        let blink = blink.map(|clip| {
            mixer.add_action(AnimationAction::new(Arc::new(clip)).with_loop(LoopMode::Loop))
        });

        Self {
            mixer,
            idle,
            blink,
            speech: None,
        }
    }

    /// Registers `pair` as the speech clips, replacing any pair still
    /// registered. Both clips start from time zero.
    pub fn play_speech(&mut self, pair: &SpeechClipPair, time_scale: f32) -> SpeechSlot {
        if let Some(previous) = self.speech {
            log::warn!("Compositor: speech pair replaced while still registered");
            self.stop_speech(previous);
        }

        let mut start = |clip: &Arc<AnimationClip>| {
            let mut action = AnimationAction::new(Arc::clone(clip)).with_loop(LoopMode::Once);
            action.time_scale = time_scale;
            self.mixer.add_action(action)
        };
        let slot = SpeechSlot {
            body: start(&pair.body),
            teeth: start(&pair.teeth),
        };

        log::debug!(
            "Compositor: speech pair started ({} tracks, {:.2}s)",
            pair.track_count(),
            pair.duration()
        );
        self.speech = Some(slot);
        slot
    }

    /// Stops and drops both speech actions. Returns `false` if `slot` is not
    /// the registered pair.
    pub fn stop_speech(&mut self, slot: SpeechSlot) -> bool {
        if self.speech != Some(slot) {
            return false;
        }
        self.mixer.remove_action(slot.body);
        self.mixer.remove_action(slot.teeth);
        self.speech = None;
        true
    }

    /// Advances every registered action by `dt` seconds and writes the
    /// resulting pose into `target`.
    pub fn tick(&mut self, dt: f32, target: &mut dyn AnimationTarget) {
        self.mixer.update(dt, target);

        if let Some(slot) = self.speech
            && self.speech_finished()
        {
            log::debug!("Compositor: speech pair played out, released");
            self.stop_speech(slot);
        }
    }

    #[must_use]
    pub fn speech_slot(&self) -> Option<SpeechSlot> {
        self.speech
    }

    /// Number of speech actions in the mixer: `0` or `2`.
    #[must_use]
    pub fn speech_action_count(&self) -> usize {
        self.speech.map_or(0, |slot| {
            usize::from(self.mixer.contains(slot.body)) + usize::from(self.mixer.contains(slot.teeth))
        })
    }

    /// True once both speech actions have played to their end.
    fn speech_finished(&self) -> bool {
        self.speech.is_some_and(|slot| {
            [slot.body, slot.teeth]
                .iter()
                .all(|&key| self.mixer.action(key).is_none_or(AnimationAction::is_finished))
        })
    }

    /// Whether the idle loop (and blink loop, when present) are registered and running.
    #[must_use]
    pub fn persistent_actions_running(&self) -> bool {
        let running = |key: ActionKey| self.mixer.action(key).is_some_and(AnimationAction::is_running);
        running(self.idle) && self.blink.is_none_or(running)
    }

    #[must_use]
    pub fn has_blink(&self) -> bool {
        self.blink.is_some()
    }

    #[must_use]
    pub fn mixer(&self) -> &AnimationMixer {
        &self.mixer
    }
}
