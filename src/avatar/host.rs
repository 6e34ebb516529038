//! Interfaces of the audio collaborator.
//!
//! The core never decodes or fetches audio. It asks the host to load an
//! asset, then reacts to the host's readiness, completion and error
//! callbacks, delivered as [`AudioEvent`]s on the same event loop as render
//! ticks.

use crate::errors::AudioFailure;

/// Opaque handle of an audio asset owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    /// Enough data is buffered to play to the end without stalling.
    CanPlayThrough,
    /// Playback reached the end of the asset.
    Ended,
    /// Decode, network or playback failure.
    Error(AudioFailure),
}

pub trait AudioHost {
    /// Begins buffering `url`. Readiness is reported later via
    /// [`AudioEvent::CanPlayThrough`] for the returned handle.
    fn load(&mut self, url: &str) -> AudioHandle;

    fn play(&mut self, handle: AudioHandle) -> Result<(), AudioFailure>;

    fn pause(&mut self, handle: AudioHandle);

    /// Releases the asset. No further events are expected for `handle`.
    fn release(&mut self, handle: AudioHandle);
}
