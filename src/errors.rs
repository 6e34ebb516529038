//! Error Types
//!
//! This module defines the error types used throughout the avatar pipeline.
//!
//! # Overview
//!
//! The main error type [`AvatarError`] covers every failure mode of the core:
//! - Malformed blend-shape (viseme) series delivered by the speech backend
//! - Audio readiness failures reported by the audio host
//! - Invalid morph dictionaries and keyframe tracks
//! - JSON decoding of payloads, configuration and bundled assets
//!
//! None of these are fatal. Callers degrade to "idle + blink only".
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, AvatarError>`.
//!
//! ```rust,ignore
//! use talking_avatar::errors::Result;
//!
//! fn load() -> Result<()> {
//!     Ok(())
//! }
//! ```

use std::fmt;

use thiserror::Error;

/// The main error type for the avatar pipeline.
#[derive(Error, Debug)]
pub enum AvatarError {
    // ========================================================================
    // Blend Data Errors
    // ========================================================================
    /// The blend-frame series is empty, out of order or contains non-finite data.
    #[error("Malformed blend data: {reason}")]
    MalformedBlendData {
        /// What exactly was wrong with the series
        reason: MalformedReason,
    },

    // ========================================================================
    // Audio Errors
    // ========================================================================
    /// The audio asset could not be decoded, fetched or started.
    #[error("Audio readiness error: {0}")]
    AudioReadiness(AudioFailure),

    // ========================================================================
    // Rig & Track Errors
    // ========================================================================
    /// A morph dictionary failed validation while being built.
    #[error("Invalid morph dictionary: {0}")]
    InvalidMorphDictionary(String),

    /// A keyframe track violates its ordering or layout invariants.
    #[error("Invalid track '{track}': {reason}")]
    InvalidTrack {
        /// Property path of the offending track
        track: String,
        /// Description of the violation
        reason: String,
    },

    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration is syntactically valid but semantically unusable.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Detail for [`AvatarError::MalformedBlendData`].
#[derive(Debug, Clone, PartialEq)]
pub enum MalformedReason {
    /// The payload contained no frames at all.
    Empty,
    /// The payload was not an array of frame objects.
    NotAnArray,
    /// A frame was not an object or lacked a timestamp.
    MissingTimestamp { index: usize },
    /// A timestamp was not strictly greater than its predecessor.
    NonMonotonic { index: usize, previous: f32, current: f32 },
    /// The first timestamp is negative.
    NegativeStart { time: f32 },
    /// A timestamp or weight was NaN or infinite.
    NonFinite { index: usize, field: String },
    /// A weight was not a number.
    InvalidWeight { index: usize, name: String },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "frame series is empty"),
            Self::NotAnArray => write!(f, "expected an array of frames"),
            Self::MissingTimestamp { index } => {
                write!(f, "frame {index} has no numeric timestamp")
            }
            Self::NonMonotonic {
                index,
                previous,
                current,
            } => write!(
                f,
                "frame {index} at t={current} does not follow t={previous}"
            ),
            Self::NegativeStart { time } => write!(f, "first frame starts at t={time}"),
            Self::NonFinite { index, field } => {
                write!(f, "frame {index} has a non-finite value for '{field}'")
            }
            Self::InvalidWeight { index, name } => {
                write!(f, "frame {index} has a non-numeric weight for '{name}'")
            }
        }
    }
}

/// Classification of audio host failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioFailure {
    /// The asset was fetched but could not be decoded.
    Decode(String),
    /// The asset could not be fetched.
    Network(String),
    /// The host refused to start playback.
    PlaybackRejected(String),
}

impl fmt::Display for AudioFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(msg) => write!(f, "decode failed: {msg}"),
            Self::Network(msg) => write!(f, "network failure: {msg}"),
            Self::PlaybackRejected(msg) => write!(f, "playback rejected: {msg}"),
        }
    }
}

impl From<AudioFailure> for AvatarError {
    fn from(err: AudioFailure) -> Self {
        AvatarError::AudioReadiness(err)
    }
}

impl From<MalformedReason> for AvatarError {
    fn from(reason: MalformedReason) -> Self {
        AvatarError::MalformedBlendData { reason }
    }
}

/// Alias for `Result<T, AvatarError>`.
pub type Result<T> = std::result::Result<T, AvatarError>;
