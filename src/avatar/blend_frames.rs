//! Blend-frame decoding.
//!
//! The speech backend delivers visemes as a time series of frames. Two frame
//! shapes are accepted:
//!
//! ```json
//! [{ "time": 0.0, "blendshapes": { "jawOpen": 0.1, "mouthClose": 0.0 } }]
//! [{ "t": 0.0, "jawOpen": 0.1, "mouthClose": 0.0 }]
//! ```
//!
//! [`BlendFrameSource`] validates the series once on receipt; everything
//! downstream can rely on a non-empty, strictly time-ordered [`BlendFrames`].

use serde_json::{Map, Value};

use crate::errors::{MalformedReason, Result};

/// Weights of the named blend shapes at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendFrame {
    pub time: f32,
    /// `(morph name, weight)` in payload order.
    pub weights: Vec<(String, f32)>,
}

impl BlendFrame {
    #[must_use]
    pub fn new(time: f32, weights: Vec<(String, f32)>) -> Self {
        Self { time, weights }
    }

    #[must_use]
    pub fn weight(&self, name: &str) -> Option<f32> {
        self.weights
            .iter()
            .find_map(|(n, w)| (n == name).then_some(*w))
    }
}

/// A validated, non-empty, strictly increasing series of [`BlendFrame`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendFrames {
    frames: Vec<BlendFrame>,
}

impl BlendFrames {
    /// Validates frames built in code.
    pub fn new(frames: Vec<BlendFrame>) -> Result<Self> {
        validate(&frames)?;
        Ok(Self { frames })
    }

    #[must_use]
    pub fn frames(&self) -> &[BlendFrame] {
        &self.frames
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Never true for a validated series.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Timestamp of the last frame.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.frames.last().map_or(0.0, |f| f.time)
    }

    /// Distinct morph names in order of first appearance.
    #[must_use]
    pub fn morph_names(&self) -> Vec<&str> {
        let mut seen = rustc_hash::FxHashSet::default();
        self.frames
            .iter()
            .flat_map(|f| f.weights.iter())
            .filter_map(|(name, _)| seen.insert(name.as_str()).then_some(name.as_str()))
            .collect()
    }
}

fn validate(frames: &[BlendFrame]) -> Result<()> {
    let first = frames.first().ok_or(MalformedReason::Empty)?;
    if first.time < 0.0 {
        return Err(MalformedReason::NegativeStart { time: first.time }.into());
    }

    for (index, frame) in frames.iter().enumerate() {
        if !frame.time.is_finite() {
            return Err(MalformedReason::NonFinite {
                index,
                field: "time".into(),
            }
            .into());
        }
        if let Some((name, _)) = frame.weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(MalformedReason::NonFinite {
                index,
                field: name.clone(),
            }
            .into());
        }
        if index > 0 {
            let previous = frames[index - 1].time;
            if frame.time <= previous {
                return Err(MalformedReason::NonMonotonic {
                    index,
                    previous,
                    current: frame.time,
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Decoder for backend blend-frame payloads.
pub struct BlendFrameSource;

impl BlendFrameSource {
    const TIME_KEYS: [&'static str; 2] = ["time", "t"];
    const NESTED_KEY: &'static str = "blendshapes";

    pub fn from_json(json: &str) -> Result<BlendFrames> {
        let value: Value = serde_json::from_str(json)?;
        Self::parse(&value)
    }

    pub fn parse(payload: &Value) -> Result<BlendFrames> {
        let raw = payload.as_array().ok_or(MalformedReason::NotAnArray)?;
        if raw.is_empty() {
            return Err(MalformedReason::Empty.into());
        }

        let frames = raw
            .iter()
            .enumerate()
            .map(|(index, value)| Self::parse_frame(index, value))
            .collect::<Result<Vec<_>>>()?;

        BlendFrames::new(frames)
    }

    fn parse_frame(index: usize, value: &Value) -> Result<BlendFrame> {
        let object = value
            .as_object()
            .ok_or(MalformedReason::MissingTimestamp { index })?;

        let time = Self::TIME_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_f64))
            .ok_or(MalformedReason::MissingTimestamp { index })? as f32;

        let weights = match object.get(Self::NESTED_KEY) {
            Some(Value::Object(nested)) => Self::parse_weights(index, nested, &[])?,
            _ => Self::parse_weights(index, object, &Self::TIME_KEYS)?,
        };

        Ok(BlendFrame::new(time, weights))
    }

    fn parse_weights(
        index: usize,
        object: &Map<String, Value>,
        skip: &[&str],
    ) -> Result<Vec<(String, f32)>> {
        object
            .iter()
            .filter(|(name, _)| !skip.contains(&name.as_str()))
            .map(|(name, value)| -> Result<(String, f32)> {
                let weight = value.as_f64().ok_or_else(|| MalformedReason::InvalidWeight {
                    index,
                    name: name.clone(),
                })?;
                Ok((name.clone(), weight as f32))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::errors::AvatarError;

    fn reason(err: AvatarError) -> MalformedReason {
        match err {
            AvatarError::MalformedBlendData { reason } => reason,
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn parses_nested_backend_shape() {
        let frames = BlendFrameSource::parse(&json!([
            { "time": 0.0, "blendshapes": { "jawOpen": 0.1 } },
            { "time": 0.1, "blendshapes": { "jawOpen": 0.4, "mouthClose": 0.2 } },
        ]))
        .unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames.frames()[1].weight("mouthClose"), Some(0.2));
        assert_eq!(frames.morph_names(), vec!["jawOpen", "mouthClose"]);
    }

    #[test]
    fn parses_flat_shape() {
        let frames = BlendFrameSource::parse(&json!([
            { "t": 0.0, "mouthOpen": 0.0 },
            { "t": 0.5, "mouthOpen": 0.8 },
        ]))
        .unwrap();

        assert_eq!(frames.frames()[1].weights, vec![("mouthOpen".to_string(), 0.8)]);
        assert!((frames.duration() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn nested_key_that_is_not_an_object_is_a_weight() {
        let err = BlendFrameSource::parse(&json!([{ "t": 0.0, "blendshapes": "x" }])).unwrap_err();
        assert!(matches!(reason(err), MalformedReason::InvalidWeight { index: 0, .. }));
    }

    #[test]
    fn rejects_non_array() {
        let err = BlendFrameSource::parse(&json!({ "t": 0.0 })).unwrap_err();
        assert_eq!(reason(err), MalformedReason::NotAnArray);
    }

    #[test]
    fn rejects_missing_timestamp() {
        let err = BlendFrameSource::parse(&json!([{ "jawOpen": 0.3 }])).unwrap_err();
        assert_eq!(reason(err), MalformedReason::MissingTimestamp { index: 0 });
    }

    #[test]
    fn rejects_repeated_timestamp() {
        let err = BlendFrameSource::parse(&json!([
            { "t": 0.0, "jawOpen": 0.0 },
            { "t": 0.0, "jawOpen": 0.1 },
        ]))
        .unwrap_err();
        assert!(matches!(reason(err), MalformedReason::NonMonotonic { index: 1, .. }));
    }

    #[test]
    fn rejects_negative_start() {
        let err = BlendFrames::new(vec![BlendFrame::new(-0.1, vec![])]).unwrap_err();
        assert!(matches!(reason(err), MalformedReason::NegativeStart { .. }));
    }

    #[test]
    fn rejects_non_finite_weight() {
        let err = BlendFrames::new(vec![BlendFrame::new(
            0.0,
            vec![("jawOpen".into(), f32::NAN)],
        )])
        .unwrap_err();
        assert!(matches!(reason(err), MalformedReason::NonFinite { index: 0, .. }));
    }
}
