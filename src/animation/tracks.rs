use crate::animation::values::Interpolatable;

/// How values between two keyframes are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    Linear,
    Step,
    /// glTF layout: each keyframe stores `[in_tangent, value, out_tangent]`.
    CubicSpline,
}

impl InterpolationMode {
    /// Number of stored values per keyframe.
    #[must_use]
    pub fn stride(self) -> usize {
        match self {
            Self::CubicSpline => 3,
            Self::Linear | Self::Step => 1,
        }
    }
}

/// Forward/backward scan distance tried before falling back to binary search.
const LOCAL_SCAN: usize = 3;

/// Remembers the keyframe interval used by the previous sample.
///
/// Playback is almost always monotonic, so the next lookup usually lands in
/// the same or the following interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyframeCursor {
    pub last_index: usize,
}

/// Reasons [`KeyframeTrack::check`] rejects a track.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackDefect {
    ValueCountMismatch { expected: usize, actual: usize },
    NegativeStart(f32),
    NotIncreasing { index: usize },
    NonFinite { index: usize },
}

impl std::fmt::Display for TrackDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ValueCountMismatch { expected, actual } => {
                write!(f, "expected {expected} values, found {actual}")
            }
            Self::NegativeStart(t) => write!(f, "first keyframe at negative time {t}"),
            Self::NotIncreasing { index } => {
                write!(f, "keyframe {index} is not after its predecessor")
            }
            Self::NonFinite { index } => write!(f, "keyframe {index} has a non-finite time"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyframeTrack<T: Interpolatable> {
    pub times: Vec<f32>,
    /// For `CubicSpline`, `times.len() * 3` entries.
    pub values: Vec<T>,
    pub interpolation: InterpolationMode,
}

impl<T: Interpolatable> KeyframeTrack<T> {
    #[must_use]
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: InterpolationMode) -> Self {
        Self {
            times,
            values,
            interpolation,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[must_use]
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Verifies the track invariants: finite, non-negative, strictly
    /// increasing times and a value count matching the interpolation layout.
    pub fn check(&self) -> Result<(), TrackDefect> {
        let expected = self.times.len() * self.interpolation.stride();
        if self.values.len() != expected {
            return Err(TrackDefect::ValueCountMismatch {
                expected,
                actual: self.values.len(),
            });
        }
        if let Some(&first) = self.times.first()
            && first < 0.0
        {
            return Err(TrackDefect::NegativeStart(first));
        }
        for (index, &t) in self.times.iter().enumerate() {
            if !t.is_finite() {
                return Err(TrackDefect::NonFinite { index });
            }
            if index > 0 && t <= self.times[index - 1] {
                return Err(TrackDefect::NotIncreasing { index });
            }
        }
        Ok(())
    }

    /// Stateless sample. Returns `None` for an empty track.
    #[must_use]
    pub fn sample(&self, time: f32) -> Option<T> {
        if self.times.is_empty() {
            return None;
        }
        let next = self.times.partition_point(|&t| t <= time);
        Some(self.sample_at_frame(next.saturating_sub(1), time))
    }

    /// Sample using `cursor` as a search hint, updating it in place.
    ///
    /// Returns `None` for an empty track.
    pub fn sample_with_cursor(&self, time: f32, cursor: &mut KeyframeCursor) -> Option<T> {
        let len = self.times.len();
        match len {
            0 => return None,
            1 => return Some(*self.value_at(0)),
            _ => {}
        }

        let start = cursor.last_index.min(len - 1);
        let index = self
            .scan_from(start, time)
            .unwrap_or_else(|| self.times.partition_point(|&t| t <= time).saturating_sub(1));

        cursor.last_index = index;
        Some(self.sample_at_frame(index, time))
    }

    /// Local search around `start`; `None` when the time is too far away.
    fn scan_from(&self, start: usize, time: f32) -> Option<usize> {
        let last = self.times.len() - 1;

        if time >= self.times[start] {
            for idx in start..=(start + LOCAL_SCAN).min(last) {
                if idx == last {
                    return Some(last);
                }
                if time < self.times[idx + 1] {
                    return Some(idx);
                }
            }
            None
        } else {
            (start.saturating_sub(LOCAL_SCAN)..start)
                .rev()
                .find(|&idx| time >= self.times[idx])
        }
    }

    fn value_at(&self, index: usize) -> &T {
        match self.interpolation {
            InterpolationMode::CubicSpline => &self.values[index * 3 + 1],
            InterpolationMode::Linear | InterpolationMode::Step => &self.values[index],
        }
    }

    fn sample_at_frame(&self, index: usize, time: f32) -> T {
        let last = self.times.len() - 1;
        if index >= last {
            return *self.value_at(last);
        }

        let next = index + 1;
        let t0 = self.times[index];
        let dt = self.times[next] - t0;
        let t = if dt > 1e-6 { (time - t0) / dt } else { 0.0 }.clamp(0.0, 1.0);

        match self.interpolation {
            InterpolationMode::Step => *self.value_at(index),
            InterpolationMode::Linear => {
                T::interpolate_linear(self.value_at(index), self.value_at(next), t)
            }
            InterpolationMode::CubicSpline => {
                let a = index * 3;
                let b = next * 3;
                T::interpolate_cubic(
                    &self.values[a + 1],
                    &self.values[a + 2],
                    &self.values[b],
                    &self.values[b + 1],
                    t,
                    dt,
                )
            }
        }
    }
}
