use crate::geometry::curve::{InterpCurve, InterpMode, InterpPoint};
use crate::math::Vector3;

use super::SplineCurves;

/// Monotonic lookup from distance along the spline to spline input key.
///
/// Stored as a linear [`InterpCurve`] whose keys are accumulated distances and
/// whose values are input keys. Consecutive samples share a distance across
/// zero-length segments, so distances are non-decreasing rather than strictly
/// increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReparamTable {
    samples: InterpCurve<f64>,
    steps_per_segment: usize,
    scale3d: Vector3,
}

impl Default for ReparamTable {
    fn default() -> Self {
        Self {
            samples: InterpCurve::new(),
            steps_per_segment: 1,
            scale3d: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl ReparamTable {
    /// Samples every segment `steps_per_segment` times and appends a final
    /// sample at the total length.
    ///
    /// `steps_per_segment` is raised to at least 1.
    #[must_use]
    pub fn build(curves: &SplineCurves, steps_per_segment: usize, scale3d: Vector3) -> Self {
        let steps = steps_per_segment.max(1);
        let num_segments = curves.num_segments();
        let mut samples = InterpCurve::new();
        samples.reserve(num_segments * steps + 1);

        let position = curves.position();
        let mut accumulated = 0.0;
        for segment_index in 0..num_segments {
            let Some(segment) = position.segment(segment_index) else {
                continue;
            };
            for step in 0..steps {
                #[allow(clippy::cast_precision_loss)]
                let param = step as f64 / steps as f64;
                let length = if step == 0 {
                    0.0
                } else {
                    curves.segment_length(segment_index, param, &scale3d)
                };
                samples.push_point(sample(
                    accumulated + length,
                    segment.start_key + param * segment.span,
                ));
            }
            accumulated += curves.segment_length(segment_index, 1.0, &scale3d);
        }

        if let Some((_, end_key)) = position.key_range().filter(|_| num_segments > 0) {
            samples.push_point(sample(accumulated, end_key));
        }

        Self {
            samples,
            steps_per_segment: steps,
            scale3d,
        }
    }

    /// Returns the samples as `(distance, input key)` knots.
    #[must_use]
    pub fn samples(&self) -> &[InterpPoint<f64>] {
        self.samples.points()
    }

    /// Returns the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` when the table has no samples (fewer than two knots).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the number of samples taken per segment.
    #[must_use]
    pub fn steps_per_segment(&self) -> usize {
        self.steps_per_segment
    }

    /// Returns the non-uniform scale the table was measured with.
    #[must_use]
    pub fn scale3d(&self) -> &Vector3 {
        &self.scale3d
    }

    /// Returns the total arc length.
    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.samples.points().last().map_or(0.0, |p| p.key)
    }

    /// Returns the accumulated distance at the start of segment `index`.
    ///
    /// `index == num_segments` returns the total length.
    #[must_use]
    pub fn distance_at_segment_start(&self, index: usize) -> f64 {
        self.samples
            .points()
            .get(index * self.steps_per_segment)
            .map_or_else(|| self.total_length(), |p| p.key)
    }

    /// Looks up the input key at `distance` by linear interpolation.
    ///
    /// Distances outside the table clamp. Where several samples share the
    /// distance, the lowest input key wins.
    #[must_use]
    pub fn input_key_at_distance(&self, distance: f64) -> f64 {
        let points = self.samples.points();
        let Some(first) = points.first() else {
            return 0.0;
        };
        let hi = points.partition_point(|p| p.key < distance);
        if hi == 0 {
            return first.value;
        }
        let Some(upper) = points.get(hi) else {
            return points[hi - 1].value;
        };
        let lower = &points[hi - 1];
        let span = upper.key - lower.key;
        if span <= 0.0 {
            return upper.value;
        }
        let alpha = (distance - lower.key) / span;
        lower.value + (upper.value - lower.value) * alpha
    }

    /// Looks up the distance at `input_key`, the inverse of
    /// [`Self::input_key_at_distance`].
    ///
    /// Input keys increase strictly along the table, so this is a binary search
    /// over keys followed by linear interpolation of distance.
    #[must_use]
    pub fn distance_at_input_key(&self, input_key: f64) -> f64 {
        let points = self.samples.points();
        let Some(first) = points.first() else {
            return 0.0;
        };
        let hi = points.partition_point(|p| p.value < input_key);
        if hi == 0 {
            return first.key;
        }
        let Some(upper) = points.get(hi) else {
            return self.total_length();
        };
        let lower = &points[hi - 1];
        let span = upper.value - lower.value;
        if span <= 0.0 {
            return upper.key;
        }
        let alpha = (input_key - lower.value) / span;
        lower.key + (upper.key - lower.key) * alpha
    }
}

fn sample(distance: f64, input_key: f64) -> InterpPoint<f64> {
    InterpPoint::new(distance, input_key, 0.0, InterpMode::Linear)
}
