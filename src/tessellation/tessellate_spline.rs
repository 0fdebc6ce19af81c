use tracing::{debug, warn};

use crate::error::{EditError, Result, TessellationError};
use crate::math::distance_3d::point_to_segment_dist_sq;
use crate::math::{Point3, Vector3, SMALL_NUMBER};
use crate::spline::Spline;

use super::{Polyline, TessellationParams};

/// The part of a spline to tessellate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TessellationRange {
    /// The whole spline, including the closing segment of a loop.
    Full,
    /// One segment.
    Segment(usize),
    /// Distances along the spline.
    Distance { start: f64, end: f64 },
    /// Times over the spline's duration.
    Time {
        start: f64,
        end: f64,
        constant_velocity: bool,
    },
}

/// Tessellates a spline into a polyline whose deviation from the curve stays
/// within a tolerance.
///
/// Each segment is split in two and every half is bisected by distance until
/// the middle sample lies within the tolerance of the chord. On curved
/// segments the piece must also pass an arc-length bound: an arc of length
/// `L` over a chord of length `c` stays within `sqrt(L² - c²) / 2` of that
/// chord. Neighbouring pieces share their boundary sample, so no vertex is
/// repeated.
#[derive(Debug, Clone, Copy)]
pub struct TessellateSpline {
    range: TessellationRange,
    params: TessellationParams,
}

/// One evaluated sample of the curve.
#[derive(Debug, Clone, Copy)]
struct Sample {
    point: Point3,
    distance: f64,
}

/// Acceptance test for one sub-range.
#[derive(Debug, Clone, Copy)]
struct Flatness {
    /// Squared tolerance.
    tolerance: f64,
    /// Scale applied to distances along the spline.
    scale3d: Vector3,
    /// Whether the arc-length bound applies.
    curved: bool,
}

impl Flatness {
    /// Squared deviation of the curve over `[a, b]` from the chord `a -> b`,
    /// as far as `mid` and the arc length can tell.
    fn deviation(&self, a: &Sample, mid: &Sample, b: &Sample) -> f64 {
        let sampled = point_to_segment_dist_sq(&mid.point, &a.point, &b.point);
        let min_scale = self.scale3d.abs().min();
        if !self.curved || min_scale < SMALL_NUMBER {
            return sampled;
        }
        // Distances are measured in scaled space, so bound the scaled deviation
        // and divide out the smallest scale component.
        let arc = b.distance - a.distance;
        let chord_sq = (b.point - a.point).component_mul(&self.scale3d).norm_squared();
        let bound = 0.25 * (arc * arc - chord_sq) / (min_scale * min_scale);
        sampled.max(bound)
    }
}

impl TessellateSpline {
    /// Creates a tessellation of the whole spline.
    #[must_use]
    pub fn new(params: TessellationParams) -> Self {
        Self {
            range: TessellationRange::Full,
            params,
        }
    }

    /// Creates a tessellation of segment `index`.
    #[must_use]
    pub fn segment(index: usize, params: TessellationParams) -> Self {
        Self {
            range: TessellationRange::Segment(index),
            params,
        }
    }

    /// Creates a tessellation between two distances along the spline.
    #[must_use]
    pub fn distance_range(start: f64, end: f64, params: TessellationParams) -> Self {
        Self {
            range: TessellationRange::Distance { start, end },
            params,
        }
    }

    /// Creates a tessellation between two times.
    #[must_use]
    pub fn time_range(
        start: f64,
        end: f64,
        constant_velocity: bool,
        params: TessellationParams,
    ) -> Self {
        Self {
            range: TessellationRange::Time {
                start,
                end,
                constant_velocity,
            },
            params,
        }
    }

    /// Returns the requested range.
    #[must_use]
    pub fn range(&self) -> TessellationRange {
        self.range
    }

    /// Executes the tessellation.
    ///
    /// A spline without segments yields a single vertex. A range whose start
    /// lies after its end yields an empty polyline.
    ///
    /// # Errors
    ///
    /// Returns [`TessellationError::InvalidParameters`] for a NaN tolerance,
    /// a zero depth limit or non-finite range bounds, and
    /// [`EditError::SegmentIndexOutOfRange`] for an invalid segment.
    pub fn execute(&self, spline: &Spline) -> Result<Polyline> {
        self.validate()?;
        let length = spline.spline_length();
        let num_segments = spline.num_segments();

        if let TessellationRange::Segment(index) = self.range {
            if index >= num_segments {
                return Err(EditError::SegmentIndexOutOfRange {
                    index,
                    len: num_segments,
                }
                .into());
            }
        }

        let (start, end) = match self.range {
            TessellationRange::Full => (0.0, length),
            TessellationRange::Segment(index) => {
                let table = spline.curves().reparam_table();
                (
                    table.distance_at_segment_start(index),
                    table.distance_at_segment_start(index + 1),
                )
            }
            TessellationRange::Distance { start, end } => (start, end),
            TessellationRange::Time {
                start,
                end,
                constant_velocity,
            } => (
                unwrapped_distance_at_time(spline, start, constant_velocity),
                unwrapped_distance_at_time(spline, end, constant_velocity),
            ),
        };

        if start > end {
            debug!(start, end, "rejected tessellation range with start after end");
            return Ok(Polyline::default());
        }

        let mut polyline = Polyline::default();
        if num_segments == 0 || length <= 0.0 {
            polyline.push(spline.location_at_distance(0.0), 0.0);
            return Ok(polyline);
        }

        let wraps = self.params.allow_wrapping && spline.curves().position().is_looped();
        if !wraps {
            let start = start.clamp(0.0, length);
            let end = end.clamp(0.0, length);
            polyline.append(self.tessellate_within(spline, start, end, 0.0));
            return Ok(polyline);
        }

        // Split at every multiple of the loop length and tessellate each
        // piece in `[0, length]`.
        let mut cycle = (start / length).floor();
        loop {
            let offset = cycle * length;
            let lo = (start - offset).max(0.0);
            let hi = (end - offset).min(length);
            if lo <= hi {
                polyline.append(self.tessellate_within(spline, lo, hi, offset));
            }
            if offset + length >= end {
                break;
            }
            cycle += 1.0;
        }
        Ok(polyline)
    }

    fn validate(&self) -> Result<()> {
        if self.params.max_square_distance.is_nan() || self.params.min_square_distance.is_nan() {
            return Err(TessellationError::InvalidParameters(
                "tolerance must not be NaN".to_owned(),
            )
            .into());
        }
        if self.params.max_depth == 0 {
            return Err(TessellationError::InvalidParameters(
                "max_depth must be at least 1".to_owned(),
            )
            .into());
        }
        let bounds_finite = match self.range {
            TessellationRange::Full | TessellationRange::Segment(_) => true,
            TessellationRange::Distance { start, end }
            | TessellationRange::Time { start, end, .. } => start.is_finite() && end.is_finite(),
        };
        if !bounds_finite {
            return Err(TessellationError::InvalidParameters(
                "range bounds must be finite".to_owned(),
            )
            .into());
        }
        Ok(())
    }

    /// Tessellates `[start, end]`, which lies within `[0, length]`, segment by
    /// segment. Reported distances are shifted by `offset`.
    fn tessellate_within(&self, spline: &Spline, start: f64, end: f64, offset: f64) -> Polyline {
        let sample = |distance: f64| Sample {
            point: spline.location_at_distance(distance),
            distance,
        };

        let mut polyline = Polyline::default();
        if start >= end {
            polyline.push(sample(start).point, start + offset);
            return polyline;
        }

        let curves = spline.curves();
        let table = curves.reparam_table();
        let mut flatness = Flatness {
            tolerance: self.params.effective_square_distance(),
            scale3d: *table.scale3d(),
            curved: false,
        };
        let mut last = sample(start);
        for index in 0..spline.num_segments() {
            let lo = table.distance_at_segment_start(index).max(start);
            let hi = table.distance_at_segment_start(index + 1).min(end);
            if hi <= lo {
                continue;
            }
            flatness.curved = curves
                .position()
                .segment(index)
                .is_some_and(|segment| segment.mode.is_hermite());
            let first = if lo > last.distance { sample(lo) } else { last };
            let mid = sample(0.5 * (lo + hi));
            let next = sample(hi);
            for piece in [
                subdivide(spline, first, mid, &flatness, self.params.max_depth),
                subdivide(spline, mid, next, &flatness, self.params.max_depth),
            ] {
                for s in piece {
                    polyline.push(s.point, s.distance + offset);
                }
            }
            last = next;
        }
        polyline
    }
}

/// Recursively bisects `[a, b]` by distance until it passes `flatness`.
/// Returns the samples from `a` to `b` inclusive, without consecutive
/// duplicates.
fn subdivide(
    spline: &Spline,
    a: Sample,
    b: Sample,
    flatness: &Flatness,
    depth: usize,
) -> Vec<Sample> {
    let distance = 0.5 * (a.distance + b.distance);
    let mid = Sample {
        point: spline.location_at_distance(distance),
        distance,
    };
    let deviation = flatness.deviation(&a, &mid, &b);

    // NaN deviations fail the comparison and terminate here.
    if deviation > flatness.tolerance {
        if depth > 1 {
            let mut left = subdivide(spline, a, mid, flatness, depth - 1);
            let right = subdivide(spline, mid, b, flatness, depth - 1);
            // The right half starts with `mid`, which ends the left half.
            left.extend(right.into_iter().skip(1));
            return left;
        }
        warn!(
            start = a.distance,
            end = b.distance,
            deviation,
            "tessellation reached its depth limit"
        );
    }

    if a.point == b.point {
        vec![a]
    } else {
        vec![a, b]
    }
}

/// Distance at `time`, counting whole loops instead of wrapping.
fn unwrapped_distance_at_time(spline: &Spline, time: f64, constant_velocity: bool) -> f64 {
    let duration = spline.settings().duration;
    let fraction = if duration > 0.0 { time / duration } else { 0.0 };
    let length = spline.spline_length();
    if constant_velocity {
        return fraction * length;
    }
    let cycles = fraction.floor();
    let Some((first, end)) = spline.curves().position().key_range() else {
        return 0.0;
    };
    let key = first + (fraction - cycles) * (end - first);
    cycles * length + spline.distance_at_input_key(key)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::curve::InterpMode;
    use crate::spline::{SplinePoint, SplineSettings};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn params(max_square_distance: f64) -> TessellationParams {
        TessellationParams {
            max_square_distance,
            ..TessellationParams::default()
        }
    }

    fn random_spline(rng: &mut StdRng, points: usize, closed_loop: bool) -> Spline {
        let positions: Vec<Point3> = (0..points)
            .map(|_| {
                Point3::new(
                    rng.random_range(-100.0..100.0),
                    rng.random_range(-100.0..100.0),
                    rng.random_range(-100.0..100.0),
                )
            })
            .collect();
        let settings = SplineSettings {
            closed_loop,
            ..SplineSettings::default()
        };
        Spline::from_positions(&positions, settings).unwrap()
    }

    fn circle_loop() -> Spline {
        let positions: Vec<Point3> = (0..8_u32)
            .map(|i| {
                let angle = f64::from(i) * std::f64::consts::FRAC_PI_4;
                Point3::new(50.0 * angle.cos(), 50.0 * angle.sin(), 0.0)
            })
            .collect();
        let settings = SplineSettings {
            closed_loop: true,
            ..SplineSettings::default()
        };
        Spline::from_positions(&positions, settings).unwrap()
    }

    #[test]
    fn straight_spline_keeps_only_the_presplit_vertices() {
        let spline = Spline::new();
        let polyline = TessellateSpline::new(params(0.01)).execute(&spline).unwrap();
        assert_eq!(polyline.len(), 3);
        assert_relative_eq!(polyline.points[0], Point3::origin(), epsilon = 1e-9);
        assert_relative_eq!(polyline.points[1], Point3::new(50.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(polyline.points[2], Point3::new(100.0, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(polyline.distances[2], 100.0, epsilon = 1e-9);
    }

    #[test]
    fn bent_three_point_spline_is_subdivided() {
        let positions = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 10.0, 0.0),
            Point3::new(20.0, 0.0, 0.0),
        ];
        let spline = Spline::from_positions(&positions, SplineSettings::default()).unwrap();
        let polyline = TessellateSpline::new(params(0.01)).execute(&spline).unwrap();
        assert!(polyline.len() > 2);
        assert_relative_eq!(*polyline.points.last().unwrap(), positions[2], epsilon = 1e-9);
    }

    #[test]
    fn degenerate_inputs() {
        let empty = Spline::empty(SplineSettings::default());
        let polyline = TessellateSpline::new(params(1.0)).execute(&empty).unwrap();
        assert_eq!(polyline.len(), 1);

        let single = Spline::from_points(
            &[SplinePoint::new(0.0, Point3::new(1.0, 2.0, 3.0))],
            SplineSettings::default(),
        )
        .unwrap();
        let polyline = TessellateSpline::new(params(1.0)).execute(&single).unwrap();
        assert_eq!(polyline.points, vec![Point3::new(1.0, 2.0, 3.0)]);

        let spline = Spline::new();
        let reversed = TessellateSpline::distance_range(60.0, 10.0, params(1.0))
            .execute(&spline)
            .unwrap();
        assert!(reversed.is_empty());

        let point = TessellateSpline::distance_range(30.0, 30.0, params(1.0))
            .execute(&spline)
            .unwrap();
        assert_eq!(point.len(), 1);

        assert!(TessellateSpline::segment(1, params(1.0)).execute(&spline).is_err());
        assert!(TessellateSpline::distance_range(0.0, f64::INFINITY, params(1.0))
            .execute(&spline)
            .is_err());
        assert!(TessellateSpline::new(params(f64::NAN)).execute(&spline).is_err());
    }

    #[test]
    fn zero_tolerance_terminates() {
        let spline = circle_loop();
        let polyline = TessellateSpline::new(params(0.0)).execute(&spline).unwrap();
        assert!(polyline.len() > 8);
    }

    #[test]
    fn deviation_stays_within_tolerance() {
        let mut rng = StdRng::seed_from_u64(42);
        let epsilon: f64 = 1.0;
        for _ in 0..10 {
            let spline = random_spline(&mut rng, 5, false);
            let polyline = TessellateSpline::new(params(epsilon * epsilon))
                .execute(&spline)
                .unwrap();
            for (w, d) in polyline.points.windows(2).zip(polyline.distances.windows(2)) {
                for k in 1..50 {
                    let distance = d[0] + (d[1] - d[0]) * f64::from(k) / 50.0;
                    let on_curve = spline.location_at_distance(distance);
                    let deviation = point_to_segment_dist_sq(&on_curve, &w[0], &w[1]);
                    assert!(deviation <= epsilon * epsilon + 1e-6, "deviation {deviation}");
                }
            }
        }
    }

    #[test]
    fn output_is_continuous() {
        let mut rng = StdRng::seed_from_u64(5);
        for closed_loop in [false, true] {
            let spline = random_spline(&mut rng, 6, closed_loop);
            let polyline = TessellateSpline::new(params(0.25)).execute(&spline).unwrap();
            // Round trips agree to a small fraction of the reparam table spacing.
            let samples = spline.num_segments() * spline.settings().reparam_steps_per_segment;
            let spacing = spline.spline_length() / f64::from(u32::try_from(samples).unwrap());
            assert_eq!(polyline.points.len(), polyline.distances.len());
            assert!(polyline.points.windows(2).all(|w| w[0] != w[1]));
            assert!(polyline.distances.windows(2).all(|w| w[1] >= w[0]));
            for (point, &distance) in polyline.points.iter().zip(&polyline.distances) {
                let key = spline.input_key_at_distance(distance);
                let recomputed = spline.distance_at_input_key(key);
                if closed_loop && distance >= spline.spline_length() {
                    // The end of a loop maps back onto its start.
                    assert_relative_eq!(recomputed, 0.0, epsilon = 1e-6);
                } else {
                    assert_relative_eq!(recomputed, distance, epsilon = 1e-2 * spacing);
                }
                assert_relative_eq!(spline.location_at_input_key(key), *point, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn segment_range_covers_one_segment() {
        let spline = circle_loop();
        let table = spline.curves().reparam_table();
        let polyline = TessellateSpline::segment(7, params(0.01)).execute(&spline).unwrap();
        assert_relative_eq!(polyline.distances[0], table.distance_at_segment_start(7));
        assert_relative_eq!(*polyline.distances.last().unwrap(), spline.spline_length());
        let corner = 50.0 * 0.5_f64.sqrt();
        assert_relative_eq!(polyline.points[0], Point3::new(corner, -corner, 0.0), epsilon = 1e-9);
        assert_relative_eq!(
            *polyline.points.last().unwrap(),
            Point3::new(50.0, 0.0, 0.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn wrapping_range_matches_rotated_loop() {
        let spline = circle_loop();
        let length = spline.spline_length();
        let wrapping = TessellationParams {
            allow_wrapping: true,
            ..params(0.05)
        };
        let polyline = TessellateSpline::distance_range(0.5 * length, 1.5 * length, wrapping)
            .execute(&spline)
            .unwrap();

        assert_relative_eq!(polyline.distances[0], 0.5 * length);
        assert_relative_eq!(*polyline.distances.last().unwrap(), 1.5 * length);
        assert!(polyline.distances.windows(2).all(|w| w[1] > w[0]));
        assert!(polyline.points.windows(2).all(|w| w[0] != w[1]));
        for (point, &distance) in polyline.points.iter().zip(&polyline.distances) {
            assert_relative_eq!(spline.location_at_distance(distance), *point, epsilon = 1e-9);
        }

        // The crossing of the loop start is a vertex.
        assert!(polyline
            .distances
            .iter()
            .any(|&d| (d - length).abs() < 1e-9));

        // Both halves reproduce the plain tessellation of the same distances.
        let first_half = TessellateSpline::distance_range(0.5 * length, length, params(0.05))
            .execute(&spline)
            .unwrap();
        let second_half = TessellateSpline::distance_range(0.0, 0.5 * length, params(0.05))
            .execute(&spline)
            .unwrap();
        assert_eq!(polyline.len(), first_half.len() + second_half.len() - 1);
        let halves = first_half.points.iter().chain(&second_half.points[1..]);
        for (a, b) in polyline.points.iter().zip(halves) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn without_wrapping_ranges_clamp() {
        let spline = circle_loop();
        let length = spline.spline_length();
        let polyline = TessellateSpline::distance_range(0.5 * length, 1.5 * length, params(0.05))
            .execute(&spline)
            .unwrap();
        assert_relative_eq!(*polyline.distances.last().unwrap(), length);
    }

    #[test]
    fn time_range_follows_distance() {
        let mut spline = circle_loop();
        spline.set_duration(8.0);
        let by_time = TessellateSpline::time_range(2.0, 6.0, true, params(0.05))
            .execute(&spline)
            .unwrap();
        let length = spline.spline_length();
        let by_distance =
            TessellateSpline::distance_range(0.25 * length, 0.75 * length, params(0.05))
                .execute(&spline)
                .unwrap();
        assert_eq!(by_time.len(), by_distance.len());

        let wrapping = TessellationParams {
            allow_wrapping: true,
            ..params(0.05)
        };
        let around = TessellateSpline::time_range(6.0, 10.0, false, wrapping)
            .execute(&spline)
            .unwrap();
        assert_relative_eq!(*around.distances.last().unwrap(), 1.25 * length, epsilon = 1e-6);
        assert_relative_eq!(around.distances[0], 0.75 * length, epsilon = 1e-6);
    }

    #[test]
    fn constant_segments_keep_both_ends() {
        let spline = Spline::from_points(
            &[
                SplinePoint::new(0.0, Point3::origin()).with_mode(InterpMode::Constant),
                SplinePoint::new(1.0, Point3::new(10.0, 0.0, 0.0)).with_mode(InterpMode::Constant),
            ],
            SplineSettings::default(),
        )
        .unwrap();
        let polyline = TessellateSpline::new(params(0.01)).execute(&spline).unwrap();
        assert_eq!(polyline.points, vec![Point3::origin(), Point3::new(10.0, 0.0, 0.0)]);
    }

    #[test]
    fn logs_can_be_captured() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("arcspline=trace"))
            .with_test_writer()
            .try_init();
        let spline = circle_loop();
        let shallow = TessellationParams {
            max_depth: 1,
            ..params(1e-6)
        };
        let polyline = TessellateSpline::new(shallow).execute(&spline).unwrap();
        // Depth one emits the pre-split halves of each segment unrefined.
        assert_eq!(polyline.len(), 2 * spline.num_segments() + 1);
    }
}
