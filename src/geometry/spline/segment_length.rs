use tracing::trace;

use crate::geometry::curve::{CurveSegment, InterpMode};
use crate::math::hermite::derivative_coefficients;
use crate::math::quadrature::integrate_5;
use crate::math::{Vector3, SMALL_NUMBER};

use super::SplineCurves;

impl SplineCurves {
    /// Returns the scaled arc length of position segment `index` from its start
    /// to the fraction `param`.
    ///
    /// Linear segments are exact. Constant segments measure zero until
    /// `param == 1`, where they report the jump to the next knot. Hermite
    /// segments integrate the speed with five-point Gauss–Legendre quadrature.
    #[must_use]
    pub fn segment_length(&self, index: usize, param: f64, scale3d: &Vector3) -> f64 {
        debug_assert!(
            index < self.num_segments(),
            "segment {index} out of range ({} segments)",
            self.num_segments()
        );
        debug_assert!((0.0..=1.0).contains(&param), "param {param} outside [0, 1]");

        let Some(segment) = self.position().segment(index) else {
            return 0.0;
        };
        let param = param.clamp(0.0, 1.0);
        let chord = (segment.p1 - segment.p0).component_mul(scale3d).norm();

        match segment.mode {
            InterpMode::Linear => chord * param,
            InterpMode::Constant => {
                if param >= 1.0 {
                    chord
                } else {
                    0.0
                }
            }
            InterpMode::HermiteAuto | InterpMode::HermiteUser | InterpMode::HermiteAutoClamped => {
                let [c1, c2, c3] =
                    derivative_coefficients(segment.p0, segment.t0, segment.p1, segment.t1);
                integrate_5(param, |alpha| {
                    ((c1 * alpha + c2) * alpha + c3)
                        .component_mul(scale3d)
                        .norm()
                })
            }
        }
    }

    /// Returns the scaled speed `|dP/dt|` of segment `index` at fraction `param`.
    #[must_use]
    pub fn segment_speed(&self, index: usize, param: f64, scale3d: &Vector3) -> f64 {
        self.position()
            .segment(index)
            .map_or(0.0, |segment| scaled_speed(&segment, param, scale3d))
    }

    /// Finds the fraction of segment `index` at which its arc length reaches
    /// `length`, given the segment's total length.
    ///
    /// The linear estimate `length / segment_length` is refined with a fixed
    /// number of Newton–Raphson steps, each clamped to `[0, 1]`. Steps at
    /// stationary points are skipped.
    #[must_use]
    pub fn segment_param_from_length(
        &self,
        index: usize,
        length: f64,
        segment_length: f64,
        scale3d: &Vector3,
        iterations: usize,
    ) -> f64 {
        if segment_length <= 0.0 {
            return 0.0;
        }
        self.refine_segment_param(index, length, length / segment_length, scale3d, iterations)
    }

    /// Newton–Raphson on the arc length of segment `index`, starting at `initial`.
    ///
    /// A step that would increase the residual ends the refinement, so the
    /// result is never worse than the starting estimate.
    pub(crate) fn refine_segment_param(
        &self,
        index: usize,
        length: f64,
        initial: f64,
        scale3d: &Vector3,
        iterations: usize,
    ) -> f64 {
        let Some(segment) = self.position().segment(index) else {
            return 0.0;
        };

        let mut t = initial.clamp(0.0, 1.0);
        let mut residual = self.segment_length(index, t, scale3d) - length;
        for _ in 0..iterations {
            let speed = scaled_speed(&segment, t, scale3d);
            if speed < SMALL_NUMBER {
                trace!(segment = index, t, "skipping Newton step at stationary point");
                continue;
            }
            let candidate = (t - residual / speed).clamp(0.0, 1.0);
            let candidate_residual = self.segment_length(index, candidate, scale3d) - length;
            if candidate_residual.abs() > residual.abs() {
                trace!(segment = index, t, candidate, "Newton step diverges, keeping estimate");
                break;
            }
            t = candidate;
            residual = candidate_residual;
        }
        t
    }
}

fn scaled_speed(segment: &CurveSegment<Vector3>, param: f64, scale3d: &Vector3) -> f64 {
    match segment.mode {
        InterpMode::Linear => (segment.p1 - segment.p0).component_mul(scale3d).norm(),
        InterpMode::Constant => 0.0,
        InterpMode::HermiteAuto | InterpMode::HermiteUser | InterpMode::HermiteAutoClamped => {
            let [c1, c2, c3] =
                derivative_coefficients(segment.p0, segment.t0, segment.p1, segment.t1);
            ((c1 * param + c2) * param + c3)
                .component_mul(scale3d)
                .norm()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::tests::tracks;
    use super::super::SplineUpdate;
    use super::*;
    use approx::assert_relative_eq;

    fn unit_scale() -> Vector3 {
        Vector3::new(1.0, 1.0, 1.0)
    }

    fn updated(points: &[(f64, Vector3)], mode: InterpMode) -> SplineCurves {
        let mut curves = tracks(points, mode);
        curves.update_spline(&SplineUpdate::default()).unwrap();
        curves
    }

    #[test]
    fn linear_segment_is_exact_for_any_scale() {
        let curves = updated(
            &[(0.0, Vector3::new(1.0, 2.0, 3.0)), (1.0, Vector3::new(4.0, 6.0, 3.0))],
            InterpMode::Linear,
        );
        assert_relative_eq!(curves.segment_length(0, 1.0, &unit_scale()), 5.0);
        assert_relative_eq!(curves.segment_length(0, 0.5, &unit_scale()), 2.5);

        let scale = Vector3::new(2.0, 0.5, 7.0);
        let expected = (6.0_f64 * 6.0 + 2.0 * 2.0).sqrt();
        assert_relative_eq!(curves.segment_length(0, 1.0, &scale), expected);
    }

    #[test]
    fn segment_speed_matches_mode() {
        let linear = updated(
            &[(0.0, Vector3::zeros()), (1.0, Vector3::new(3.0, 4.0, 0.0))],
            InterpMode::Linear,
        );
        assert_relative_eq!(linear.segment_speed(0, 0.3, &unit_scale()), 5.0);
        assert_relative_eq!(linear.segment_speed(0, 0.3, &Vector3::new(2.0, 2.0, 2.0)), 10.0);

        // Auto tangents on two knots equal the chord, so the cubic is a uniform line.
        let hermite = updated(
            &[(0.0, Vector3::zeros()), (1.0, Vector3::new(3.0, 4.0, 0.0))],
            InterpMode::HermiteAuto,
        );
        assert_relative_eq!(hermite.segment_speed(0, 0.7, &unit_scale()), 5.0, epsilon = 1e-12);
        assert!(hermite.segment_speed(3, 0.5, &unit_scale()).abs() < f64::EPSILON);
    }

    #[test]
    fn constant_segment_is_zero_until_end() {
        let curves = updated(
            &[(0.0, Vector3::zeros()), (1.0, Vector3::new(0.0, 3.0, 4.0))],
            InterpMode::Constant,
        );
        for i in 0..10 {
            let t = f64::from(i) / 10.0;
            assert!(curves.segment_length(0, t, &unit_scale()).abs() < f64::EPSILON);
        }
        assert_relative_eq!(curves.segment_length(0, 1.0, &unit_scale()), 5.0);
    }

    #[test]
    fn hermite_straight_segment_matches_chord() {
        // Two auto knots get chord tangents, so the Hermite segment is a line.
        let curves = updated(
            &[(0.0, Vector3::zeros()), (1.0, Vector3::new(100.0, 0.0, 0.0))],
            InterpMode::HermiteAuto,
        );
        assert_relative_eq!(curves.segment_length(0, 1.0, &unit_scale()), 100.0, epsilon = 1e-4);
        assert_relative_eq!(curves.segment_length(0, 0.25, &unit_scale()), 25.0, epsilon = 1e-4);
    }

    #[test]
    fn hermite_length_matches_dense_polyline() {
        let curves = updated(
            &[
                (0.0, Vector3::new(0.0, 0.0, 0.0)),
                (1.0, Vector3::new(10.0, 10.0, 0.0)),
                (2.0, Vector3::new(20.0, 0.0, 5.0)),
            ],
            InterpMode::HermiteAuto,
        );
        let mut polyline = 0.0;
        let mut prev = curves.position().eval(0.0, Vector3::zeros());
        for i in 1..=2000 {
            let p = curves.position().eval(f64::from(i) / 2000.0, Vector3::zeros());
            polyline += (p - prev).norm();
            prev = p;
        }
        let integrated = curves.segment_length(0, 1.0, &unit_scale());
        assert_relative_eq!(integrated, polyline, max_relative = 1e-3);
    }

    #[test]
    fn newton_recovers_fraction() {
        let curves = updated(
            &[
                (0.0, Vector3::new(0.0, 0.0, 0.0)),
                (1.0, Vector3::new(10.0, 10.0, 0.0)),
                (2.0, Vector3::new(20.0, 0.0, 5.0)),
            ],
            InterpMode::HermiteAuto,
        );
        let scale = unit_scale();
        let total = curves.segment_length(0, 1.0, &scale);
        for target in [0.1, 0.37, 0.5, 0.81] {
            let length = curves.segment_length(0, target, &scale);
            // Speed varies along the segment, so the linear estimate is off.
            let t = curves.segment_param_from_length(0, length, total, &scale, 4);
            assert_relative_eq!(curves.segment_length(0, t, &scale), length, epsilon = 1e-6);
        }
    }

    #[test]
    fn newton_on_zero_length_segment_returns_start() {
        let curves = updated(
            &[(0.0, Vector3::new(1.0, 1.0, 1.0)), (1.0, Vector3::new(1.0, 1.0, 1.0))],
            InterpMode::HermiteAuto,
        );
        let t = curves.segment_param_from_length(0, 0.0, 0.0, &unit_scale(), 2);
        assert!(t.abs() < f64::EPSILON);
    }

    #[test]
    fn loop_segment_closes_back_to_first_point() {
        let mut curves = tracks(
            &[(0.0, Vector3::zeros()), (1.0, Vector3::new(3.0, 4.0, 0.0))],
            InterpMode::Linear,
        );
        let update = SplineUpdate {
            closed_loop: true,
            ..SplineUpdate::default()
        };
        curves.update_spline(&update).unwrap();
        assert_relative_eq!(curves.segment_length(1, 1.0, &unit_scale()), 5.0);
    }
}
