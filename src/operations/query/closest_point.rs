use crate::error::{EditError, Result};
use crate::geometry::curve::{CurveSegment, InterpMode};
use crate::math::hermite::{cubic_interp, cubic_interp_derivative, cubic_interp_second_derivative};
use crate::math::{Point3, Vector3, TOLERANCE};
use crate::spline::Spline;

/// Intervals between Newton starts on a Hermite segment. Even, so `t = 0.5` is a start.
const NEWTON_STARTS: u32 = 16;

/// Newton iterations per start.
const NEWTON_ITERATIONS: usize = 8;

/// Result of a closest point query.
#[derive(Debug, Clone, Copy)]
pub struct ClosestPointResult {
    /// The closest point on the spline.
    pub point: Point3,
    /// The input key at the closest point.
    pub input_key: f64,
    /// The squared distance from the query point to the closest point.
    pub distance_squared: f64,
}

/// Finds the point on a spline closest to a given point.
///
/// Searches every segment, or a single one with [`Self::on_segment`].
pub struct ClosestPointOnSpline {
    point: Point3,
    segment: Option<usize>,
}

impl ClosestPointOnSpline {
    /// Creates a new `ClosestPointOnSpline` query over the whole spline.
    #[must_use]
    pub fn new(point: Point3) -> Self {
        Self {
            point,
            segment: None,
        }
    }

    /// Restricts the search to segment `index`.
    #[must_use]
    pub fn on_segment(mut self, index: usize) -> Self {
        self.segment = Some(index);
        self
    }

    /// Executes the query.
    ///
    /// A spline without segments reports its only point, or the origin when
    /// empty, with key `0`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::SegmentIndexOutOfRange`] if a restricted segment
    /// does not exist.
    pub fn execute(&self, spline: &Spline) -> Result<ClosestPointResult> {
        let position = spline.curves().position();
        let num_segments = position.num_segments();

        if let Some(index) = self.segment {
            if index >= num_segments {
                return Err(EditError::SegmentIndexOutOfRange {
                    index,
                    len: num_segments,
                }
                .into());
            }
        }

        if num_segments == 0 {
            let (input_key, point) = position.points().first().map_or(
                (0.0, Point3::origin()),
                |p| (p.key, Point3::from(p.value)),
            );
            return Ok(ClosestPointResult {
                point,
                input_key,
                distance_squared: (self.point - point).norm_squared(),
            });
        }

        let segments = match self.segment {
            Some(index) => index..index + 1,
            None => 0..num_segments,
        };
        let best = segments
            .filter_map(|index| position.segment(index))
            .map(|segment| closest_on_segment(&segment, &self.point))
            .min_by(|a, b| a.distance_squared.total_cmp(&b.distance_squared));

        // Every index in range has a segment, so `best` is always set here.
        Ok(best.unwrap_or(ClosestPointResult {
            point: Point3::origin(),
            input_key: 0.0,
            distance_squared: f64::INFINITY,
        }))
    }
}

fn closest_on_segment(segment: &CurveSegment<Vector3>, point: &Point3) -> ClosestPointResult {
    let target = point.coords;
    let t = match segment.mode {
        InterpMode::Constant => {
            if (segment.p0 - target).norm_squared() <= (segment.p1 - target).norm_squared() {
                0.0
            } else {
                1.0
            }
        }
        InterpMode::Linear => {
            let ab = segment.p1 - segment.p0;
            let len_sq = ab.norm_squared();
            if len_sq < TOLERANCE {
                0.0
            } else {
                ((target - segment.p0).dot(&ab) / len_sq).clamp(0.0, 1.0)
            }
        }
        InterpMode::HermiteAuto | InterpMode::HermiteUser | InterpMode::HermiteAutoClamped => {
            closest_on_hermite(segment, &target)
        }
    };

    let location = match segment.mode {
        InterpMode::Constant if t < 1.0 => segment.p0,
        InterpMode::Constant => segment.p1,
        InterpMode::Linear => segment.p0 + (segment.p1 - segment.p0) * t,
        _ => cubic_interp(segment.p0, segment.t0, segment.p1, segment.t1, t),
    };
    ClosestPointResult {
        point: Point3::from(location),
        input_key: segment.start_key + t * segment.span,
        distance_squared: (location - target).norm_squared(),
    }
}

/// Damped Newton on the squared distance from evenly spaced starts, which
/// include both ends and the middle.
fn closest_on_hermite(segment: &CurveSegment<Vector3>, target: &Vector3) -> f64 {
    let dist_sq = |t: f64| {
        (cubic_interp(segment.p0, segment.t0, segment.p1, segment.t1, t) - target).norm_squared()
    };
    (0..=NEWTON_STARTS)
        .map(|i| newton_from(segment, target, f64::from(i) / f64::from(NEWTON_STARTS)))
        .min_by(|a, b| dist_sq(*a).total_cmp(&dist_sq(*b)))
        .unwrap_or(0.0)
}

fn newton_from(segment: &CurveSegment<Vector3>, target: &Vector3, start: f64) -> f64 {
    let (p0, t0, p1, t1) = (segment.p0, segment.t0, segment.p1, segment.t1);
    let mut t = start;
    let mut max_move = 0.5;
    for _ in 0..NEWTON_ITERATIONS {
        let offset = cubic_interp(p0, t0, p1, t1, t) - target;
        let d1 = cubic_interp_derivative(p0, t0, p1, t1, t);
        let d2 = cubic_interp_second_derivative(p0, t0, p1, t1, t);
        let gradient = offset.dot(&d1);
        let hessian = d1.dot(&d1) + offset.dot(&d2);
        if hessian.abs() < TOLERANCE {
            break;
        }
        // A negative Hessian points at a maximum; step downhill instead.
        let step = if hessian > 0.0 {
            gradient / hessian
        } else {
            gradient.signum() * max_move
        };
        let step = step.clamp(-max_move, max_move);
        t = (t - step).clamp(0.0, 1.0);
        if step.abs() < 1e-9 {
            break;
        }
        max_move *= 0.75;
    }
    t
}
