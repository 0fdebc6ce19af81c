use super::{Point3, TOLERANCE};

/// Returns the squared distance from `point` to the segment `[a, b]`.
///
/// A degenerate segment (coincident endpoints) measures the distance to `a`.
#[must_use]
pub fn point_to_segment_dist_sq(point: &Point3, a: &Point3, b: &Point3) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();

    if len_sq < TOLERANCE * TOLERANCE {
        return (point - a).norm_squared();
    }

    // Project onto the infinite line, clamp to [0, 1].
    let t = ((point - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    let closest = a + ab * t;
    (point - closest).norm_squared()
}
