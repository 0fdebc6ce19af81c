mod tessellate_spline;

pub use tessellate_spline::{TessellateSpline, TessellationRange};

use crate::math::Point3;

/// Parameters controlling tessellation quality.
#[derive(Debug, Clone, Copy)]
pub struct TessellationParams {
    /// Maximum allowed squared distance between the curve and the polyline.
    pub max_square_distance: f64,
    /// Floor applied to `max_square_distance` so recursion always terminates.
    pub min_square_distance: f64,
    /// Whether distance and time ranges may run past the ends of a closed loop.
    pub allow_wrapping: bool,
    /// Recursion depth at which a sub-range is emitted regardless of deviation.
    pub max_depth: usize,
}

impl Default for TessellationParams {
    fn default() -> Self {
        Self {
            max_square_distance: 1.0,
            min_square_distance: 1e-4,
            allow_wrapping: false,
            max_depth: 32,
        }
    }
}

impl TessellationParams {
    /// Returns the squared tolerance actually used, never below the floor.
    #[must_use]
    pub fn effective_square_distance(&self) -> f64 {
        self.max_square_distance.max(self.min_square_distance)
    }
}

/// A polyline approximation of a spline, with the distance along the spline
/// of every vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polyline {
    /// The ordered vertices of the polyline.
    pub points: Vec<Point3>,
    /// Distance along the spline at each vertex. Offset by whole loop lengths
    /// when a range wraps.
    pub distances: Vec<f64>,
}

impl Polyline {
    /// Returns the number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the polyline has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates over consecutive vertex pairs.
    pub fn segments(&self) -> impl Iterator<Item = (&Point3, &Point3)> {
        self.points.windows(2).map(|w| (&w[0], &w[1]))
    }

    /// Appends a vertex, skipping it if it coincides with the last one.
    pub(crate) fn push(&mut self, point: Point3, distance: f64) {
        if self.points.last() == Some(&point) {
            return;
        }
        self.points.push(point);
        self.distances.push(distance);
    }

    /// Appends `other`, dropping its first vertex when it repeats the last one.
    pub(crate) fn append(&mut self, other: Polyline) {
        for (point, distance) in other.points.into_iter().zip(other.distances) {
            self.push(point, distance);
        }
    }
}
