use crate::geometry::spline::SplineUpdate;
use crate::math::Vector3;

/// How distance and input key are converted into one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReparamMethod {
    /// Linear interpolation in the reparam table only.
    Table,
    /// Table lookup to find the segment, then Newton–Raphson on the segment's
    /// arc length (distance to key) or direct quadrature (key to distance).
    #[default]
    Refined,
}

/// Per-spline evaluation choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationPolicy {
    /// Conversion between distance and input key.
    pub reparam: ReparamMethod,
    /// Newton–Raphson steps used by [`ReparamMethod::Refined`].
    pub newton_iterations: usize,
}

impl Default for EvaluationPolicy {
    fn default() -> Self {
        Self {
            reparam: ReparamMethod::Refined,
            newton_iterations: 2,
        }
    }
}

/// Configuration of a [`Spline`](super::Spline).
///
/// Changing any of these through the spline's setters marks it for update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplineSettings {
    /// Whether the last point connects back to the first.
    pub closed_loop: bool,
    /// Explicit input key of the loop-closing virtual point.
    pub loop_key: Option<f64>,
    /// Zero tangents at the ends of an open spline.
    pub stationary_endpoints: bool,
    /// Tension for auto tangents.
    pub tension: f64,
    /// Reparam table density.
    pub reparam_steps_per_segment: usize,
    /// Non-uniform scale applied to arc length, supplied by the owner.
    pub scale3d: Vector3,
    /// Duration used by the time-based queries.
    pub duration: f64,
    /// Up axis in the spline's local frame, rotated by the rotation track.
    pub default_up_vector: Vector3,
    /// Evaluation choices.
    pub policy: EvaluationPolicy,
}

impl Default for SplineSettings {
    fn default() -> Self {
        Self {
            closed_loop: false,
            loop_key: None,
            stationary_endpoints: false,
            tension: 0.0,
            reparam_steps_per_segment: 10,
            scale3d: Vector3::new(1.0, 1.0, 1.0),
            duration: 1.0,
            default_up_vector: Vector3::z(),
            policy: EvaluationPolicy::default(),
        }
    }
}

impl SplineSettings {
    /// Returns the options passed to the track rebuild.
    #[must_use]
    pub fn update_options(&self) -> SplineUpdate {
        SplineUpdate {
            closed_loop: self.closed_loop,
            loop_key: self.loop_key,
            stationary_endpoints: self.stationary_endpoints,
            tension: self.tension,
            reparam_steps_per_segment: self.reparam_steps_per_segment.max(1),
            scale3d: self.scale3d,
        }
    }
}
