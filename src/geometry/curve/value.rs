use std::fmt::Debug;
use std::ops::{Add, Mul, Sub};

use crate::math::{Quaternion, Vector3, KINDA_SMALL_NUMBER};

/// A value type that can be stored in an [`InterpCurve`](super::InterpCurve).
///
/// Values form a vector space over `f64`; quaternions are interpolated
/// component-wise and re-normalized by the caller.
pub trait CurveValue:
    Copy + Debug + PartialEq + Add<Output = Self> + Sub<Output = Self> + Mul<f64, Output = Self>
{
    /// The additive identity.
    fn zero() -> Self;

    /// Returns `1.0` or `-1.0`: the sign that moves `self` onto the same cover
    /// as `reference`.
    ///
    /// Always `1.0` for vector spaces. Quaternions report `-1.0` when `q` and
    /// `-q` (the same rotation) would otherwise interpolate the long way round.
    fn cover_sign(&self, _reference: &Self) -> f64 {
        1.0
    }

    /// Returns `self` moved onto the same cover as `reference`.
    #[must_use]
    fn align_to(self, reference: &Self) -> Self {
        self * self.cover_sign(reference)
    }

    /// Clamps an auto tangent so the curve does not overshoot at local extrema.
    #[must_use]
    fn clamp_tangent(_prev: &Self, _cur: &Self, _next: &Self, tangent: Self) -> Self {
        tangent
    }

    /// Returns `true` when every component is finite.
    fn is_finite_value(&self) -> bool;
}

impl CurveValue for f64 {
    fn zero() -> Self {
        0.0
    }

    fn clamp_tangent(prev: &Self, cur: &Self, next: &Self, tangent: Self) -> Self {
        clamp_component(*prev, *cur, *next, tangent)
    }

    fn is_finite_value(&self) -> bool {
        self.is_finite()
    }
}

impl CurveValue for Vector3 {
    fn zero() -> Self {
        Vector3::zeros()
    }

    fn clamp_tangent(prev: &Self, cur: &Self, next: &Self, tangent: Self) -> Self {
        Vector3::new(
            clamp_component(prev.x, cur.x, next.x, tangent.x),
            clamp_component(prev.y, cur.y, next.y, tangent.y),
            clamp_component(prev.z, cur.z, next.z, tangent.z),
        )
    }

    fn is_finite_value(&self) -> bool {
        self.iter().all(|c| c.is_finite())
    }
}

impl CurveValue for Quaternion {
    fn zero() -> Self {
        Quaternion::new(0.0, 0.0, 0.0, 0.0)
    }

    fn cover_sign(&self, reference: &Self) -> f64 {
        if self.dot(reference) < 0.0 {
            -1.0
        } else {
            1.0
        }
    }

    fn is_finite_value(&self) -> bool {
        self.coords.iter().all(|c| c.is_finite())
    }
}

/// Flattens a tangent component where `cur` is a local extremum.
fn clamp_component(prev: f64, cur: f64, next: f64, tangent: f64) -> f64 {
    let is_max = cur >= prev && cur >= next;
    let is_min = cur <= prev && cur <= next;
    if is_max || is_min {
        0.0
    } else {
        tangent
    }
}

/// Catmull-Rom style tangent at `cur` given its neighbors and their keys.
///
/// The result is expressed per unit of key.
pub(crate) fn compute_curve_tangent<T: CurveValue>(
    prev: (f64, T),
    cur: (f64, T),
    next: (f64, T),
    tension: f64,
    clamped: bool,
) -> T {
    let (prev_key, prev_value) = prev;
    let (_, cur_value) = cur;
    let (next_key, next_value) = next;
    let prev_value = prev_value.align_to(&cur_value);
    let next_value = next_value.align_to(&cur_value);

    let raw = ((cur_value - prev_value) + (next_value - cur_value)) * (1.0 - tension);
    let span = (next_key - prev_key).max(KINDA_SMALL_NUMBER);
    let tangent = raw * (1.0 / span);

    if clamped {
        T::clamp_tangent(&prev_value, &cur_value, &next_value, tangent)
    } else {
        tangent
    }
}
