//! Cubic Hermite basis and its derivatives on the normalized interval `[0, 1]`.
//!
//! Tangents passed here are already expressed per unit of normalized
//! parameter, i.e. a knot tangent multiplied by the key span of the segment.

use std::ops::{Add, Mul, Sub};

/// Evaluates the cubic Hermite curve through `p0` and `p1` at `alpha`.
#[must_use]
pub fn cubic_interp<T>(p0: T, t0: T, p1: T, t1: T, alpha: f64) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
{
    let a2 = alpha * alpha;
    let a3 = a2 * alpha;
    p0 * (2.0 * a3 - 3.0 * a2 + 1.0)
        + t0 * (a3 - 2.0 * a2 + alpha)
        + t1 * (a3 - a2)
        + p1 * (-2.0 * a3 + 3.0 * a2)
}

/// First derivative of [`cubic_interp`] with respect to `alpha`.
#[must_use]
pub fn cubic_interp_derivative<T>(p0: T, t0: T, p1: T, t1: T, alpha: f64) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
{
    let [c1, c2, c3] = derivative_coefficients(p0, t0, p1, t1);
    (c1 * alpha + c2) * alpha + c3
}

/// Second derivative of [`cubic_interp`] with respect to `alpha`.
#[must_use]
pub fn cubic_interp_second_derivative<T>(p0: T, t0: T, p1: T, t1: T, alpha: f64) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
{
    let [c1, c2, _] = derivative_coefficients(p0, t0, p1, t1);
    c1 * (2.0 * alpha) + c2
}

/// Coefficients `[a, b, c]` of the derivative quadratic `a*x^2 + b*x + c`.
#[must_use]
pub fn derivative_coefficients<T>(p0: T, t0: T, p1: T, t1: T) -> [T; 3]
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
{
    let c1 = ((p0 - p1) * 2.0 + t0 + t1) * 3.0;
    let c2 = (p1 - p0) * 6.0 - t0 * 4.0 - t1 * 2.0;
    [c1, c2, t0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector3;
    use approx::assert_relative_eq;

    #[test]
    fn interpolates_endpoints() {
        let p0 = Vector3::new(1.0, 2.0, 3.0);
        let p1 = Vector3::new(-4.0, 0.5, 8.0);
        let t0 = Vector3::new(3.0, 0.0, -1.0);
        let t1 = Vector3::new(0.0, 7.0, 2.0);
        assert_relative_eq!(cubic_interp(p0, t0, p1, t1, 0.0), p0);
        assert_relative_eq!(cubic_interp(p0, t0, p1, t1, 1.0), p1);
    }

    #[test]
    fn derivative_matches_tangents_at_ends() {
        let p0 = 0.0;
        let p1 = 10.0;
        let t0 = 2.0;
        let t1 = -3.0;
        assert_relative_eq!(cubic_interp_derivative(p0, t0, p1, t1, 0.0), t0);
        assert_relative_eq!(cubic_interp_derivative(p0, t0, p1, t1, 1.0), t1);
    }

    #[test]
    fn derivative_matches_finite_difference() {
        let (p0, t0, p1, t1) = (1.0, 4.0, -2.0, 0.5);
        let h = 1e-6;
        for i in 1..10 {
            let a = f64::from(i) / 10.0;
            let fd = (cubic_interp(p0, t0, p1, t1, a + h) - cubic_interp(p0, t0, p1, t1, a - h))
                / (2.0 * h);
            assert_relative_eq!(cubic_interp_derivative(p0, t0, p1, t1, a), fd, epsilon = 1e-6);
        }
    }

    #[test]
    fn second_derivative_matches_finite_difference() {
        let (p0, t0, p1, t1) = (3.0, -1.0, 5.0, 2.0);
        let h = 1e-5;
        let a = 0.3;
        let fd = (cubic_interp_derivative(p0, t0, p1, t1, a + h)
            - cubic_interp_derivative(p0, t0, p1, t1, a - h))
            / (2.0 * h);
        assert_relative_eq!(
            cubic_interp_second_derivative(p0, t0, p1, t1, a),
            fd,
            epsilon = 1e-5
        );
    }

    #[test]
    fn chord_tangents_give_straight_line() {
        let p0 = Vector3::zeros();
        let p1 = Vector3::new(100.0, 0.0, 0.0);
        let mid = cubic_interp(p0, p1 - p0, p1, p1 - p0, 0.5);
        assert_relative_eq!(mid, Vector3::new(50.0, 0.0, 0.0), epsilon = 1e-12);
    }
}
