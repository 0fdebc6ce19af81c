//! Gauss–Legendre quadrature used for arc length integration.

/// Five-point Gauss–Legendre table as `(abscissa, weight)` pairs on `[-1, 1]`.
pub const GAUSS_LEGENDRE_5: [(f64, f64); 5] = [
    (0.0, 0.568_888_9),
    (-0.538_469_3, 0.478_628_67),
    (0.538_469_3, 0.478_628_67),
    (-0.906_179_85, 0.236_926_88),
    (0.906_179_85, 0.236_926_88),
];

/// Integrates `f` over `[0, upper]` with the five-point rule.
///
/// The canonical abscissae are mapped onto `[0, upper]`, so the weighted sum
/// is multiplied by the Jacobian `upper / 2`.
#[must_use]
pub fn integrate_5<F>(upper: f64, mut f: F) -> f64
where
    F: FnMut(f64) -> f64,
{
    let half = upper * 0.5;
    let sum: f64 = GAUSS_LEGENDRE_5
        .iter()
        .map(|&(abscissa, weight)| f(half * (1.0 + abscissa)) * weight)
        .sum();
    sum * half
}
