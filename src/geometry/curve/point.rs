/// How a curve behaves on the segment that starts at a knot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterpMode {
    /// Straight-line interpolation to the next knot.
    Linear,
    /// Cubic Hermite with tangents computed from the neighbors.
    #[default]
    HermiteAuto,
    /// Holds the knot value until the next knot, then jumps.
    Constant,
    /// Cubic Hermite with caller-supplied tangents.
    HermiteUser,
    /// Like [`InterpMode::HermiteAuto`], but tangents flatten at local extrema.
    HermiteAutoClamped,
}

impl InterpMode {
    /// Returns `true` for the cubic Hermite modes.
    #[must_use]
    pub fn is_hermite(self) -> bool {
        matches!(
            self,
            Self::HermiteAuto | Self::HermiteUser | Self::HermiteAutoClamped
        )
    }

    /// Returns `true` when tangents are computed by [`InterpCurve::auto_set_tangents`].
    ///
    /// [`InterpCurve::auto_set_tangents`]: super::InterpCurve::auto_set_tangents
    #[must_use]
    pub fn is_auto_tangent(self) -> bool {
        matches!(self, Self::HermiteAuto | Self::HermiteAutoClamped)
    }
}

/// One knot of an [`InterpCurve`](super::InterpCurve).
///
/// Tangents are expressed per unit of key, so a segment with key span `d`
/// scales them by `d` before Hermite evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpPoint<T> {
    /// Parameter value of the knot.
    pub key: f64,
    /// Value sampled at `key`.
    pub value: T,
    /// Incoming tangent.
    pub arrive_tangent: T,
    /// Outgoing tangent.
    pub leave_tangent: T,
    /// Interpolation used on the segment starting here.
    pub mode: InterpMode,
}

impl<T: Copy> InterpPoint<T> {
    /// Creates a knot with both tangents set to `tangent`.
    #[must_use]
    pub fn new(key: f64, value: T, tangent: T, mode: InterpMode) -> Self {
        Self {
            key,
            value,
            arrive_tangent: tangent,
            leave_tangent: tangent,
            mode,
        }
    }

    /// Creates a knot with separate arrive and leave tangents.
    #[must_use]
    pub fn with_tangents(key: f64, value: T, arrive: T, leave: T, mode: InterpMode) -> Self {
        Self {
            key,
            value,
            arrive_tangent: arrive,
            leave_tangent: leave,
            mode,
        }
    }
}
