pub mod curve;
pub mod spline;

pub use curve::{CurveSegment, CurveValue, InterpCurve, InterpMode, InterpPoint};
pub use spline::{ReparamTable, SplineCurves, SplineUpdate};
