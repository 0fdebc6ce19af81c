mod interp_curve;
mod point;
mod value;

pub use interp_curve::{CurveSegment, InterpCurve};
pub use point::{InterpMode, InterpPoint};
pub use value::CurveValue;
