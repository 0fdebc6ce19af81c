pub mod error;
pub mod geometry;
pub mod math;
pub mod operations;
pub mod spline;
pub mod tessellation;

pub use error::{Result, SplineError};
pub use spline::{Spline, SplinePoint, SplineSettings};
