pub mod distance_3d;
pub mod hermite;
pub mod quadrature;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Raw (not necessarily unit) quaternion, used for interpolated rotation values.
pub type Quaternion = nalgebra::Quaternion<f64>;

/// Unit quaternion type.
pub type UnitQuaternion = nalgebra::UnitQuaternion<f64>;

/// 4x4 transformation matrix.
pub type Matrix4 = nalgebra::Matrix4<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Magnitude below which a derivative or quaternion is treated as zero.
pub const SMALL_NUMBER: f64 = 1e-8;

/// Smallest allowed span between keys when auto-computing tangents.
pub const KINDA_SMALL_NUMBER: f64 = 1e-4;
