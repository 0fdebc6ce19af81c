use nalgebra::{Matrix3, Rotation3};

use crate::error::Result;
use crate::math::{Matrix4, Point3, UnitQuaternion, Vector3, SMALL_NUMBER};

use super::Spline;

/// Location, rotation and scale of a spline frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplineTransform {
    pub location: Point3,
    pub rotation: UnitQuaternion,
    pub scale: Vector3,
}

impl Default for SplineTransform {
    fn default() -> Self {
        Self {
            location: Point3::origin(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl SplineTransform {
    /// Returns the homogeneous matrix applying scale, then rotation, then translation.
    #[must_use]
    pub fn to_matrix(&self) -> Matrix4 {
        Matrix4::new_translation(&self.location.coords)
            * self.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }

    /// Maps a point from the frame's local space.
    #[must_use]
    pub fn transform_point(&self, point: &Point3) -> Point3 {
        self.location + self.rotation * point.coords.component_mul(&self.scale)
    }
}

/// Builds the rotation whose X axis is `forward` and whose Z axis is as close
/// to `up` as possible. Returns `None` if the two are parallel.
fn rotation_from_xz(forward: &Vector3, up: &Vector3) -> Option<UnitQuaternion> {
    let x = *forward;
    let y = up.cross(&x).try_normalize(SMALL_NUMBER)?;
    let z = x.cross(&y);
    let rotation = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[x, y, z]));
    Some(UnitQuaternion::from_rotation_matrix(&rotation))
}

impl Spline {
    /// Returns the location at `input_key`, or the origin for an empty spline.
    #[must_use]
    pub fn location_at_input_key(&self, input_key: f64) -> Point3 {
        Point3::from(self.curves.position().eval(input_key, Vector3::zeros()))
    }

    /// Returns the position derivative with respect to input key.
    #[must_use]
    pub fn tangent_at_input_key(&self, input_key: f64) -> Vector3 {
        self.curves.position().eval_derivative(input_key)
    }

    /// Returns the unit tangent, or zero where the curve is stationary.
    #[must_use]
    pub fn direction_at_input_key(&self, input_key: f64) -> Vector3 {
        self.tangent_at_input_key(input_key)
            .try_normalize(SMALL_NUMBER)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Returns the normalized rotation track value at `input_key`.
    #[must_use]
    pub fn rotation_track_at_input_key(&self, input_key: f64) -> UnitQuaternion {
        let raw = self
            .curves
            .rotation()
            .eval(input_key, *UnitQuaternion::identity().quaternion());
        UnitQuaternion::try_new(raw, SMALL_NUMBER).unwrap_or_else(UnitQuaternion::identity)
    }

    /// Returns the frame rotation at `input_key`: X along the direction of travel
    /// and Z towards the rotation track's up vector.
    ///
    /// Where the curve is stationary the rotation track is returned as is. Where
    /// the track's up vector is parallel to the direction, the track's rotation
    /// is turned by the shortest arc onto the direction.
    #[must_use]
    pub fn quaternion_at_input_key(&self, input_key: f64) -> UnitQuaternion {
        let track = self.rotation_track_at_input_key(input_key);
        let direction = self.direction_at_input_key(input_key);
        if direction.norm_squared() < SMALL_NUMBER {
            return track;
        }
        let up = track * self.settings.default_up_vector;
        rotation_from_xz(&direction, &up).unwrap_or_else(|| {
            UnitQuaternion::rotation_between(&(track * Vector3::x()), &direction)
                .map_or(track, |turn| turn * track)
        })
    }

    /// Returns the up vector of the frame at `input_key`.
    #[must_use]
    pub fn up_vector_at_input_key(&self, input_key: f64) -> Vector3 {
        self.quaternion_at_input_key(input_key) * self.settings.default_up_vector
    }

    /// Returns the right vector (frame Y axis) at `input_key`.
    #[must_use]
    pub fn right_vector_at_input_key(&self, input_key: f64) -> Vector3 {
        self.quaternion_at_input_key(input_key) * Vector3::y()
    }

    /// Returns the scale at `input_key`, or unit scale for an empty spline.
    #[must_use]
    pub fn scale_at_input_key(&self, input_key: f64) -> Vector3 {
        self.curves
            .scale()
            .eval(input_key, Vector3::new(1.0, 1.0, 1.0))
    }

    /// Returns the full frame at `input_key`.
    #[must_use]
    pub fn transform_at_input_key(&self, input_key: f64) -> SplineTransform {
        SplineTransform {
            location: self.location_at_input_key(input_key),
            rotation: self.quaternion_at_input_key(input_key),
            scale: self.scale_at_input_key(input_key),
        }
    }

    /// Returns the input key of point `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`](crate::error::EditError::PointIndexOutOfRange)
    /// if `index` is invalid.
    pub fn input_key_at_spline_point(&self, index: usize) -> Result<f64> {
        self.check_point_index(index)?;
        Ok(self.curves.position().points()[index].key)
    }

    /// Returns the location of point `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is invalid.
    pub fn location_at_spline_point(&self, index: usize) -> Result<Point3> {
        self.input_key_at_spline_point(index)
            .map(|key| self.location_at_input_key(key))
    }

    /// Returns the incoming tangent stored on point `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is invalid.
    pub fn arrive_tangent_at_spline_point(&self, index: usize) -> Result<Vector3> {
        self.check_point_index(index)?;
        Ok(self.curves.position().points()[index].arrive_tangent)
    }

    /// Returns the outgoing tangent stored on point `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is invalid.
    pub fn leave_tangent_at_spline_point(&self, index: usize) -> Result<Vector3> {
        self.check_point_index(index)?;
        Ok(self.curves.position().points()[index].leave_tangent)
    }

    /// Returns the evaluated tangent at point `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is invalid.
    pub fn tangent_at_spline_point(&self, index: usize) -> Result<Vector3> {
        self.input_key_at_spline_point(index)
            .map(|key| self.tangent_at_input_key(key))
    }

    /// Returns the unit tangent at point `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is invalid.
    pub fn direction_at_spline_point(&self, index: usize) -> Result<Vector3> {
        self.input_key_at_spline_point(index)
            .map(|key| self.direction_at_input_key(key))
    }

    /// Returns the frame rotation at point `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is invalid.
    pub fn quaternion_at_spline_point(&self, index: usize) -> Result<UnitQuaternion> {
        self.input_key_at_spline_point(index)
            .map(|key| self.quaternion_at_input_key(key))
    }

    /// Returns the up vector at point `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is invalid.
    pub fn up_vector_at_spline_point(&self, index: usize) -> Result<Vector3> {
        self.input_key_at_spline_point(index)
            .map(|key| self.up_vector_at_input_key(key))
    }

    /// Returns the right vector at point `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is invalid.
    pub fn right_vector_at_spline_point(&self, index: usize) -> Result<Vector3> {
        self.input_key_at_spline_point(index)
            .map(|key| self.right_vector_at_input_key(key))
    }

    /// Returns the scale at point `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is invalid.
    pub fn scale_at_spline_point(&self, index: usize) -> Result<Vector3> {
        self.input_key_at_spline_point(index)
            .map(|key| self.scale_at_input_key(key))
    }

    /// Returns the full frame at point `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is invalid.
    pub fn transform_at_spline_point(&self, index: usize) -> Result<SplineTransform> {
        self.input_key_at_spline_point(index)
            .map(|key| self.transform_at_input_key(key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::tests::spline_through;
    use super::super::{SplinePoint, SplineSettings};
    use super::*;
    use crate::geometry::curve::InterpMode;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn empty_spline_returns_identity_values() {
        let spline = Spline::empty(SplineSettings::default());
        assert_relative_eq!(spline.location_at_input_key(0.3), Point3::origin());
        assert_relative_eq!(spline.direction_at_input_key(0.3), Vector3::zeros());
        assert_relative_eq!(spline.scale_at_input_key(0.3), Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(spline.quaternion_at_input_key(0.3), UnitQuaternion::identity());
        assert!(spline.location_at_spline_point(0).is_err());
    }

    #[test]
    fn straight_spline_frame_is_identity() {
        let spline = Spline::new();
        let key = 0.5;
        assert_relative_eq!(
            spline.location_at_input_key(key),
            Point3::new(50.0, 0.0, 0.0),
            epsilon = 1e-9
        );
        assert_relative_eq!(spline.direction_at_input_key(key), Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(spline.up_vector_at_input_key(key), Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(spline.right_vector_at_input_key(key), Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(
            spline.quaternion_at_input_key(key),
            UnitQuaternion::identity(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn frame_follows_direction() {
        let spline =
            spline_through(&[(0.0, 0.0, 0.0), (0.0, 10.0, 0.0)], SplineSettings::default());
        let rotation = spline.quaternion_at_input_key(0.5);
        assert_relative_eq!(rotation * Vector3::x(), Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(rotation * Vector3::z(), Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(spline.right_vector_at_input_key(0.5), -Vector3::x(), epsilon = 1e-12);
    }

    #[test]
    fn vertical_direction_keeps_forward_on_curve() {
        let spline =
            spline_through(&[(0.0, 0.0, 0.0), (0.0, 0.0, 10.0)], SplineSettings::default());
        let rotation = spline.quaternion_at_input_key(0.5);
        assert_relative_eq!(rotation * Vector3::x(), Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn rotation_track_rolls_the_frame() {
        let mut spline = Spline::new();
        let roll = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2);
        spline.set_rotation_at_point(0, roll).unwrap();
        spline.set_rotation_at_point(1, roll).unwrap();
        spline.update_spline().unwrap();
        assert_relative_eq!(spline.up_vector_at_input_key(0.5), -Vector3::y(), epsilon = 1e-9);
        assert_relative_eq!(spline.rotation_track_at_input_key(0.5), roll, epsilon = 1e-9);
    }

    #[test]
    fn rotation_track_is_normalized_between_points() {
        let mut spline = Spline::new();
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        spline.set_rotation_at_point(1, yaw).unwrap();
        spline.update_spline().unwrap();
        let mid = spline.rotation_track_at_input_key(0.5);
        assert_relative_eq!(mid.quaternion().norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(mid.angle(), FRAC_PI_2 / 2.0, epsilon = 1e-9);
    }

    fn yaw_spline(yaws_deg: &[f64]) -> Spline {
        let points: Vec<SplinePoint> = yaws_deg
            .iter()
            .zip(0_u32..)
            .map(|(&yaw, key)| {
                let rotation =
                    UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw.to_radians());
                SplinePoint::new(f64::from(key), Point3::new(100.0 * f64::from(key), 0.0, 0.0))
                    .with_rotation(rotation)
            })
            .collect();
        Spline::from_points(&points, SplineSettings::default()).unwrap()
    }

    #[test]
    fn rotation_track_follows_hermite_between_knots() {
        // Knots at 0, 90 and 180 degrees of yaw. Tangents are q1 - q0 at the
        // start and (q2 - q0) / 2 in the middle.
        let spline = yaw_spline(&[0.0, 90.0, 180.0]);
        for (key, expected) in [
            (0.25, 22.524_294_968),
            (0.5, 46.676_290_202),
            (0.75, 69.300_580_570),
        ] {
            let yaw = spline.rotation_track_at_input_key(key).scaled_axis().z.to_degrees();
            assert_relative_eq!(yaw, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn negated_knot_quaternion_gives_same_rotations() {
        let reference = yaw_spline(&[0.0, 90.0, 180.0, 300.0]);
        let mut flipped = reference.clone();
        let rotation = flipped.spline_point(1).unwrap().rotation;
        flipped
            .set_rotation_at_point(1, UnitQuaternion::new_unchecked(-rotation.into_inner()))
            .unwrap();
        flipped.update_spline().unwrap();
        assert!(flipped.curves().rotation().points()[1].value.w < 0.0);

        for i in 0..=60 {
            let key = 3.0 * f64::from(i) / 60.0;
            let a = reference.rotation_track_at_input_key(key);
            let b = flipped.rotation_track_at_input_key(key);
            assert!(a.angle_to(&b) < 1e-6, "rotations differ at key {key}");
        }
    }

    #[test]
    fn scale_interpolates_between_knots() {
        let points = [
            SplinePoint::new(0.0, Point3::origin())
                .with_mode(InterpMode::Linear)
                .with_scale(Vector3::new(1.0, 2.0, 1.0)),
            SplinePoint::new(1.0, Point3::new(10.0, 0.0, 0.0))
                .with_mode(InterpMode::Linear)
                .with_scale(Vector3::new(3.0, 2.0, 1.0)),
        ];
        let spline = Spline::from_points(&points, SplineSettings::default()).unwrap();
        assert_relative_eq!(
            spline.scale_at_input_key(0.5),
            Vector3::new(2.0, 2.0, 1.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn scale_and_transform() {
        let mut spline = Spline::new();
        spline.set_scale_at_point(1, Vector3::new(3.0, 3.0, 3.0)).unwrap();
        spline.update_spline().unwrap();
        let transform = spline.transform_at_input_key(1.0);
        assert_relative_eq!(transform.scale, Vector3::new(3.0, 3.0, 3.0), epsilon = 1e-12);
        assert_relative_eq!(transform.location, Point3::new(100.0, 0.0, 0.0), epsilon = 1e-9);

        let matrix = transform.to_matrix();
        let mapped = matrix.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(mapped, Point3::new(103.0, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(
            transform.transform_point(&Point3::new(1.0, 0.0, 0.0)),
            mapped,
            epsilon = 1e-9
        );
    }

    #[test]
    fn point_queries_match_key_queries() {
        let spline = spline_through(
            &[(0.0, 0.0, 0.0), (10.0, 5.0, 0.0), (20.0, 0.0, 0.0)],
            SplineSettings::default(),
        );
        assert_relative_eq!(spline.input_key_at_spline_point(2).unwrap(), 2.0);
        assert_relative_eq!(
            spline.location_at_spline_point(1).unwrap(),
            Point3::new(10.0, 5.0, 0.0),
            epsilon = 1e-12
        );
        // Catmull-Rom tangent at the middle point.
        assert_relative_eq!(
            spline.leave_tangent_at_spline_point(1).unwrap(),
            Vector3::new(10.0, 0.0, 0.0),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            spline.tangent_at_spline_point(1).unwrap(),
            spline.arrive_tangent_at_spline_point(1).unwrap(),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            spline.direction_at_spline_point(1).unwrap(),
            Vector3::x(),
            epsilon = 1e-9
        );
        assert!(spline.transform_at_spline_point(3).is_err());
        assert!(spline.scale_at_spline_point(2).is_ok());
        assert!(spline.up_vector_at_spline_point(0).is_ok());
        assert!(spline.right_vector_at_spline_point(0).is_ok());
        assert!(spline.quaternion_at_spline_point(0).is_ok());
    }
}
