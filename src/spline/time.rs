use crate::math::{Point3, UnitQuaternion, Vector3};

use super::{Spline, SplineTransform};

impl Spline {
    /// Fraction of the duration elapsed at `time`, or `0` for a non-positive duration.
    fn time_fraction(&self, time: f64) -> f64 {
        let duration = self.settings.duration;
        if duration > 0.0 {
            time / duration
        } else {
            0.0
        }
    }

    /// Maps `time` linearly onto the input key range over `[0, duration]`.
    ///
    /// Times outside the duration wrap on closed loops and clamp otherwise.
    #[must_use]
    pub fn input_key_at_time(&self, time: f64) -> f64 {
        let position = self.curves.position();
        let Some((first, end)) = position.key_range() else {
            return 0.0;
        };
        position.normalize_key(first + self.time_fraction(time) * (end - first))
    }

    /// Returns the distance along the spline at `time`.
    ///
    /// With `constant_velocity` the distance grows linearly with time;
    /// otherwise time maps linearly to input key, so speed follows the
    /// spacing of the points.
    #[must_use]
    pub fn distance_at_time(&self, time: f64, constant_velocity: bool) -> f64 {
        if constant_velocity {
            self.normalize_distance(self.time_fraction(time) * self.spline_length())
        } else {
            self.distance_at_input_key(self.input_key_at_time(time))
        }
    }

    fn input_key_at_time_with(&self, time: f64, constant_velocity: bool) -> f64 {
        if constant_velocity {
            self.input_key_at_distance(self.distance_at_time(time, true))
        } else {
            self.input_key_at_time(time)
        }
    }

    /// Returns the location at `time`.
    #[must_use]
    pub fn location_at_time(&self, time: f64, constant_velocity: bool) -> Point3 {
        self.location_at_input_key(self.input_key_at_time_with(time, constant_velocity))
    }

    /// Returns the unit tangent at `time`.
    #[must_use]
    pub fn direction_at_time(&self, time: f64, constant_velocity: bool) -> Vector3 {
        self.direction_at_input_key(self.input_key_at_time_with(time, constant_velocity))
    }

    /// Returns the frame rotation at `time`.
    #[must_use]
    pub fn quaternion_at_time(&self, time: f64, constant_velocity: bool) -> UnitQuaternion {
        self.quaternion_at_input_key(self.input_key_at_time_with(time, constant_velocity))
    }

    /// Returns the scale at `time`.
    #[must_use]
    pub fn scale_at_time(&self, time: f64, constant_velocity: bool) -> Vector3 {
        self.scale_at_input_key(self.input_key_at_time_with(time, constant_velocity))
    }

    /// Returns the full frame at `time`.
    #[must_use]
    pub fn transform_at_time(&self, time: f64, constant_velocity: bool) -> SplineTransform {
        self.transform_at_input_key(self.input_key_at_time_with(time, constant_velocity))
    }
}
