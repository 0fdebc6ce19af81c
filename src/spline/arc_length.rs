use crate::error::{EditError, Result};
use crate::math::{Point3, UnitQuaternion, Vector3};

use super::{ReparamMethod, Spline, SplineTransform};

impl Spline {
    /// Returns the total arc length measured by the last update.
    #[must_use]
    pub fn spline_length(&self) -> f64 {
        self.curves.spline_length()
    }

    /// Returns the arc length of segment `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::SegmentIndexOutOfRange`] if `index` is invalid.
    pub fn segment_length(&self, index: usize) -> Result<f64> {
        let len = self.num_segments();
        if index >= len {
            return Err(EditError::SegmentIndexOutOfRange { index, len }.into());
        }
        let scale3d = *self.curves.reparam_table().scale3d();
        Ok(self.curves.segment_length(index, 1.0, &scale3d))
    }

    /// Returns the distance along the spline at point `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`] if `index` is invalid.
    pub fn distance_at_spline_point(&self, index: usize) -> Result<f64> {
        self.check_point_index(index)?;
        Ok(self.curves.reparam_table().distance_at_segment_start(index))
    }

    /// Maps `distance` into `[0, length]`: wraps on closed loops, clamps otherwise.
    pub(crate) fn normalize_distance(&self, distance: f64) -> f64 {
        let length = self.spline_length();
        if length <= 0.0 {
            return 0.0;
        }
        if self.curves.position().is_looped() {
            if (0.0..length).contains(&distance) {
                distance
            } else {
                distance.rem_euclid(length)
            }
        } else {
            distance.clamp(0.0, length)
        }
    }

    /// Returns the input key at `distance` along the spline.
    ///
    /// Distances wrap on closed loops and clamp otherwise. With
    /// [`ReparamMethod::Refined`] the reparam table gives the segment and a
    /// starting fraction, which Newton–Raphson then refines.
    #[must_use]
    pub fn input_key_at_distance(&self, distance: f64) -> f64 {
        let position = self.curves.position();
        let Some((first_key, end_key)) = position.key_range() else {
            return 0.0;
        };
        let table = self.curves.reparam_table();
        if table.is_empty() || self.num_segments() == 0 {
            return first_key;
        }
        let distance = self.normalize_distance(distance);
        match self.settings.policy.reparam {
            ReparamMethod::Table => table.input_key_at_distance(distance),
            ReparamMethod::Refined => {
                if distance >= self.spline_length() {
                    return end_key;
                }
                let steps = table.steps_per_segment();
                let lower = table
                    .samples()
                    .partition_point(|p| p.key < distance)
                    .saturating_sub(1);
                let index = (lower / steps).min(self.num_segments() - 1);
                let Some(segment) = position.segment(index) else {
                    return first_key;
                };
                let scale3d = table.scale3d();
                let start = table.distance_at_segment_start(index);
                let estimate = if segment.span > 0.0 {
                    (table.input_key_at_distance(distance) - segment.start_key) / segment.span
                } else {
                    0.0
                };
                let t = self.curves.refine_segment_param(
                    index,
                    distance - start,
                    estimate,
                    scale3d,
                    self.settings.policy.newton_iterations,
                );
                segment.start_key + t * segment.span
            }
        }
    }

    /// Returns the distance along the spline at `input_key`.
    ///
    /// With [`ReparamMethod::Refined`] the distance within the segment is
    /// integrated directly rather than read from the table.
    #[must_use]
    pub fn distance_at_input_key(&self, input_key: f64) -> f64 {
        let table = self.curves.reparam_table();
        match self.settings.policy.reparam {
            ReparamMethod::Table => {
                table.distance_at_input_key(self.curves.position().normalize_key(input_key))
            }
            ReparamMethod::Refined => {
                let Some((index, fraction)) = self.curves.position().segment_and_fraction(input_key)
                else {
                    return 0.0;
                };
                if table.is_empty() {
                    return 0.0;
                }
                table.distance_at_segment_start(index)
                    + self
                        .curves
                        .segment_length(index, fraction, table.scale3d())
            }
        }
    }

    /// Returns the location at `distance` along the spline.
    #[must_use]
    pub fn location_at_distance(&self, distance: f64) -> Point3 {
        self.location_at_input_key(self.input_key_at_distance(distance))
    }

    /// Returns the position derivative with respect to input key at `distance`.
    #[must_use]
    pub fn tangent_at_distance(&self, distance: f64) -> Vector3 {
        self.tangent_at_input_key(self.input_key_at_distance(distance))
    }

    /// Returns the unit tangent at `distance`.
    #[must_use]
    pub fn direction_at_distance(&self, distance: f64) -> Vector3 {
        self.direction_at_input_key(self.input_key_at_distance(distance))
    }

    /// Returns the normalized rotation track value at `distance`.
    #[must_use]
    pub fn rotation_track_at_distance(&self, distance: f64) -> UnitQuaternion {
        self.rotation_track_at_input_key(self.input_key_at_distance(distance))
    }

    /// Returns the frame rotation at `distance`.
    #[must_use]
    pub fn quaternion_at_distance(&self, distance: f64) -> UnitQuaternion {
        self.quaternion_at_input_key(self.input_key_at_distance(distance))
    }

    /// Returns the up vector at `distance`.
    #[must_use]
    pub fn up_vector_at_distance(&self, distance: f64) -> Vector3 {
        self.up_vector_at_input_key(self.input_key_at_distance(distance))
    }

    /// Returns the right vector at `distance`.
    #[must_use]
    pub fn right_vector_at_distance(&self, distance: f64) -> Vector3 {
        self.right_vector_at_input_key(self.input_key_at_distance(distance))
    }

    /// Returns the scale at `distance`.
    #[must_use]
    pub fn scale_at_distance(&self, distance: f64) -> Vector3 {
        self.scale_at_input_key(self.input_key_at_distance(distance))
    }

    /// Returns the full frame at `distance`.
    #[must_use]
    pub fn transform_at_distance(&self, distance: f64) -> SplineTransform {
        self.transform_at_input_key(self.input_key_at_distance(distance))
    }
}
