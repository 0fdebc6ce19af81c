mod arc_length;
mod sample;
mod settings;
mod time;

pub use sample::SplineTransform;
pub use settings::{EvaluationPolicy, ReparamMethod, SplineSettings};

use nalgebra::Unit;

use crate::error::{EditError, Result};
use crate::geometry::curve::{InterpCurve, InterpMode, InterpPoint};
use crate::geometry::spline::SplineCurves;
use crate::math::{Point3, Quaternion, UnitQuaternion, Vector3, SMALL_NUMBER};

/// One control point of a [`Spline`], across all three tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplinePoint {
    /// Input key of the point.
    pub input_key: f64,
    /// Location.
    pub position: Point3,
    /// Incoming position tangent, per unit of input key.
    pub arrive_tangent: Vector3,
    /// Outgoing position tangent, per unit of input key.
    pub leave_tangent: Vector3,
    /// Orientation.
    pub rotation: UnitQuaternion,
    /// Scale.
    pub scale: Vector3,
    /// Interpolation mode. Applied to all three tracks on insertion and by
    /// [`Spline::set_point_type`]; reported from the position track.
    pub mode: InterpMode,
}

impl SplinePoint {
    /// Creates an auto-tangent point with identity rotation and unit scale.
    #[must_use]
    pub fn new(input_key: f64, position: Point3) -> Self {
        Self {
            input_key,
            position,
            arrive_tangent: Vector3::zeros(),
            leave_tangent: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            mode: InterpMode::HermiteAuto,
        }
    }

    /// Sets the interpolation mode.
    #[must_use]
    pub fn with_mode(mut self, mode: InterpMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets user tangents and switches the point to [`InterpMode::HermiteUser`].
    #[must_use]
    pub fn with_tangents(mut self, arrive: Vector3, leave: Vector3) -> Self {
        self.arrive_tangent = arrive;
        self.leave_tangent = leave;
        self.mode = InterpMode::HermiteUser;
        self
    }

    /// Sets the rotation.
    #[must_use]
    pub fn with_rotation(mut self, rotation: UnitQuaternion) -> Self {
        self.rotation = rotation;
        self
    }

    /// Sets the scale.
    #[must_use]
    pub fn with_scale(mut self, scale: Vector3) -> Self {
        self.scale = scale;
        self
    }

    fn position_knot(&self) -> InterpPoint<Vector3> {
        InterpPoint::with_tangents(
            self.input_key,
            self.position.coords,
            self.arrive_tangent,
            self.leave_tangent,
            self.mode,
        )
    }

    fn rotation_knot(&self) -> InterpPoint<Quaternion> {
        InterpPoint::new(
            self.input_key,
            *self.rotation.quaternion(),
            Quaternion::new(0.0, 0.0, 0.0, 0.0),
            self.mode,
        )
    }

    fn scale_knot(&self) -> InterpPoint<Vector3> {
        InterpPoint::new(self.input_key, self.scale, Vector3::zeros(), self.mode)
    }
}

/// A spline through control points that can be sampled by input key, by
/// distance along the curve, or by time.
///
/// Edits only mark the spline as stale; call [`Spline::update_spline`] once
/// after a batch of edits to regenerate auto tangents and the distance table.
/// Distance-based queries on a stale spline use the previous table.
#[derive(Debug, Clone)]
pub struct Spline {
    curves: SplineCurves,
    settings: SplineSettings,
    needs_update: bool,
}

impl Default for Spline {
    /// Two points 100 units apart along X.
    fn default() -> Self {
        let mut spline = Self::empty(SplineSettings::default());
        for (key, x) in [(0.0, 0.0), (1.0, 100.0)] {
            spline.push_knots(&SplinePoint::new(key, Point3::new(x, 0.0, 0.0)));
        }
        spline.rebuild_unchecked();
        spline
    }
}

impl Spline {
    /// Creates the default two-point spline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a spline with no points.
    #[must_use]
    pub fn empty(settings: SplineSettings) -> Self {
        let mut spline = Self {
            curves: SplineCurves::new(),
            settings,
            needs_update: false,
        };
        spline.rebuild_unchecked();
        spline
    }

    /// Creates an updated spline from points sorted by strictly increasing key.
    ///
    /// # Errors
    ///
    /// Returns a [`CurveError`](crate::error::CurveError) if keys are not strictly
    /// increasing or values are not finite, or an
    /// [`EditError::InvalidLoopKey`] for a bad loop key override.
    pub fn from_points(points: &[SplinePoint], settings: SplineSettings) -> Result<Self> {
        let position =
            InterpCurve::from_points(points.iter().map(SplinePoint::position_knot).collect())?;
        let rotation =
            InterpCurve::from_points(points.iter().map(SplinePoint::rotation_knot).collect())?;
        let scale =
            InterpCurve::from_points(points.iter().map(SplinePoint::scale_knot).collect())?;
        let mut spline = Self {
            curves: SplineCurves::from_tracks(position, rotation, scale)?,
            settings,
            needs_update: true,
        };
        spline.update_spline()?;
        Ok(spline)
    }

    /// Creates an updated spline through `positions` with keys `0, 1, 2, ...`.
    ///
    /// # Errors
    ///
    /// Returns an error if a position is not finite.
    pub fn from_positions(positions: &[Point3], settings: SplineSettings) -> Result<Self> {
        let points: Vec<SplinePoint> = positions
            .iter()
            .zip(0_u32..)
            .map(|(p, key)| SplinePoint::new(f64::from(key), *p))
            .collect();
        Self::from_points(&points, settings)
    }

    /// Returns the underlying tracks and reparam table.
    #[must_use]
    pub fn curves(&self) -> &SplineCurves {
        &self.curves
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &SplineSettings {
        &self.settings
    }

    /// Returns the edit counter of the tracks.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.curves.version()
    }

    /// Returns `true` if an edit happened since the last [`Self::update_spline`].
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Regenerates auto tangents and rebuilds the reparam table.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::InvalidLoopKey`] if the loop key override does not
    /// lie after the last point's key.
    pub fn update_spline(&mut self) -> Result<()> {
        self.curves.update_spline(&self.settings.update_options())?;
        self.needs_update = false;
        Ok(())
    }

    /// Rebuild for internally constructed splines, whose loop settings cannot be invalid.
    fn rebuild_unchecked(&mut self) {
        let mut options = self.settings.update_options();
        options.loop_key = None;
        if self.curves.update_spline(&options).is_ok() {
            self.needs_update = false;
        }
    }

    /// Returns the settings for modification and marks the spline stale.
    pub fn settings_mut(&mut self) -> &mut SplineSettings {
        self.needs_update = true;
        &mut self.settings
    }

    /// Opens or closes the loop.
    pub fn set_closed_loop(&mut self, closed_loop: bool) {
        self.settings_mut().closed_loop = closed_loop;
    }

    /// Returns whether the spline is a closed loop.
    #[must_use]
    pub fn is_closed_loop(&self) -> bool {
        self.settings.closed_loop
    }

    /// Sets (or clears) the explicit input key of the loop-closing point.
    pub fn set_loop_key(&mut self, loop_key: Option<f64>) {
        self.settings_mut().loop_key = loop_key;
    }

    /// Sets the reparam table density.
    pub fn set_reparam_steps_per_segment(&mut self, steps: usize) {
        self.settings_mut().reparam_steps_per_segment = steps.max(1);
    }

    /// Sets the owner's non-uniform scale used for arc length.
    pub fn set_scale3d(&mut self, scale3d: Vector3) {
        self.settings_mut().scale3d = scale3d;
    }

    /// Sets whether open ends get zero tangents.
    pub fn set_stationary_endpoints(&mut self, stationary: bool) {
        self.settings_mut().stationary_endpoints = stationary;
    }

    /// Sets the duration used by time-based queries. Does not require an update.
    pub fn set_duration(&mut self, duration: f64) {
        self.settings.duration = duration;
    }

    /// Sets the evaluation policy. Does not require an update.
    pub fn set_policy(&mut self, policy: EvaluationPolicy) {
        self.settings.policy = policy;
    }

    /// Returns the number of control points.
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.curves.num_points()
    }

    /// Returns the number of segments, counting the loop-closing one.
    #[must_use]
    pub fn num_segments(&self) -> usize {
        self.curves.num_segments()
    }

    fn check_point_index(&self, index: usize) -> Result<()> {
        if index < self.num_points() {
            Ok(())
        } else {
            Err(EditError::PointIndexOutOfRange {
                index,
                len: self.num_points(),
            }
            .into())
        }
    }

    /// Returns all track data of point `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`] if `index` is invalid.
    pub fn spline_point(&self, index: usize) -> Result<SplinePoint> {
        self.check_point_index(index)?;
        let p = self.curves.position().points()[index];
        let r = self.curves.rotation().points()[index];
        let s = self.curves.scale().points()[index];
        Ok(SplinePoint {
            input_key: p.key,
            position: Point3::from(p.value),
            arrive_tangent: p.arrive_tangent,
            leave_tangent: p.leave_tangent,
            rotation: UnitQuaternion::try_new(r.value, SMALL_NUMBER)
                .unwrap_or_else(UnitQuaternion::identity),
            scale: s.value,
            mode: p.mode,
        })
    }

    fn push_knots(&mut self, point: &SplinePoint) {
        let (position, rotation, scale) = self.curves.tracks_mut();
        position.push_point(point.position_knot());
        rotation.push_point(point.rotation_knot());
        scale.push_point(point.scale_knot());
        self.needs_update = true;
    }

    fn insert_knots(&mut self, index: usize, point: &SplinePoint) {
        let (position, rotation, scale) = self.curves.tracks_mut();
        position.insert_point(index, point.position_knot());
        rotation.insert_point(index, point.rotation_knot());
        scale.insert_point(index, point.scale_knot());
        self.needs_update = true;
    }

    /// Appends a point at key `last + 1` (or `0` for an empty spline).
    /// Returns its index.
    pub fn add_point(&mut self, position: Point3) -> usize {
        let key = self
            .curves
            .position()
            .points()
            .last()
            .map_or(0.0, |p| p.key + 1.0);
        self.push_knots(&SplinePoint::new(key, position));
        self.num_points() - 1
    }

    /// Inserts `point` in key order, after any point with an equal key.
    /// Returns its index.
    pub fn add_spline_point(&mut self, point: SplinePoint) -> usize {
        let index = self
            .curves
            .position()
            .point_index_for_key(point.input_key)
            .map_or(0, |i| i + 1);
        self.insert_knots(index, &point);
        index
    }

    /// Inserts a point before point `index` (or appends when `index` equals the
    /// point count). The new point takes the key of the point it displaces and
    /// every later key moves up by one.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`] if `index > num_points()`.
    pub fn insert_point(&mut self, index: usize, position: Point3) -> Result<()> {
        let n = self.num_points();
        if index == n {
            self.add_point(position);
            return Ok(());
        }
        self.check_point_index(index)?;

        let key = self.curves.position().points()[index].key;
        self.shift_keys_from(index, 1.0);
        self.insert_knots(index, &SplinePoint::new(key, position));
        Ok(())
    }

    /// Removes point `index`. Later keys move down by the removed point's
    /// outgoing key span, so integer keys stay consecutive.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`] if `index` is invalid.
    pub fn remove_point(&mut self, index: usize) -> Result<()> {
        self.check_point_index(index)?;
        let keys = self.curves.position().points();
        let shift = keys
            .get(index + 1)
            .map_or(0.0, |next| next.key - keys[index].key);

        let (position, rotation, scale) = self.curves.tracks_mut();
        position.delete_point(index)?;
        rotation.delete_point(index)?;
        scale.delete_point(index)?;
        self.shift_keys_from(index, -shift);
        self.needs_update = true;
        Ok(())
    }

    fn shift_keys_from(&mut self, index: usize, delta: f64) {
        let (position, rotation, scale) = self.curves.tracks_mut();
        for p in position.points_mut().iter_mut().skip(index) {
            p.key += delta;
        }
        for p in rotation.points_mut().iter_mut().skip(index) {
            p.key += delta;
        }
        for p in scale.points_mut().iter_mut().skip(index) {
            p.key += delta;
        }
    }

    /// Removes every point.
    pub fn clear_points(&mut self) {
        let (position, rotation, scale) = self.curves.tracks_mut();
        position.reset();
        rotation.reset();
        scale.reset();
        self.needs_update = true;
    }

    /// Replaces all points with auto-tangent points at keys `0, 1, 2, ...`.
    pub fn set_points(&mut self, positions: &[Point3]) {
        self.clear_points();
        for &position in positions {
            self.add_point(position);
        }
    }

    /// Moves point `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`] if `index` is invalid.
    pub fn set_location_at_point(&mut self, index: usize, location: Point3) -> Result<()> {
        self.check_point_index(index)?;
        let (position, _, _) = self.curves.tracks_mut();
        position.points_mut()[index].value = location.coords;
        self.needs_update = true;
        Ok(())
    }

    /// Sets both tangents of point `index` and switches it to user tangents.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`] if `index` is invalid.
    pub fn set_tangent_at_point(&mut self, index: usize, tangent: Vector3) -> Result<()> {
        self.set_tangents_at_point(index, tangent, tangent)
    }

    /// Sets the arrive and leave tangents of point `index` and switches its
    /// position knot to user tangents. Rotation and scale keep their modes.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`] if `index` is invalid.
    pub fn set_tangents_at_point(
        &mut self,
        index: usize,
        arrive: Vector3,
        leave: Vector3,
    ) -> Result<()> {
        self.check_point_index(index)?;
        let (position, _, _) = self.curves.tracks_mut();
        let knot = &mut position.points_mut()[index];
        knot.arrive_tangent = arrive;
        knot.leave_tangent = leave;
        knot.mode = InterpMode::HermiteUser;
        self.needs_update = true;
        Ok(())
    }

    /// Sets the rotation of point `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`] if `index` is invalid.
    pub fn set_rotation_at_point(&mut self, index: usize, rotation: UnitQuaternion) -> Result<()> {
        self.check_point_index(index)?;
        let (_, track, _) = self.curves.tracks_mut();
        track.points_mut()[index].value = *rotation.quaternion();
        self.needs_update = true;
        Ok(())
    }

    /// Rotates point `index` so that the default up vector maps onto `up`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`] if `index` is invalid.
    pub fn set_up_vector_at_point(&mut self, index: usize, up: Vector3) -> Result<()> {
        let from = self.settings.default_up_vector;
        let rotation = UnitQuaternion::rotation_between(&from, &up).unwrap_or_else(|| {
            // Opposite vectors: half turn about any axis perpendicular to `from`.
            let axis = from
                .cross(&Vector3::x())
                .try_normalize(SMALL_NUMBER)
                .or_else(|| from.cross(&Vector3::y()).try_normalize(SMALL_NUMBER))
                .unwrap_or_else(Vector3::z);
            UnitQuaternion::from_axis_angle(&Unit::new_unchecked(axis), std::f64::consts::PI)
        });
        self.set_rotation_at_point(index, rotation)
    }

    /// Sets the scale of point `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`] if `index` is invalid.
    pub fn set_scale_at_point(&mut self, index: usize, value: Vector3) -> Result<()> {
        self.check_point_index(index)?;
        let (_, _, scale) = self.curves.tracks_mut();
        scale.points_mut()[index].value = value;
        self.needs_update = true;
        Ok(())
    }

    /// Sets the interpolation mode of point `index` on all three tracks.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`] if `index` is invalid.
    pub fn set_point_type(&mut self, index: usize, mode: InterpMode) -> Result<()> {
        self.check_point_index(index)?;
        let (position, rotation, scale) = self.curves.tracks_mut();
        position.points_mut()[index].mode = mode;
        rotation.points_mut()[index].mode = mode;
        scale.points_mut()[index].mode = mode;
        self.needs_update = true;
        Ok(())
    }
}
