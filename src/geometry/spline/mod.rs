mod reparam;
mod segment_length;

pub use reparam::ReparamTable;

use tracing::debug;

use crate::error::{CurveError, Result};
use crate::math::{Quaternion, Vector3, TOLERANCE};

use super::curve::InterpCurve;

/// Options applied by [`SplineCurves::update_spline`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplineUpdate {
    /// Whether the last point connects back to the first.
    pub closed_loop: bool,
    /// Explicit key of the virtual loop-closing knot. `None` uses last key + 1.
    pub loop_key: Option<f64>,
    /// Forces zero tangents at the ends of an open spline.
    pub stationary_endpoints: bool,
    /// Tension for auto tangents, `0` gives Catmull-Rom.
    pub tension: f64,
    /// Number of reparam samples per segment.
    pub reparam_steps_per_segment: usize,
    /// Non-uniform scale applied to arc length computations.
    pub scale3d: Vector3,
}

impl Default for SplineUpdate {
    fn default() -> Self {
        Self {
            closed_loop: false,
            loop_key: None,
            stationary_endpoints: false,
            tension: 0.0,
            reparam_steps_per_segment: 10,
            scale3d: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// The three tracks of a spline plus its distance lookup table.
///
/// Position, rotation and scale share the same keys and length. The reparam
/// table is derived data: it is only valid after [`SplineCurves::update_spline`]
/// has run following the latest edit.
#[derive(Debug, Clone, Default)]
pub struct SplineCurves {
    position: InterpCurve<Vector3>,
    rotation: InterpCurve<Quaternion>,
    scale: InterpCurve<Vector3>,
    reparam_table: ReparamTable,
    version: u32,
}

impl SplineCurves {
    /// Creates an empty set of tracks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set of tracks, validating that they agree on length and keys.
    ///
    /// The reparam table is empty until [`Self::update_spline`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::TrackLengthMismatch`] or [`CurveError::TrackKeyMismatch`].
    pub fn from_tracks(
        position: InterpCurve<Vector3>,
        rotation: InterpCurve<Quaternion>,
        scale: InterpCurve<Vector3>,
    ) -> Result<Self> {
        if position.len() != rotation.len() || position.len() != scale.len() {
            return Err(CurveError::TrackLengthMismatch {
                position: position.len(),
                rotation: rotation.len(),
                scale: scale.len(),
            }
            .into());
        }
        let keys = position.points().iter().map(|p| p.key);
        let rotation_keys = rotation.points().iter().map(|p| p.key);
        let scale_keys = scale.points().iter().map(|p| p.key);
        for (index, ((k, r), s)) in keys.zip(rotation_keys).zip(scale_keys).enumerate() {
            if (k - r).abs() > TOLERANCE || (k - s).abs() > TOLERANCE {
                return Err(CurveError::TrackKeyMismatch { index }.into());
            }
        }
        Ok(Self {
            position,
            rotation,
            scale,
            ..Self::default()
        })
    }

    /// Returns the position track.
    #[must_use]
    pub fn position(&self) -> &InterpCurve<Vector3> {
        &self.position
    }

    /// Returns the rotation track. Values are quaternions that are unit length
    /// at the knots but not in between.
    #[must_use]
    pub fn rotation(&self) -> &InterpCurve<Quaternion> {
        &self.rotation
    }

    /// Returns the scale track.
    #[must_use]
    pub fn scale(&self) -> &InterpCurve<Vector3> {
        &self.scale
    }

    /// Returns mutable access to all three tracks at once.
    ///
    /// Edits must keep the tracks aligned, and bump the version.
    pub(crate) fn tracks_mut(
        &mut self,
    ) -> (
        &mut InterpCurve<Vector3>,
        &mut InterpCurve<Quaternion>,
        &mut InterpCurve<Vector3>,
    ) {
        self.version = self.version.wrapping_add(1);
        (&mut self.position, &mut self.rotation, &mut self.scale)
    }

    /// Returns the distance lookup table built by the last update.
    #[must_use]
    pub fn reparam_table(&self) -> &ReparamTable {
        &self.reparam_table
    }

    /// Returns the edit counter, bumped by every structural change and rebuild.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the number of knots.
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.position.len()
    }

    /// Returns the number of segments, counting the loop-closing one.
    #[must_use]
    pub fn num_segments(&self) -> usize {
        self.position.num_segments()
    }

    /// Returns the scaled arc length measured by the last update.
    #[must_use]
    pub fn spline_length(&self) -> f64 {
        self.reparam_table.total_length()
    }

    /// Applies the loop setting, regenerates auto tangents on all tracks and
    /// rebuilds the reparam table.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::InvalidLoopKey`](crate::error::EditError::InvalidLoopKey)
    /// if an explicit loop key does not lie after the last knot.
    pub fn update_spline(&mut self, update: &SplineUpdate) -> Result<()> {
        match self.position.points().last().map(|p| p.key) {
            Some(last_key) if update.closed_loop => {
                let loop_key = update.loop_key.unwrap_or(last_key + 1.0);
                self.position.set_loop_key(loop_key)?;
                self.rotation.set_loop_key(loop_key)?;
                self.scale.set_loop_key(loop_key)?;
            }
            _ => {
                self.position.clear_loop_key();
                self.rotation.clear_loop_key();
                self.scale.clear_loop_key();
            }
        }

        self.position
            .auto_set_tangents(update.tension, update.stationary_endpoints);
        self.rotation
            .auto_set_tangents(update.tension, update.stationary_endpoints);
        self.scale
            .auto_set_tangents(update.tension, update.stationary_endpoints);

        self.reparam_table =
            ReparamTable::build(self, update.reparam_steps_per_segment, update.scale3d);
        self.version = self.version.wrapping_add(1);

        debug!(
            points = self.num_points(),
            segments = self.num_segments(),
            steps = self.reparam_table.steps_per_segment(),
            length = self.spline_length(),
            version = self.version,
            "rebuilt spline reparam table"
        );
        Ok(())
    }
}
