use crate::error::{CurveError, EditError, Result};
use crate::math::hermite::{
    cubic_interp, cubic_interp_derivative, cubic_interp_second_derivative,
};
use crate::math::{Vector3, TOLERANCE};

use super::value::compute_curve_tangent;
use super::{CurveValue, InterpMode, InterpPoint};

/// A piecewise curve through knots with strictly increasing keys.
///
/// When looped, the curve continues past the last knot with one more segment
/// of key span `loop_key_offset` that ends on the first knot's value. That
/// closing knot is virtual and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpCurve<T> {
    points: Vec<InterpPoint<T>>,
    is_looped: bool,
    loop_key_offset: f64,
}

impl<T> Default for InterpCurve<T> {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            is_looped: false,
            loop_key_offset: 0.0,
        }
    }
}

/// Hermite control data for one segment, with tangents already scaled by the
/// segment's key span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSegment<T> {
    /// Key of the segment's start knot.
    pub start_key: f64,
    /// Key span of the segment.
    pub span: f64,
    /// Start value.
    pub p0: T,
    /// Start tangent, per unit of normalized parameter.
    pub t0: T,
    /// End value.
    pub p1: T,
    /// End tangent, per unit of normalized parameter.
    pub t1: T,
    /// Interpolation mode of the start knot.
    pub mode: InterpMode,
}

/// Bracketing segment for a key: knot indices, key span and local alpha.
#[derive(Debug, Clone, Copy)]
struct Bracket {
    index: usize,
    next: usize,
    span: f64,
    alpha: f64,
}

impl<T: CurveValue> InterpCurve<T> {
    /// Creates an empty, open curve.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a curve from knots, validating that keys strictly increase and
    /// values are finite.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::NonIncreasingKeys`] or [`CurveError::NonFiniteValue`].
    pub fn from_points(points: Vec<InterpPoint<T>>) -> Result<Self> {
        for (index, point) in points.iter().enumerate() {
            if !point.key.is_finite() || !point.value.is_finite_value() {
                return Err(CurveError::NonFiniteValue { index }.into());
            }
        }
        for (index, pair) in points.windows(2).enumerate() {
            if pair[1].key <= pair[0].key {
                return Err(CurveError::NonIncreasingKeys {
                    index: index + 1,
                    previous: pair[0].key,
                    key: pair[1].key,
                }
                .into());
            }
        }
        Ok(Self {
            points,
            ..Self::default()
        })
    }

    /// Returns the knots.
    #[must_use]
    pub fn points(&self) -> &[InterpPoint<T>] {
        &self.points
    }

    /// Returns mutable access to the knots.
    ///
    /// Callers must keep keys strictly increasing.
    pub fn points_mut(&mut self) -> &mut [InterpPoint<T>] {
        &mut self.points
    }

    /// Returns the number of knots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the curve has no knots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns whether the curve wraps back to its first knot.
    #[must_use]
    pub fn is_looped(&self) -> bool {
        self.is_looped
    }

    /// Returns the key span of the loop-closing segment.
    #[must_use]
    pub fn loop_key_offset(&self) -> f64 {
        self.loop_key_offset
    }

    /// Returns the number of segments, counting the loop-closing one.
    #[must_use]
    pub fn num_segments(&self) -> usize {
        match self.points.len() {
            0 | 1 => 0,
            n if self.is_looped => n,
            n => n - 1,
        }
    }

    /// Returns the key range `[first, end]` covered by the curve, where `end`
    /// includes the loop offset on looped curves.
    #[must_use]
    pub fn key_range(&self) -> Option<(f64, f64)> {
        let first = self.points.first()?.key;
        let last = self.points.last()?.key;
        if self.is_looped {
            Some((first, last + self.loop_key_offset))
        } else {
            Some((first, last))
        }
    }

    /// Closes the curve with a virtual knot at `loop_key`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::InvalidLoopKey`] if `loop_key` does not lie after the
    /// last knot. An empty curve is left open.
    pub fn set_loop_key(&mut self, loop_key: f64) -> Result<()> {
        let Some(last) = self.points.last() else {
            self.clear_loop_key();
            return Ok(());
        };
        let offset = loop_key - last.key;
        if !offset.is_finite() || offset <= 0.0 {
            return Err(EditError::InvalidLoopKey {
                key: loop_key,
                last: last.key,
            }
            .into());
        }
        self.is_looped = true;
        self.loop_key_offset = offset;
        Ok(())
    }

    /// Opens the curve.
    pub fn clear_loop_key(&mut self) {
        self.is_looped = false;
        self.loop_key_offset = 0.0;
    }

    /// Removes all knots and opens the curve.
    pub fn reset(&mut self) {
        self.points.clear();
        self.clear_loop_key();
    }

    /// Inserts a knot at `key`, keeping knots sorted. Returns its index.
    ///
    /// A knot whose key equals an existing one is inserted after it; keeping
    /// keys distinct is up to the caller.
    pub fn add_point(&mut self, key: f64, value: T) -> usize {
        let index = self.points.partition_point(|p| p.key <= key);
        debug_assert!(
            index == 0 || (self.points[index - 1].key - key).abs() > TOLERANCE,
            "duplicate key {key}"
        );
        self.points
            .insert(index, InterpPoint::new(key, value, T::zero(), InterpMode::HermiteAuto));
        index
    }

    /// Appends a knot without any ordering checks.
    pub(crate) fn push_point(&mut self, point: InterpPoint<T>) {
        self.points.push(point);
    }

    /// Inserts a prepared knot at `index`.
    pub(crate) fn insert_point(&mut self, index: usize, point: InterpPoint<T>) {
        self.points.insert(index, point);
    }

    /// Reserves room for `additional` knots.
    pub(crate) fn reserve(&mut self, additional: usize) {
        self.points.reserve(additional);
    }

    /// Removes the knot at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`] if `index` is invalid.
    pub fn delete_point(&mut self, index: usize) -> Result<InterpPoint<T>> {
        if index >= self.points.len() {
            return Err(EditError::PointIndexOutOfRange {
                index,
                len: self.points.len(),
            }
            .into());
        }
        Ok(self.points.remove(index))
    }

    /// Changes the key of the knot at `index`, re-sorting it. Returns the new index.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PointIndexOutOfRange`] if `index` is invalid.
    pub fn move_point(&mut self, index: usize, new_key: f64) -> Result<usize> {
        let mut point = self.delete_point(index)?;
        point.key = new_key;
        let new_index = self.points.partition_point(|p| p.key <= new_key);
        self.points.insert(new_index, point);
        Ok(new_index)
    }

    /// Returns the index of the last knot whose key is `<= key`, or `None`
    /// when `key` precedes the first knot.
    #[must_use]
    pub fn point_index_for_key(&self, key: f64) -> Option<usize> {
        self.points
            .partition_point(|p| p.key <= key)
            .checked_sub(1)
    }

    /// Maps `key` into the curve's domain: wraps on looped curves, clamps otherwise.
    #[must_use]
    pub fn normalize_key(&self, key: f64) -> f64 {
        let Some((first, end)) = self.key_range() else {
            return key;
        };
        let period = end - first;
        if self.is_looped && period > 0.0 {
            if key < first || key >= end {
                first + (key - first).rem_euclid(period)
            } else {
                key
            }
        } else {
            key.clamp(first, end)
        }
    }

    /// Finds the segment used to evaluate `key` (after normalization).
    ///
    /// A key equal to the end of an open curve resolves to the last segment at
    /// `alpha = 1`, so derivatives stay defined there.
    fn bracket(&self, key: f64) -> Option<Bracket> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        let key = self.normalize_key(key);
        let last = n - 1;
        let index = self.point_index_for_key(key).unwrap_or(0);
        let (index, next, span) = if index == last {
            if self.is_looped {
                (last, 0, self.loop_key_offset)
            } else {
                (last - 1, last, self.points[last].key - self.points[last - 1].key)
            }
        } else {
            (index, index + 1, self.points[index + 1].key - self.points[index].key)
        };
        let alpha = if span > 0.0 {
            ((key - self.points[index].key) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Some(Bracket {
            index,
            next,
            span,
            alpha,
        })
    }

    /// Returns `(p0, t0, p1, t1)` for segment `index -> next`, with tangents
    /// scaled by the key span.
    ///
    /// The end knot's value and arrive tangent flip together when the value
    /// lies on the opposite cover from `p0`.
    fn segment_controls(&self, index: usize, next: usize, span: f64) -> (T, T, T, T) {
        let start = &self.points[index];
        let end = &self.points[next];
        let p0 = start.value;
        let sign = end.value.cover_sign(&p0);
        (
            p0,
            start.leave_tangent * span,
            end.value * sign,
            end.arrive_tangent * (sign * span),
        )
    }

    /// Returns the control data of segment `index`, including the loop-closing
    /// segment of a looped curve.
    #[must_use]
    pub fn segment(&self, index: usize) -> Option<CurveSegment<T>> {
        if index >= self.num_segments() {
            return None;
        }
        let last = self.points.len() - 1;
        let (next, span) = if index == last {
            (0, self.loop_key_offset)
        } else {
            (index + 1, self.points[index + 1].key - self.points[index].key)
        };
        let (p0, t0, p1, t1) = self.segment_controls(index, next, span);
        Some(CurveSegment {
            start_key: self.points[index].key,
            span,
            p0,
            t0,
            p1,
            t1,
            mode: self.points[index].mode,
        })
    }

    /// Splits `key` into a segment index and the fraction through that segment.
    ///
    /// Keys are normalized first. The end of an open curve maps to the last
    /// segment at fraction `1`.
    #[must_use]
    pub fn segment_and_fraction(&self, key: f64) -> Option<(usize, f64)> {
        self.bracket(key).map(|b| (b.index, b.alpha))
    }

    /// Evaluates the curve at `key`, returning `default` if there are no knots.
    #[must_use]
    pub fn eval(&self, key: f64, default: T) -> T {
        match self.points.len() {
            0 => return default,
            1 => return self.points[0].value,
            _ => {}
        }
        let Some(b) = self.bracket(key) else {
            return default;
        };
        self.eval_segment(b.index, b.next, b.span, b.alpha)
    }

    fn eval_segment(&self, index: usize, next: usize, span: f64, alpha: f64) -> T {
        let start = &self.points[index];
        if span <= 0.0 {
            return start.value;
        }
        let (p0, t0, p1, t1) = self.segment_controls(index, next, span);
        match start.mode {
            InterpMode::Constant => {
                if alpha < 1.0 {
                    p0
                } else {
                    p1
                }
            }
            InterpMode::Linear => p0 + (p1 - p0) * alpha,
            InterpMode::HermiteAuto | InterpMode::HermiteUser | InterpMode::HermiteAutoClamped => {
                cubic_interp(p0, t0, p1, t1, alpha)
            }
        }
    }

    /// Evaluates the derivative with respect to key at `key`.
    ///
    /// Constant segments and curves with fewer than two knots return zero.
    #[must_use]
    pub fn eval_derivative(&self, key: f64) -> T {
        let Some(b) = self.bracket(key) else {
            return T::zero();
        };
        if b.span <= 0.0 {
            return T::zero();
        }
        let (p0, t0, p1, t1) = self.segment_controls(b.index, b.next, b.span);
        match self.points[b.index].mode {
            InterpMode::Constant => T::zero(),
            InterpMode::Linear => (p1 - p0) * (1.0 / b.span),
            InterpMode::HermiteAuto | InterpMode::HermiteUser | InterpMode::HermiteAutoClamped => {
                cubic_interp_derivative(p0, t0, p1, t1, b.alpha) * (1.0 / b.span)
            }
        }
    }

    /// Evaluates the second derivative with respect to key at `key`.
    #[must_use]
    pub fn eval_second_derivative(&self, key: f64) -> T {
        let Some(b) = self.bracket(key) else {
            return T::zero();
        };
        if b.span <= 0.0 || !self.points[b.index].mode.is_hermite() {
            return T::zero();
        }
        let (p0, t0, p1, t1) = self.segment_controls(b.index, b.next, b.span);
        cubic_interp_second_derivative(p0, t0, p1, t1, b.alpha) * (1.0 / (b.span * b.span))
    }

    /// Recomputes tangents for every knot whose mode calls for it.
    ///
    /// Auto modes get Catmull-Rom tangents (scaled by `1 - tension`); clamped
    /// auto also flattens at local extrema. Linear knots get the slope of
    /// their outgoing segment and constant knots get zero. With
    /// `stationary_endpoints`, the ends of an open curve get zero tangents.
    pub fn auto_set_tangents(&mut self, tension: f64, stationary_endpoints: bool) {
        let n = self.points.len();
        if n == 0 {
            return;
        }
        let last = n - 1;
        let looped = self.is_looped;
        let loop_offset = self.loop_key_offset;

        for i in 0..n {
            let prev_index = if i == 0 && looped { last } else { i.saturating_sub(1) };
            let next_index = if i == last && looped { 0 } else { (i + 1).min(last) };

            let this = self.points[i];
            let prev = self.points[prev_index];
            let next = self.points[next_index];

            let prev_key = if looped && i == 0 {
                this.key - loop_offset
            } else {
                prev.key
            };
            let next_key = if looped && i == last {
                this.key + loop_offset
            } else {
                next.key
            };
            let is_endpoint = !looped && (i == 0 || i == last);

            let point = &mut self.points[i];
            match this.mode {
                mode if mode.is_auto_tangent() => {
                    let tangent = if stationary_endpoints && is_endpoint {
                        T::zero()
                    } else if prev.mode.is_hermite() || prev_index == i {
                        compute_curve_tangent(
                            (prev_key, prev.value),
                            (this.key, this.value),
                            (next_key, next.value),
                            tension,
                            this.mode == InterpMode::HermiteAutoClamped,
                        )
                    } else {
                        // Continue the incoming straight segment without a kink.
                        slope(prev_key, prev.value.align_to(&this.value), this.key, this.value)
                    };
                    point.arrive_tangent = tangent;
                    point.leave_tangent = tangent;
                }
                InterpMode::Linear => {
                    if next_index != i {
                        point.leave_tangent = slope(this.key, this.value, next_key, next.value);
                    }
                }
                InterpMode::Constant => {
                    point.arrive_tangent = T::zero();
                    point.leave_tangent = T::zero();
                }
                _ => {}
            }
        }
    }
}

/// Slope between two keyed values, on the cover of `v0`, or zero for a
/// non-positive span.
fn slope<T: CurveValue>(k0: f64, v0: T, k1: f64, v1: T) -> T {
    let span = k1 - k0;
    if span > TOLERANCE {
        (v1.align_to(&v0) - v0) * (1.0 / span)
    } else {
        T::zero()
    }
}

impl InterpCurve<Vector3> {
    /// Returns the axis-aligned bounds `(min, max)` of the knot values.
    #[must_use]
    pub fn bounds(&self) -> Option<(Vector3, Vector3)> {
        let first = self.points.first()?.value;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (lo.inf(&p.value), hi.sup(&p.value))
        }))
    }
}
