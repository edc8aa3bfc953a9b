//! Geometric primitives and the tolerance predicates.
//!
//! All of the epsilon comparisons in the crate go through the named
//! predicates in this module. The three tolerances are fixed in device
//! units and are deliberately spaced apart: the coalescing tolerance is
//! smaller than the collinearity tolerance so that dropping an output
//! vertex can never flip the outcome of a collinearity decision, and the
//! minimum scan-beam height is larger than both so that beam subdivision
//! cannot recurse into the noise floor of the other two tests.

use kurbo::Rect;

use crate::num::CheapOrderedFloat;

/// Two segments whose directions differ by less than this (in device units,
/// measured as a perpendicular distance) are treated as coincident.
pub const COLLINEAR_EPS: f64 = 0.1;

/// An output vertex within this distance of the boundary it would extend is
/// dropped or merged instead of added.
pub const COALESCE_EPS: f64 = 0.05;

/// Scan beams produced by intersection subdivision are never shorter than
/// this, bounding the work done on clusters of near-coincident crossings.
pub const MIN_BEAM: f64 = 0.25;

/// A two-dimensional point.
///
/// Points are sorted by `y` and then by `x`, for the convenience of our
/// sweep-line algorithm (which moves in increasing `y`).
#[derive(Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point {
    /// Vertical coordinate.
    ///
    /// Although it isn't important for functionality, the documentation and
    /// method naming assumes that larger values are down.
    pub y: f64,
    /// Horizontal component.
    pub x: f64,
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (
            CheapOrderedFloat::from(self.y),
            CheapOrderedFloat::from(self.x),
        )
            .cmp(&(
                CheapOrderedFloat::from(other.y),
                CheapOrderedFloat::from(other.x),
            ))
    }
}

impl PartialOrd for Point {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for Point {}

impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, {:?})", self.x, self.y)
    }
}

impl Point {
    /// Create a new point.
    ///
    /// Note that the `x` coordinate comes first, even though we sort by `y`
    /// coordinate first: `(x, y)` is the only sane constructor order.
    pub fn new(x: f64, y: f64) -> Self {
        debug_assert!(x.is_finite());
        debug_assert!(y.is_finite());
        Point { x, y }
    }

    /// Are both coordinates finite?
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Conversion to the `kurbo` point type.
    pub fn to_kurbo(self) -> kurbo::Point {
        kurbo::Point::new(self.x, self.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Are two horizontal positions equal up to the coalescing tolerance?
#[inline]
pub fn nearly_equal_x(a: f64, b: f64) -> bool {
    (a - b).abs() <= COALESCE_EPS
}

/// Are two points coincident up to the coalescing tolerance?
#[inline]
pub fn nearly_same_point(a: Point, b: Point) -> bool {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy <= COALESCE_EPS * COALESCE_EPS
}

/// Would dropping `mid` from the chain `a -> mid -> b` move the boundary by
/// less than the coalescing tolerance?
///
/// This is a perpendicular-distance test against the chord from `a` to `b`,
/// with the cross product squared so that no square root is needed. When the
/// chord is shorter than the tolerance the three points are close enough
/// together that dropping `mid` is always safe.
pub fn within_coalesce(a: Point, mid: Point, b: Point) -> bool {
    let cx = b.x - a.x;
    let cy = b.y - a.y;
    let chord2 = cx * cx + cy * cy;
    if chord2 <= COALESCE_EPS * COALESCE_EPS {
        let dx = mid.x - a.x;
        let dy = mid.y - a.y;
        return dx * dx + dy * dy <= COALESCE_EPS * COALESCE_EPS;
    }
    let cross = cx * (mid.y - a.y) - cy * (mid.x - a.x);
    cross * cross <= COALESCE_EPS * COALESCE_EPS * chord2
}

/// Are the directions `d0` and `d1` collinear up to [`COLLINEAR_EPS`]?
///
/// The tolerance is interpreted as a perpendicular offset over the length of
/// the shorter direction, so two long segments a hair's width apart in angle
/// still count as coincident near their common endpoint.
pub fn nearly_collinear(d0: (f64, f64), d1: (f64, f64)) -> bool {
    let cross = d0.0 * d1.1 - d0.1 * d1.0;
    let l0 = d0.0 * d0.0 + d0.1 * d0.1;
    let l1 = d1.0 * d1.0 + d1.1 * d1.1;
    cross * cross <= COLLINEAR_EPS * COLLINEAR_EPS * l0.min(l1).max(1.0)
}

/// The `y` coordinate at which the lines through `(a0, a1)` and `(b0, b1)`
/// properly cross, if that crossing is strictly below `y` and within the
/// vertical extent of both segments.
///
/// Near-collinear pairs return `None`: within tolerance they never cross, so
/// subdividing the beam for them would be pure noise.
pub fn crossing_y(a0: Point, a1: Point, b0: Point, b1: Point, y: f64) -> Option<f64> {
    let da = (a1.x - a0.x, a1.y - a0.y);
    let db = (b1.x - b0.x, b1.y - b0.y);
    if nearly_collinear(da, db) {
        return None;
    }
    let denom = da.0 * db.1 - da.1 * db.0;
    let t = ((b0.x - a0.x) * db.1 - (b0.y - a0.y) * db.0) / denom;
    let cross_y = a0.y + t * da.1;
    let y_max = a1.y.min(b1.y);
    if cross_y > y && cross_y <= y_max {
        Some(cross_y)
    } else {
        None
    }
}

/// Clamps a candidate beam bottom produced by intersection subdivision so
/// that the beam is at least [`MIN_BEAM`] tall.
#[inline]
pub fn clamp_beam(y_top: f64, candidate: f64) -> f64 {
    candidate.max(y_top + MIN_BEAM)
}

/// Does `outer` contain all of `inner`?
///
/// `kurbo::Rect` grew a few differently-named emptiness helpers over time,
/// so we keep our own comparisons here.
pub fn rect_encloses(outer: &Rect, inner: &Rect) -> bool {
    outer.x0 <= inner.x0 && outer.y0 <= inner.y0 && outer.x1 >= inner.x1 && outer.y1 >= inner.y1
}

/// Do two rectangles overlap (sharing only an edge counts)?
pub fn rects_touch(a: &Rect, b: &Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

/// Is this rectangle degenerate (zero or negative area)?
pub fn rect_degenerate(r: &Rect) -> bool {
    r.x1 <= r.x0 || r.y1 <= r.y0
}
