//! Paths and subpaths in their public, open form.
//!
//! During the sweep the output is built as cyclic linked node lists (see
//! [`crate::sweep::coalesce`]); this module is the open start/close
//! representation that enters and leaves the crate.

use kurbo::Rect;

use crate::geom::Point;

/// A closed polyline, stored open: the last point implicitly connects back
/// to the first.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SubPath {
    /// The vertices, in boundary order.
    pub points: Vec<Point>,
    /// Operand tag used while combining two normalized paths; zero outside
    /// of a combination.
    #[serde(skip)]
    pub(crate) owner: u8,
}

impl SubPath {
    /// Wraps a list of vertices.
    pub fn new(points: Vec<Point>) -> Self {
        SubPath { points, owner: 0 }
    }

    /// The tight bounding box, or a degenerate rectangle at the origin for
    /// an empty subpath.
    pub fn bounding_box(&self) -> Rect {
        let mut points = self.points.iter();
        let Some(first) = points.next() else {
            return Rect::ZERO;
        };
        let mut r = Rect::new(first.x, first.y, first.x, first.y);
        for p in points {
            r.x0 = r.x0.min(p.x);
            r.y0 = r.y0.min(p.y);
            r.x1 = r.x1.max(p.x);
            r.y1 = r.y1.max(p.y);
        }
        r
    }

    /// Twice the signed shoelace area.
    ///
    /// With `y` growing downwards, boundaries emitted by the sweep enclose
    /// positive area and ring holes enclose negative area.
    pub fn signed_area2(&self) -> f64 {
        let mut sum = 0.0;
        let n = self.points.len();
        for i in 0..n {
            let p = &self.points[i];
            let q = &self.points[(i + 1) % n];
            sum += p.x * q.y - q.x * p.y;
        }
        sum
    }

    /// The signed enclosed area.
    pub fn signed_area(&self) -> f64 {
        self.signed_area2() / 2.0
    }
}

/// An ordered list of subpaths.
///
/// The order is irrelevant to the geometry; it only matters for bookkeeping
/// while subpaths are spliced and merged during a sweep.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Path {
    /// The subpaths making up this path.
    pub subpaths: Vec<SubPath>,
}

impl Path {
    /// An empty path.
    pub fn new() -> Self {
        Path::default()
    }

    /// A single-subpath rectangle, traversed in the positive direction
    /// (positive shoelace area with `y` down).
    pub fn from_rect(r: Rect) -> Self {
        Path {
            subpaths: vec![SubPath::new(vec![
                Point::new(r.x0, r.y0),
                Point::new(r.x1, r.y0),
                Point::new(r.x1, r.y1),
                Point::new(r.x0, r.y1),
            ])],
        }
    }

    /// A single-subpath rectangle traversed in the negative direction.
    ///
    /// Appending this to a path flips the winding sense of everything the
    /// rectangle encloses; the clip-chain preparer uses it to turn an
    /// inverted fill into an ordinary one.
    pub fn from_rect_reversed(r: Rect) -> Self {
        Path {
            subpaths: vec![SubPath::new(vec![
                Point::new(r.x0, r.y0),
                Point::new(r.x0, r.y1),
                Point::new(r.x1, r.y1),
                Point::new(r.x1, r.y0),
            ])],
        }
    }

    /// True if there are no subpaths at all.
    pub fn is_empty(&self) -> bool {
        self.subpaths.is_empty()
    }

    /// Appends a subpath.
    pub fn push(&mut self, sub: SubPath) {
        self.subpaths.push(sub);
    }

    /// The union of the subpath bounding boxes.
    pub fn bounding_box(&self) -> Rect {
        let mut subs = self.subpaths.iter();
        let Some(first) = subs.next() else {
            return Rect::ZERO;
        };
        let mut r = first.bounding_box();
        for s in subs {
            r = r.union(s.bounding_box());
        }
        r
    }

    /// The net signed area: outer boundaries count positive, holes negative.
    pub fn signed_area(&self) -> f64 {
        self.subpaths.iter().map(SubPath::signed_area).sum()
    }

    /// Tags every subpath with an operand bit for a combination sweep.
    pub(crate) fn tagged(mut self, owner: u8) -> Self {
        for sub in &mut self.subpaths {
            sub.owner = owner;
        }
        self
    }

    /// Are all coordinates finite?
    pub fn is_finite(&self) -> bool {
        self.subpaths
            .iter()
            .all(|s| s.points.iter().all(Point::is_finite))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_area_is_positive() {
        let p = Path::from_rect(Rect::new(0.0, 0.0, 10.0, 4.0));
        assert_eq!(p.signed_area(), 40.0);
    }

    #[test]
    fn reversed_rect_area_is_negative() {
        let p = Path::from_rect_reversed(Rect::new(0.0, 0.0, 10.0, 4.0));
        assert_eq!(p.signed_area(), -40.0);
    }

    #[test]
    fn bounding_box_spans_subpaths() {
        let mut p = Path::from_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
        p.push(SubPath::new(vec![
            Point::new(5.0, 5.0),
            Point::new(6.0, 5.0),
            Point::new(6.0, 7.0),
        ]));
        assert_eq!(p.bounding_box(), Rect::new(0.0, 0.0, 6.0, 7.0));
    }
}
