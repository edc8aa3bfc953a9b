//! The segment builder: decomposes subpaths into sweep-ordered line
//! segments.

use crate::geom::Point;
use crate::num::CheapOrderedFloat;
use crate::path::Path;

/// An index into our segment arena.
///
/// Throughout this library, we assign identities to segments, so that we may
/// consider segments as different even if they have the same start- and
/// end-points. The index is only meaningful for the [`Segments`] arena it
/// came from.
#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash, serde::Serialize)]
pub struct SegIdx(pub usize);

impl std::fmt::Debug for SegIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s_{}", self.0)
    }
}

/// A directed line segment, stored in sweep-line order.
///
/// `top` is the endpoint with the smaller `(y, x)`; `winding` records the
/// original direction: `+1` if the contour traversed the segment downwards
/// (agreeing with sweep order), `-1` if upwards, and `0` for an exactly
/// horizontal segment, which never contributes to the winding count.
#[derive(Clone, PartialEq, serde::Serialize)]
pub struct Segment {
    /// The endpoint with the smaller `(y, x)`.
    pub top: Point,
    /// The endpoint with the larger `(y, x)`.
    pub bot: Point,
    /// `+1` traversed downwards, `-1` upwards, `0` horizontal.
    pub winding: i8,
    /// Operand bit (1 or 2) while intersecting two normalized paths; 1 for
    /// a plain normalization.
    pub owner: u8,
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Segment { top, bot, winding, .. } = self;
        write!(f, "{top:?} -- {bot:?} ({winding:+})")
    }
}

impl Segment {
    /// Returns true if this segment is exactly horizontal.
    pub fn is_horizontal(&self) -> bool {
        self.top.y == self.bot.y
    }

    /// Our `x` coordinate at the given `y` coordinate.
    ///
    /// Horizontal segments return their smaller `x`. The input is clamped
    /// to the segment's vertical extent, so a beam bottom that slightly
    /// overshoots the endpoint (tolerated by the beam clamp) still reads a
    /// committed coordinate.
    pub fn x_at(&self, y: f64) -> f64 {
        debug_assert!(
            (self.top.y - 1e-9..=self.bot.y + 1e-9).contains(&y),
            "segment {self:?}, y={y:?}"
        );
        if self.is_horizontal() {
            return self.top.x;
        }
        let t = ((y - self.top.y) / (self.bot.y - self.top.y)).clamp(0.0, 1.0);
        self.top.x + t * (self.bot.x - self.top.x)
    }

    /// The local gradient `dx/dy`, used to break ties between segments
    /// meeting at a common point. Horizontals sort last.
    pub fn gradient(&self) -> f64 {
        if self.is_horizontal() {
            f64::INFINITY
        } else {
            (self.bot.x - self.top.x) / (self.bot.y - self.top.y)
        }
    }
}

/// An arena of line segments, plus the entry schedule for the sweep.
///
/// Segments are indexed by [`SegIdx`] and can be retrieved by indexing
/// (i.e. with square brackets).
#[derive(Debug, Clone, Default)]
pub struct Segments {
    segs: Vec<Segment>,
    /// Entrance heights of all non-horizontal segments, ordered by height
    /// and then by horizontal start position.
    enter: Vec<(f64, SegIdx)>,
    /// Horizontal segments, ordered by height then left end.
    horizontal: Vec<SegIdx>,
}

fn cyclic_pairs<T>(xs: &[T]) -> impl Iterator<Item = (&T, &T)> {
    xs.windows(2)
        .map(|pair| (&pair[0], &pair[1]))
        .chain(xs.last().zip(xs.first()))
}

impl Segments {
    /// The number of line segments in this arena.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.segs.len()
    }

    /// Decomposes every subpath of `path` into segments, consuming it.
    ///
    /// Zero-length edges are dropped on the spot. The subpaths' operand
    /// tags are carried onto their segments; untagged subpaths get operand
    /// bit 1.
    pub fn add_path(&mut self, path: Path) {
        let old_len = self.segs.len();
        for sub in path.subpaths {
            let owner = if sub.owner == 0 { 1 } else { sub.owner };
            if sub.points.len() < 2 {
                continue;
            }
            for (p, q) in cyclic_pairs(&sub.points) {
                if p == q {
                    continue;
                }
                let (top, bot, winding) = if p < q {
                    (*p, *q, 1)
                } else {
                    (*q, *p, -1)
                };
                let winding = if top.y == bot.y { 0 } else { winding };
                self.segs.push(Segment {
                    top,
                    bot,
                    winding,
                    owner,
                });
            }
        }
        self.update_enter(old_len);
    }

    fn update_enter(&mut self, old_len: usize) {
        for idx in old_len..self.segs.len() {
            let seg_idx = SegIdx(idx);
            if self.segs[idx].is_horizontal() {
                self.horizontal.push(seg_idx);
            } else {
                self.enter.push((self.segs[idx].top.y, seg_idx));
            }
        }

        // Sorting entrances by start position as well makes it likely that
        // segments get merged into the active list already in order.
        self.enter.sort_by(|(y1, s1), (y2, s2)| {
            CheapOrderedFloat::from(*y1)
                .cmp(&CheapOrderedFloat::from(*y2))
                .then_with(|| {
                    CheapOrderedFloat::from(self.segs[s1.0].top.x)
                        .cmp(&CheapOrderedFloat::from(self.segs[s2.0].top.x))
                })
        });
        self.horizontal.sort_by(|a, b| self.segs[a.0].top.cmp(&self.segs[b.0].top));
    }

    /// All the entrance heights of non-horizontal segments, ordered by
    /// height.
    pub fn entrances(&self) -> &[(f64, SegIdx)] {
        &self.enter
    }

    /// Horizontal segments, ordered by height then left end.
    pub fn horizontals(&self) -> &[SegIdx] {
        &self.horizontal
    }
}

impl std::ops::Index<SegIdx> for Segments {
    type Output = Segment;

    fn index(&self, index: SegIdx) -> &Self::Output {
        &self.segs[index.0]
    }
}
