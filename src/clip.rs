//! Clip-chain resolution.
//!
//! A clip chain is a stack of records, each restricting the drawable region
//! further. Resolution folds the whole chain into one normalized path by
//! intersecting the records pairwise, with shortcuts for the common cases
//! that never need a sweep: all-rectangle chains collapse to a bounding-box
//! intersection, and a chain whose only complex record is well-behaved is
//! returned as-is.

use kurbo::Rect;

use crate::combine::intersect_paths;
use crate::geom::{rect_degenerate, rect_encloses, rects_touch};
use crate::path::Path;
use crate::sweep::SweepOptions;
use crate::{normalize, ClipContext, Error, FillRule};

/// Replaces curved connective geometry with polylines.
///
/// The resolver itself only understands polylines; callers whose records
/// carry curves supply the flattener for their curve representation.
pub trait Flatten {
    /// Flattens `path` to within `flatness` device units.
    fn flatten(&self, path: &Path, flatness: f64) -> Path;
}

/// The flattener for records that are already polylines.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFlatten;

impl Flatten for NoFlatten {
    fn flatten(&self, path: &Path, _flatness: f64) -> Path {
        path.clone()
    }
}

/// Properties of one clip record, recorded by whoever built the chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordFlags {
    /// The path is exactly one axis-aligned rectangle.
    pub is_rectangle: bool,
    /// The path encloses no area at all.
    pub is_degenerate: bool,
    /// The path is already normalized output of a previous resolution.
    pub normalized: bool,
    /// The record selects the region *outside* its path.
    pub inverted: bool,
}

/// One record of a clip chain: a path, the rule deciding its inside, and
/// the properties the chain builder knew about it.
#[derive(Clone, Debug)]
pub struct ClipRecord {
    /// The clip geometry.
    pub path: Path,
    /// The record's fill rule.
    pub rule: FillRule,
    /// Builder-recorded properties.
    pub flags: RecordFlags,
    /// Flattening tolerance for curved geometry, in device units.
    pub flatness: f64,
}

impl ClipRecord {
    /// A plain record with default flags.
    pub fn new(path: Path, rule: FillRule) -> Self {
        ClipRecord {
            path,
            rule,
            flags: RecordFlags::default(),
            flatness: 0.25,
        }
    }

    /// A rectangular record.
    pub fn rect(r: Rect) -> Self {
        ClipRecord {
            path: Path::from_rect(r),
            rule: FillRule::NonZero,
            flags: RecordFlags {
                is_rectangle: true,
                normalized: true,
                ..RecordFlags::default()
            },
            flatness: 0.25,
        }
    }
}

/// What shape of region a resolution produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RegionKind {
    /// Nothing is drawable.
    Empty,
    /// The region is exactly this rectangle.
    Rectangle(Rect),
    /// An arbitrary normalized region.
    Complex,
}

/// A resolved clip region.
#[derive(Clone, Debug)]
pub struct ClipOutcome {
    /// The region as a normalized path. Empty and rectangular regions carry
    /// the corresponding trivial path, so this is always usable directly.
    pub path: Path,
    /// The region's shape class.
    pub kind: RegionKind,
    /// Whether the path is normalized output that a cache may reuse as a
    /// pre-normalized record. The single-record passthrough can return a
    /// path that was never swept, which must not be cached as normalized.
    pub cacheable: bool,
}

fn empty_outcome() -> ClipOutcome {
    ClipOutcome {
        path: Path::new(),
        kind: RegionKind::Empty,
        cacheable: true,
    }
}

fn rect_outcome(r: Rect) -> ClipOutcome {
    ClipOutcome {
        path: Path::from_rect(r),
        kind: RegionKind::Rectangle(r),
        cacheable: true,
    }
}

/// Drops subpaths whose bounding box misses `bound` entirely.
///
/// A closed contour disjoint from `bound` contributes a constant winding of
/// zero throughout `bound`, so dropping it never changes the resolved
/// region there. Inverted records are culled only after inversion, where
/// the same reasoning applies again.
fn cull(path: Path, bound: &Rect) -> Path {
    Path {
        subpaths: path
            .subpaths
            .into_iter()
            .filter(|s| rects_touch(&s.bounding_box(), bound))
            .collect(),
    }
}

/// Turns one record into a normalized path, clipped to `bound`'s vertical
/// extent.
fn prepare_record<F: Flatten>(
    rec: &ClipRecord,
    flattener: &F,
    bound: Rect,
    opts: &SweepOptions,
    ctx: &ClipContext<'_>,
) -> Result<Path, Error> {
    let flat = flattener.flatten(&rec.path, rec.flatness);
    if !flat.is_finite() {
        return Err(Error::NonFinite);
    }

    if rec.flags.inverted {
        // The complement within `bound`: normalize, flip every boundary's
        // winding sense, and lay the reversed boundaries over a positively
        // wound copy of `bound`. Where the region used to be, the windings
        // now cancel; everywhere else in `bound` the rectangle wins.
        let mut inverted = Path::from_rect(bound);
        for mut sub in normalize(flat, rec.rule, opts, ctx)?.subpaths {
            sub.points.reverse();
            inverted.push(sub);
        }
        return normalize(inverted, FillRule::NonZero, opts, ctx);
    }

    let flat = cull(flat, &bound);
    if flat.is_empty() {
        return Ok(flat);
    }
    if rec.flags.normalized && ctx.compat.use_cached_normalized {
        return Ok(flat);
    }
    normalize(flat, rec.rule, opts, ctx)
}

/// Resolves a whole clip chain into one region.
///
/// `chain` is ordered innermost-first (the most recently pushed record at
/// index zero). The resolved region is the intersection of every record's
/// region with the context's device and auxiliary bounds.
pub fn resolve_chain<F: Flatten>(
    chain: &[ClipRecord],
    flattener: &F,
    ctx: &ClipContext<'_>,
) -> Result<ClipOutcome, Error> {
    let mut bound = ctx.effective_bounds();
    if rect_degenerate(&bound) {
        return Ok(empty_outcome());
    }

    // Degenerate records and rectangle elimination first: both can decide
    // the outcome without touching any geometry.
    let mut complex: Vec<&ClipRecord> = Vec::new();
    for rec in chain {
        if rec.flags.is_degenerate {
            if ctx.compat.degenerate_is_device {
                // Quirk mode: a degenerate record clips to the whole
                // device, which makes it a no-op in an intersection.
                continue;
            }
            return Ok(empty_outcome());
        }
        if rec.flags.is_rectangle && ctx.compat.eliminate_rectangles && !rec.flags.inverted {
            bound = bound.intersect(rec.path.bounding_box());
            if rect_degenerate(&bound) {
                return Ok(empty_outcome());
            }
            continue;
        }
        complex.push(rec);
    }

    if complex.is_empty() {
        return Ok(rect_outcome(bound));
    }

    let opts = SweepOptions {
        bound: Some(bound),
        drop_slivers: true,
        coalesce: ctx.compat.coalesce,
        ..SweepOptions::default()
    };

    if let [only] = complex.as_slice() {
        if ctx.compat.single_passthrough
            && !only.flags.inverted
            && rect_encloses(&bound, &only.path.bounding_box())
        {
            // One well-behaved record inside all the rectangles: hand its
            // path straight through without a sweep. The path may not be
            // normalized, which is why the outcome is only cacheable when
            // the record already was.
            return Ok(ClipOutcome {
                path: flattener.flatten(&only.path, only.flatness),
                kind: RegionKind::Complex,
                cacheable: only.flags.normalized,
            });
        }
    }

    // Oldest record first, so that the accumulator mirrors how the chain
    // was built up.
    let mut acc: Option<Path> = None;
    for rec in complex.iter().rev() {
        let prepared = prepare_record(*rec, flattener, bound, &opts, ctx)?;
        acc = Some(match acc {
            None => prepared,
            Some(region) => intersect_paths(region, prepared, &opts, ctx)?,
        });
    }
    let mut region = acc.unwrap_or_default();

    // The sweeps above bound the region vertically but not horizontally.
    if !region.is_empty() && !rect_encloses(&bound, &region.bounding_box()) {
        region = intersect_paths(region, Path::from_rect(bound), &opts, ctx)?;
    }

    let kind = if region.is_empty() {
        RegionKind::Empty
    } else {
        RegionKind::Complex
    };
    Ok(ClipOutcome {
        path: region,
        kind,
        cacheable: true,
    })
}
