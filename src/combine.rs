//! Pairwise intersection of two already-normalized paths.
//!
//! Rather than clip one path against the other edge by edge, both operands
//! are loaded into a single segment arena with distinct operand tags and
//! swept once under a synthetic "both inside" rule. The sweep machinery
//! already handles crossings, coincident edges, and coalescing, so the
//! intersection inherits all of its robustness for free.

use crate::path::Path;
use crate::segments::Segments;
use crate::sweep::{sweep, SweepOptions, WindingRule};
use crate::{ClipContext, Error};

/// Intersects two normalized paths.
///
/// Both operands must already be normalized (pairwise-disjoint simple
/// subpaths, so that a non-zero winding count means "inside" for each on
/// its own). The result is again normalized.
pub fn intersect_paths(
    a: Path,
    b: Path,
    opts: &SweepOptions,
    ctx: &ClipContext<'_>,
) -> Result<Path, Error> {
    let mut segments = Segments::default();
    segments.add_path(a.tagged(1));
    segments.add_path(b.tagged(2));
    sweep(&segments, WindingRule::BothInside, opts, ctx)
}
