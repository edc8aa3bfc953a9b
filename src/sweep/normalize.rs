//! The scan-beam loop: winding resolution and span emission.

use kurbo::Rect;

use crate::geom::{clamp_beam, crossing_y, COALESCE_EPS};
use crate::num::CheapOrderedFloat;
use crate::path::Path;
use crate::segments::{SegIdx, Segment, Segments};
use crate::{ClipContext, Error, FillRule};

use super::coalesce::Coalescer;
use super::Span;

/// How the sweep decides "inside".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WindingRule {
    NonZero,
    EvenOdd,
    /// Both operand bits must be wound. This is the synthetic rule used to
    /// intersect two already-normalized paths: each operand is tagged with
    /// its own bit, and "inside" means both counts are non-zero.
    BothInside,
}

impl From<FillRule> for WindingRule {
    fn from(rule: FillRule) -> Self {
        match rule {
            FillRule::NonZero => WindingRule::NonZero,
            FillRule::EvenOdd => WindingRule::EvenOdd,
        }
    }
}

/// What to do with exactly-horizontal segments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HorizontalPolicy {
    /// Drop them. The right choice for clipping: a horizontal boundary
    /// carries no area and the slanted neighbors already commit its
    /// endpoints.
    #[default]
    Drop,
    /// Emit horizontals lying on exposed boundary as zero-height spans,
    /// for infill-style callers that care about newly exposed or newly
    /// obscured runs.
    Emit,
}

/// Flags and limits for one sweep.
#[derive(Clone, Copy, Debug)]
pub struct SweepOptions {
    /// Clamp the sweep to this rectangle's vertical extent: beams above
    /// its top are skipped and the sweep cuts off at its bottom.
    pub bound: Option<Rect>,
    /// Drop zero-area slivers instead of emitting them.
    pub drop_slivers: bool,
    /// What to do with exactly-horizontal segments.
    pub horizontals: HorizontalPolicy,
    /// Coalescing on or off. Off means every span becomes its own quad:
    /// far more output subpaths, identical covered area.
    pub coalesce: bool,
    /// Output-vertex budget. The sweep aborts with [`Error::Exhausted`]
    /// instead of letting a pathological input grow without bound.
    pub max_nodes: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        SweepOptions {
            bound: None,
            drop_slivers: false,
            horizontals: HorizontalPolicy::default(),
            coalesce: true,
            max_nodes: 1 << 22,
        }
    }
}

fn wind(w: &mut (i32, i32), seg: &Segment) {
    if seg.owner & 1 != 0 {
        w.0 += i32::from(seg.winding);
    }
    if seg.owner & 2 != 0 {
        w.1 += i32::from(seg.winding);
    }
}

fn inside(rule: WindingRule, w: (i32, i32)) -> bool {
    match rule {
        WindingRule::NonZero => w.0 + w.1 != 0,
        WindingRule::EvenOdd => (w.0 + w.1) % 2 != 0,
        WindingRule::BothInside => w.0 != 0 && w.1 != 0,
    }
}

/// Commits near-coincident neighbors in a sorted coordinate list to one
/// shared value, so that no vertex shared by several segments is rounded
/// twice.
fn snap(xs: &mut [f64]) {
    for i in 1..xs.len() {
        if xs[i] - xs[i - 1] <= COALESCE_EPS {
            xs[i] = xs[i - 1];
        }
    }
}

/// Runs the scan-beam loop over a segment arena.
///
/// Returns the normalized path: pairwise-disjoint simple polygons whose
/// union is exactly the region the rule calls "inside".
pub(crate) fn sweep(
    segments: &Segments,
    rule: WindingRule,
    opts: &SweepOptions,
    ctx: &ClipContext<'_>,
) -> Result<Path, Error> {
    let mut co = Coalescer::new(
        rule == WindingRule::EvenOdd,
        opts.coalesce,
        opts.drop_slivers,
        opts.max_nodes,
    );
    let enter = segments.entrances();
    let hors = segments.horizontals();
    let mut enter_idx = 0;
    let mut hor_idx = 0;
    let mut active = Vec::new();
    let mut xs_top: Vec<f64> = Vec::new();
    let mut xs_bot: Vec<f64> = Vec::new();
    let mut spans: Vec<Span> = Vec::new();
    let mut keyed: Vec<(f64, SegIdx)> = Vec::new();

    if enter.is_empty() {
        // Horizontal-only input: no area anywhere, so every horizontal is
        // exposed boundary.
        if opts.horizontals == HorizontalPolicy::Emit {
            for &h in hors {
                co.emit_degenerate(segments[h].top, segments[h].bot);
            }
        }
        return Ok(co.finish());
    }

    let mut y = enter[0].0;
    if let Some(b) = opts.bound {
        y = y.max(b.y0);
    }

    loop {
        ctx.poll()?;

        while enter_idx < enter.len() && enter[enter_idx].0 <= y {
            active.push(enter[enter_idx].1);
            enter_idx += 1;
        }
        // Reclaim segments whose terminal height the sweep has reached.
        active.retain(|s| segments[*s].bot.y > y);

        if let Some(b) = opts.bound {
            if y >= b.y1 {
                break;
            }
        }

        if active.is_empty() {
            // A vertical gap in the input: everything open closes here.
            co.step(y, y, &[])?;
            while hor_idx < hors.len() && segments[hors[hor_idx]].top.y <= y {
                let h = &segments[hors[hor_idx]];
                hor_idx += 1;
                if opts.horizontals == HorizontalPolicy::Emit {
                    co.emit_degenerate(h.top, h.bot);
                }
            }
            if enter_idx == enter.len() {
                break;
            }
            y = enter[enter_idx].0;
            continue;
        }

        active.sort_by(|a, b| {
            let sa = &segments[*a];
            let sb = &segments[*b];
            (
                CheapOrderedFloat::from(sa.x_at(y)),
                CheapOrderedFloat::from(sa.gradient()),
            )
                .cmp(&(
                    CheapOrderedFloat::from(sb.x_at(y)),
                    CheapOrderedFloat::from(sb.gradient()),
                ))
        });

        xs_top.clear();
        xs_top.extend(active.iter().map(|s| segments[*s].x_at(y)));
        snap(&mut xs_top);

        // Segments meeting this scanline at a shared point (a crossing the
        // previous beam ended on, typically) evaluate its x independently,
        // a few ulps apart, so the raw sort above can leave a crossed pair
        // in pre-crossing order. The snap has committed shared positions to
        // one x; re-order on the committed values, where such a pair is an
        // exact tie and the gradient decides.
        keyed.clear();
        keyed.extend(xs_top.iter().copied().zip(active.iter().copied()));
        keyed.sort_by(|(xa, a), (xb, b)| {
            (
                CheapOrderedFloat::from(*xa),
                CheapOrderedFloat::from(segments[*a].gradient()),
            )
                .cmp(&(
                    CheapOrderedFloat::from(*xb),
                    CheapOrderedFloat::from(segments[*b].gradient()),
                ))
        });
        for (i, (x, s)) in keyed.iter().enumerate() {
            xs_top[i] = *x;
            active[i] = *s;
        }

        // Horizontal pass: runs lying exactly on this scanline come first.
        // A horizontal inside the filled region is swallowed; one on
        // exposed boundary is emitted when the caller asked for it.
        while hor_idx < hors.len() && segments[hors[hor_idx]].top.y <= y {
            let h = &segments[hors[hor_idx]];
            hor_idx += 1;
            if opts.horizontals == HorizontalPolicy::Emit {
                let mid = (h.top.x + h.bot.x) / 2.0;
                let mut w = (0, 0);
                for (i, s) in active.iter().enumerate() {
                    if xs_top[i] >= mid {
                        break;
                    }
                    wind(&mut w, &segments[*s]);
                }
                if !inside(rule, w) {
                    co.emit_degenerate(h.top, h.bot);
                }
            }
        }

        // The next beam bottom: the nearest of a segment end, a new
        // entrance, a pending horizontal, and the nearest crossing among
        // X-adjacent active segments. Crossings are clamped to the minimum
        // beam height; the slight misordering this can cause is repaired
        // by the re-sort and the snap pass on the next beam.
        let mut next_y = f64::INFINITY;
        for s in &active {
            next_y = next_y.min(segments[*s].bot.y);
        }
        if enter_idx < enter.len() {
            next_y = next_y.min(enter[enter_idx].0);
        }
        if hor_idx < hors.len() {
            next_y = next_y.min(segments[hors[hor_idx]].top.y);
        }
        let mut cross = f64::INFINITY;
        for pair in active.windows(2) {
            let a = &segments[pair[0]];
            let b = &segments[pair[1]];
            if let Some(cy) = crossing_y(a.top, a.bot, b.top, b.bot, y) {
                cross = cross.min(cy);
            }
        }
        if cross.is_finite() {
            next_y = next_y.min(clamp_beam(y, cross));
        }
        if let Some(b) = opts.bound {
            next_y = next_y.min(b.y1);
        }
        debug_assert!(next_y > y);

        xs_bot.clear();
        xs_bot.extend(active.iter().map(|s| segments[*s].x_at(next_y)));
        for i in 1..xs_bot.len() {
            if xs_bot[i] < xs_bot[i - 1] {
                xs_bot[i] = xs_bot[i - 1];
            }
        }
        snap(&mut xs_bot);

        spans.clear();
        let mut w = (0, 0);
        let mut open: Option<usize> = None;
        for (i, s) in active.iter().enumerate() {
            wind(&mut w, &segments[*s]);
            match (open, inside(rule, w)) {
                (None, true) => open = Some(i),
                (Some(l), false) => {
                    let span = Span {
                        xl_top: xs_top[l],
                        xr_top: xs_top[i],
                        xl_bot: xs_bot[l],
                        xr_bot: xs_bot[i],
                    };
                    let sliver = span.xr_top - span.xl_top <= COALESCE_EPS
                        && span.xr_bot - span.xl_bot <= COALESCE_EPS;
                    if !(opts.drop_slivers && sliver) {
                        spans.push(span);
                    }
                    open = None;
                }
                _ => {}
            }
        }
        debug_assert!(open.is_none(), "winding did not return to zero");
        debug_assert_eq!(w, (0, 0));

        co.step(y, next_y, &spans)?;
        y = next_y;
    }

    Ok(co.finish())
}
