//! The coalescing tracker: turns the stream of per-beam spans into as few
//! output subpaths as the topology allows.
//!
//! Output subpaths are built as cyclic doubly-linked node lists in one
//! arena. Every still-open span at the current scanline is tracked by an
//! [`ActiveEdge`] holding the node indices of the deepest vertex on its
//! left and right boundary chains. The cycle is threaded so that an open
//! subpath's "gap" sits between those two nodes:
//!
//! ```text
//!      L ────────── R          next: L -> R across the top,
//!      │            │                R's chain downwards,
//!      l ··· gap ··· r               r -> l across the gap,
//!                                    l's chain back upwards.
//! ```
//!
//! Keeping `next(right) == left` means that extending, closing, splicing
//! and splitting are all a handful of index relinks, and a closed subpath
//! needs no extra work at all: the gap edge *is* its bottom edge.
//!
//! All references here are arena indices, never pointers, so a splice that
//! renames or retires a subpath can rewrite the stale owners in one pass
//! without any dangling-reference hazard.

use arrayvec::ArrayVec;

use crate::geom::{nearly_equal_x, nearly_same_point, within_coalesce, Point, COALESCE_EPS};
use crate::path::{Path, SubPath};
use crate::Error;

use super::Span;

/// An index into the output-vertex arena.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeIdx(u32);

impl std::fmt::Debug for NodeIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n_{}", self.0)
    }
}

/// An index into the active-edge pool.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct EdgeIdx(u32);

impl std::fmt::Debug for EdgeIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e_{}", self.0)
    }
}

/// An index identifying an output subpath.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct SubIdx(u32);

impl std::fmt::Debug for SubIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p_{}", self.0)
    }
}

#[derive(Clone, Copy, Debug)]
struct Node {
    pt: Point,
    next: NodeIdx,
    prev: NodeIdx,
}

/// One still-open output span at the current scanline.
#[derive(Clone, Copy, Debug)]
struct ActiveEdge {
    /// Left end of the span's x-range at the last completed beam bottom.
    xl: f64,
    /// Right end of the same range.
    xr: f64,
    /// Deepest vertex of the left boundary chain.
    left: NodeIdx,
    /// Deepest vertex of the right boundary chain.
    right: NodeIdx,
    /// The output subpath this span belongs to.
    sub: SubIdx,
}

#[derive(Clone, Copy, Debug)]
struct SubState {
    /// Some node on the subpath's cycle; the de-cyclization walk starts here.
    entry: NodeIdx,
    /// How many active edges still feed this subpath. Zero means complete.
    open_edges: u32,
    /// Set when a splice absorbed this subpath into another one.
    dead: bool,
}

/// Pool of active edges plus the output-node arena.
#[derive(Clone, Debug)]
pub(crate) struct Coalescer {
    nodes: Vec<Node>,
    edges: Vec<ActiveEdge>,
    free_edges: Vec<EdgeIdx>,
    subs: Vec<SubState>,
    /// Open edges at the current scanline, sorted by `xl`.
    active: Vec<EdgeIdx>,
    /// Completed degenerate subpaths emitted by the horizontal pass.
    degenerate: Vec<SubPath>,
    /// Two spans that merely touch (within the coalescing tolerance) are
    /// joined only under the even-odd rule; under a winding rule the count
    /// passed through zero between them, so they stay separate lobes.
    touch_join: bool,
    /// When false, every span becomes its own quad subpath. More output,
    /// same covered area; useful when debugging the splice logic.
    enabled: bool,
    drop_slivers: bool,
    max_nodes: usize,
}

impl Coalescer {
    pub fn new(touch_join: bool, enabled: bool, drop_slivers: bool, max_nodes: usize) -> Self {
        Coalescer {
            nodes: Vec::new(),
            edges: Vec::new(),
            free_edges: Vec::new(),
            subs: Vec::new(),
            active: Vec::new(),
            degenerate: Vec::new(),
            touch_join,
            enabled,
            drop_slivers,
            max_nodes,
        }
    }

    fn new_node(&mut self, pt: Point) -> Result<NodeIdx, Error> {
        if self.nodes.len() >= self.max_nodes {
            return Err(Error::Exhausted);
        }
        let idx = NodeIdx(self.nodes.len() as u32);
        self.nodes.push(Node {
            pt,
            next: idx,
            prev: idx,
        });
        Ok(idx)
    }

    fn alloc_edge(&mut self, edge: ActiveEdge) -> EdgeIdx {
        if let Some(idx) = self.free_edges.pop() {
            self.edges[idx.0 as usize] = edge;
            idx
        } else {
            self.edges.push(edge);
            EdgeIdx(self.edges.len() as u32 - 1)
        }
    }

    fn edge(&self, e: EdgeIdx) -> &ActiveEdge {
        &self.edges[e.0 as usize]
    }

    fn edge_mut(&mut self, e: EdgeIdx) -> &mut ActiveEdge {
        &mut self.edges[e.0 as usize]
    }

    fn sub_mut(&mut self, s: SubIdx) -> &mut SubState {
        &mut self.subs[s.0 as usize]
    }

    fn link(&mut self, a: NodeIdx, b: NodeIdx) {
        self.nodes[a.0 as usize].next = b;
        self.nodes[b.0 as usize].prev = a;
    }

    /// Does the span's top range overlap this edge's range?
    ///
    /// The margin is positive when touching counts as overlapping and
    /// negative when a real shared interval is required.
    fn overlaps(&self, e: EdgeIdx, s: &Span) -> bool {
        let margin = if self.touch_join {
            COALESCE_EPS
        } else {
            -COALESCE_EPS
        };
        let e = self.edge(e);
        e.xl <= s.xr_top + margin && s.xl_top <= e.xr + margin
    }

    /// Advances the tracker by one scan beam.
    ///
    /// `spans` must be sorted by `xl_top` and pairwise disjoint; the active
    /// edges are matched against them left to right. An edge covered by no
    /// span closes; a span covering no edge starts a new subpath; a span
    /// covering several edges splices them; an edge covered by several
    /// spans splits.
    pub fn step(&mut self, y_top: f64, y_bot: f64, spans: &[Span]) -> Result<(), Error> {
        if !self.enabled {
            for s in spans {
                let e = self.start(s, y_top, y_bot)?;
                self.close(e);
            }
            return Ok(());
        }

        let old = std::mem::take(&mut self.active);
        let mut next_active = Vec::with_capacity(spans.len());
        let mut j = 0;
        // The right-hand remainder of an edge that the previous span split.
        let mut carry: Option<EdgeIdx> = None;

        for (si, s) in spans.iter().enumerate() {
            let mut owner: Option<EdgeIdx> = carry.take();

            while j < old.len() {
                let e = old[j];
                if self.overlaps(e, s) {
                    j += 1;
                    owner = Some(match owner {
                        None => e,
                        Some(o) => self.merge(o, e)?,
                    });
                } else if self.edge(e).xr <= s.xr_top {
                    // Ends within this span's extent without truly
                    // overlapping it; later spans start further right, so
                    // nothing can continue it.
                    self.close(e);
                    j += 1;
                } else {
                    // Starts right of this span; leave it for the next one.
                    break;
                }
            }

            let o = match owner {
                None => self.start(s, y_top, y_bot)?,
                Some(o) => {
                    // If the matched column reaches under the next span as
                    // well, an island of "outside" opens between the two
                    // spans: split off the right part before extending.
                    if let Some(s_next) = spans.get(si + 1) {
                        let reaches = {
                            let margin = if self.touch_join {
                                COALESCE_EPS
                            } else {
                                -COALESCE_EPS
                            };
                            self.edge(o).xr >= s_next.xl_top - margin
                        };
                        if reaches {
                            carry = Some(self.split(o, s.xr_top, s_next.xl_top, y_top)?);
                        }
                    }
                    self.extend(o, s, y_top, y_bot)?;
                    o
                }
            };
            next_active.push(o);
        }

        debug_assert!(carry.is_none());
        for &e in &old[j..] {
            self.close(e);
        }
        self.active = next_active;
        self.check_invariants();
        Ok(())
    }

    /// Opens a new subpath for a span with no edge above it.
    fn start(&mut self, s: &Span, y_top: f64, y_bot: f64) -> Result<EdgeIdx, Error> {
        let l = self.new_node(Point::new(s.xl_top, y_top))?;
        let r = self.new_node(Point::new(s.xr_top, y_top))?;
        self.link(l, r);
        self.link(r, l);
        let sub = SubIdx(self.subs.len() as u32);
        self.subs.push(SubState {
            entry: l,
            open_edges: 1,
            dead: false,
        });
        let e = self.alloc_edge(ActiveEdge {
            xl: s.xl_top,
            xr: s.xr_top,
            left: l,
            right: r,
            sub,
        });
        self.extend(e, s, y_top, y_bot)?;
        Ok(e)
    }

    /// Extends an edge's boundary chains down to the bottom of the beam.
    ///
    /// A vertex is only appended when the boundary actually bends by more
    /// than the coalescing tolerance; otherwise the deepest vertex is moved
    /// in place, which is what keeps long straight edges at two vertices no
    /// matter how many beams crossed them.
    fn extend(&mut self, e: EdgeIdx, s: &Span, y_top: f64, y_bot: f64) -> Result<(), Error> {
        let (xl, xr) = {
            let edge = self.edge(e);
            (edge.xl, edge.xr)
        };

        let mut left_pts: ArrayVec<Point, 2> = ArrayVec::new();
        let mut right_pts: ArrayVec<Point, 2> = ArrayVec::new();
        // A jog: the winding boundary jumped to a different segment at this
        // scanline, so the two positions are bridged explicitly rather than
        // letting each owner round the shared height on its own.
        if !nearly_equal_x(s.xl_top, xl) {
            left_pts.push(Point::new(s.xl_top, y_top));
        }
        if !nearly_equal_x(s.xr_top, xr) {
            right_pts.push(Point::new(s.xr_top, y_top));
        }
        left_pts.push(Point::new(s.xl_bot, y_bot));
        right_pts.push(Point::new(s.xr_bot, y_bot));

        for p in left_pts {
            self.add_left(e, p)?;
        }
        for p in right_pts {
            self.add_right(e, p)?;
        }

        let edge = self.edge_mut(e);
        edge.xl = s.xl_bot;
        edge.xr = s.xr_bot;
        Ok(())
    }

    fn add_left(&mut self, e: EdgeIdx, p: Point) -> Result<(), Error> {
        let (l, r) = {
            let edge = self.edge(e);
            (edge.left, edge.right)
        };
        let up = self.nodes[l.0 as usize].next;
        if within_coalesce(self.nodes[up.0 as usize].pt, self.nodes[l.0 as usize].pt, p) {
            self.nodes[l.0 as usize].pt = p;
        } else {
            let w = self.new_node(p)?;
            self.link(r, w);
            self.link(w, l);
            self.edge_mut(e).left = w;
        }
        Ok(())
    }

    fn add_right(&mut self, e: EdgeIdx, p: Point) -> Result<(), Error> {
        let (l, r) = {
            let edge = self.edge(e);
            (edge.left, edge.right)
        };
        let up = self.nodes[r.0 as usize].prev;
        if within_coalesce(self.nodes[up.0 as usize].pt, self.nodes[r.0 as usize].pt, p) {
            self.nodes[r.0 as usize].pt = p;
        } else {
            let w = self.new_node(p)?;
            self.link(r, w);
            self.link(w, l);
            self.edge_mut(e).right = w;
        }
        Ok(())
    }

    /// A span reaches across two edges: the notch between them has closed.
    ///
    /// ```text
    ///   │ o │     │ e │        │ o           e │
    ///   │   │     │   │   =>   │   └─────────┘ │
    ///   └───┘     └───┘        └───── gap ─────┘
    /// ```
    ///
    /// The two gap links are rewired so that `o`'s right chain runs into
    /// `e`'s left chain. If the edges belonged to different subpaths this
    /// splices their cycles into one and retires `e`'s subpath, rewriting
    /// every remaining edge that still names it. If they already belonged
    /// to the same subpath the rewiring pinches its cycle in two: the notch
    /// chain comes off as a closed, oppositely-wound ring.
    fn merge(&mut self, o: EdgeIdx, e: EdgeIdx) -> Result<EdgeIdx, Error> {
        let (ol, or, osub) = {
            let edge = self.edge(o);
            (edge.left, edge.right, edge.sub)
        };
        let (el, er, esub) = {
            let edge = self.edge(e);
            (edge.left, edge.right, edge.sub)
        };

        // Close the notch bottom and re-thread the gap.
        self.link(or, el);
        self.link(er, ol);

        if osub != esub {
            for slot in &mut self.edges {
                if slot.sub == esub {
                    slot.sub = osub;
                }
            }
            let absorbed = self.sub_mut(esub).open_edges;
            self.sub_mut(esub).open_edges = 0;
            self.sub_mut(esub).dead = true;
            self.sub_mut(osub).open_edges += absorbed - 1;
        } else {
            // The notch cycle is now closed: register it as a ring.
            self.subs.push(SubState {
                entry: or,
                open_edges: 0,
                dead: false,
            });
            self.sub_mut(osub).open_edges -= 1;
        }
        // Whatever happened above, `ol` is on the surviving open cycle.
        self.sub_mut(osub).entry = ol;

        let xr = self.edge(e).xr;
        self.free_edges.push(e);
        let edge = self.edge_mut(o);
        edge.right = er;
        edge.xr = xr;
        Ok(o)
    }

    /// Two spans sit under one edge: an island of "outside" opens.
    ///
    /// ```text
    ///   │       o       │         │ o │ island │ e2 │
    ///   └────── gap ────┘   =>    └gap┘  q──p  └gap─┘
    /// ```
    ///
    /// New nodes `p` (at `x_left`) and `q` (at `x_right`) become the
    /// island's ceiling; both halves keep feeding the same subpath, so a
    /// later re-merge of the halves detects the ring.
    fn split(&mut self, o: EdgeIdx, x_left: f64, x_right: f64, y_top: f64) -> Result<EdgeIdx, Error> {
        let p = self.new_node(Point::new(x_left, y_top))?;
        let q = self.new_node(Point::new(x_right, y_top))?;
        let (ol, or, sub, oxr) = {
            let edge = self.edge(o);
            (edge.left, edge.right, edge.sub, edge.xr)
        };
        self.link(or, q);
        self.link(q, p);
        self.link(p, ol);
        let e2 = self.alloc_edge(ActiveEdge {
            xl: x_right,
            xr: oxr,
            left: q,
            right: or,
            sub,
        });
        {
            let edge = self.edge_mut(o);
            edge.right = p;
            edge.xr = x_left;
        }
        self.sub_mut(sub).open_edges += 1;
        Ok(e2)
    }

    /// Retires an edge whose span was not continued by the current beam.
    ///
    /// The gap link already doubles as the subpath's bottom edge, so no
    /// geometry is written here.
    fn close(&mut self, e: EdgeIdx) {
        let sub = self.edge(e).sub;
        self.sub_mut(sub).open_edges -= 1;
        self.free_edges.push(e);
    }

    /// Emits a standalone zero-height span, used by the horizontal pass.
    pub fn emit_degenerate(&mut self, p0: Point, p1: Point) {
        if self.drop_slivers {
            return;
        }
        self.degenerate.push(SubPath::new(vec![p0, p1]));
    }

    /// Closes every remaining edge and converts the cyclic subpaths to
    /// their open form.
    pub fn finish(mut self) -> Path {
        for e in std::mem::take(&mut self.active) {
            self.close(e);
        }

        let mut out = Path::new();
        for si in 0..self.subs.len() {
            let sub = self.subs[si];
            if sub.dead {
                continue;
            }
            debug_assert_eq!(sub.open_edges, 0);
            if let Some(poly) = self.collect_cycle(sub.entry) {
                out.push(poly);
            }
        }
        out.subpaths.append(&mut self.degenerate);
        out
    }

    /// Walks one cycle, dropping coincident and collinear-within-tolerance
    /// vertices.
    fn collect_cycle(&self, entry: NodeIdx) -> Option<SubPath> {
        let mut pts = Vec::new();
        let mut n = entry;
        for _ in 0..self.nodes.len() {
            let node = &self.nodes[n.0 as usize];
            match pts.last() {
                Some(&last) if nearly_same_point(last, node.pt) => {}
                _ => pts.push(node.pt),
            }
            n = node.next;
            if n == entry {
                break;
            }
        }
        debug_assert_eq!(n, entry, "unterminated output cycle");

        // Seam vertices (splice bottoms, island ceilings) can leave
        // collinear triples behind; one cleanup pass settles them.
        let mut i = 0;
        while pts.len() >= 3 && i < pts.len() {
            let prev = pts[(i + pts.len() - 1) % pts.len()];
            let next = pts[(i + 1) % pts.len()];
            if within_coalesce(prev, pts[i], next) {
                pts.remove(i);
            } else {
                i += 1;
            }
        }
        while pts.len() >= 2 && nearly_same_point(pts[0], pts[pts.len() - 1]) {
            pts.pop();
        }

        let poly = SubPath::new(pts);
        if self.drop_slivers {
            if poly.points.len() < 3 || poly.signed_area().abs() <= COALESCE_EPS {
                return None;
            }
        } else if poly.points.len() < 2 {
            return None;
        }
        Some(poly)
    }

    #[cfg(feature = "slow-asserts")]
    fn check_invariants(&self) {
        // Gap adjacency: every open edge's right node links to its left node.
        for &e in &self.active {
            let edge = self.edge(e);
            assert_eq!(self.nodes[edge.right.0 as usize].next, edge.left);
            assert!(!self.subs[edge.sub.0 as usize].dead);
        }
        // Active x-ranges are disjoint once the beam's merges are resolved.
        for pair in self.active.windows(2) {
            assert!(self.edge(pair[0]).xr <= self.edge(pair[1]).xl + 2.0 * COALESCE_EPS);
        }
    }

    #[cfg(not(feature = "slow-asserts"))]
    fn check_invariants(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(xl: f64, xr: f64) -> Span {
        Span {
            xl_top: xl,
            xr_top: xr,
            xl_bot: xl,
            xr_bot: xr,
        }
    }

    fn tracker() -> Coalescer {
        Coalescer::new(false, true, false, 1 << 20)
    }

    #[test]
    fn straight_column_stays_at_four_vertices() {
        let mut co = tracker();
        for i in 0..10 {
            let y = i as f64;
            co.step(y, y + 1.0, &[span(0.0, 4.0)]).unwrap();
        }
        co.step(10.0, 10.0, &[]).unwrap();
        let path = co.finish();
        assert_eq!(path.subpaths.len(), 1);
        assert_eq!(path.subpaths[0].points.len(), 4);
        assert_eq!(path.subpaths[0].signed_area(), 40.0);
    }

    #[test]
    fn separate_columns_make_separate_subpaths() {
        let mut co = tracker();
        co.step(0.0, 5.0, &[span(0.0, 2.0), span(10.0, 12.0)]).unwrap();
        co.step(5.0, 5.0, &[]).unwrap();
        let path = co.finish();
        assert_eq!(path.subpaths.len(), 2);
        assert_eq!(path.signed_area(), 20.0);
    }

    #[test]
    fn pinch_joins_only_under_touch_join() {
        // A lobe narrowing to a point at y=2, then widening again: the two
        // lobes meet only at (2, 2).
        let upper = Span {
            xl_top: 0.0,
            xr_top: 4.0,
            xl_bot: 2.0,
            xr_bot: 2.0,
        };
        let lower = Span {
            xl_top: 2.0,
            xr_top: 2.0,
            xl_bot: 0.0,
            xr_bot: 4.0,
        };

        let mut strict = Coalescer::new(false, true, false, 1 << 20);
        strict.step(0.0, 2.0, &[upper]).unwrap();
        strict.step(2.0, 4.0, &[lower]).unwrap();
        strict.step(4.0, 4.0, &[]).unwrap();
        assert_eq!(strict.finish().subpaths.len(), 2);

        let mut parity = Coalescer::new(true, true, false, 1 << 20);
        parity.step(0.0, 2.0, &[upper]).unwrap();
        parity.step(2.0, 4.0, &[lower]).unwrap();
        parity.step(4.0, 4.0, &[]).unwrap();
        assert_eq!(parity.finish().subpaths.len(), 1);
    }

    #[test]
    fn splice_of_two_subpaths_keeps_area() {
        let mut co = tracker();
        // Two columns that widen and then get covered by one span.
        co.step(0.0, 2.0, &[span(0.0, 2.0), span(6.0, 8.0)]).unwrap();
        co.step(2.0, 4.0, &[span(0.0, 8.0)]).unwrap();
        co.step(4.0, 4.0, &[]).unwrap();
        let path = co.finish();
        assert_eq!(path.subpaths.len(), 1);
        assert_eq!(path.signed_area(), 2.0 * 2.0 * 2.0 + 8.0 * 2.0);
    }

    #[test]
    fn split_then_merge_produces_a_ring() {
        let mut co = tracker();
        co.step(0.0, 2.0, &[span(0.0, 10.0)]).unwrap();
        co.step(2.0, 8.0, &[span(0.0, 2.0), span(8.0, 10.0)]).unwrap();
        co.step(8.0, 10.0, &[span(0.0, 10.0)]).unwrap();
        co.step(10.0, 10.0, &[]).unwrap();
        let path = co.finish();
        assert_eq!(path.subpaths.len(), 2);
        let mut areas: Vec<f64> = path.subpaths.iter().map(|s| s.signed_area()).collect();
        areas.sort_by(|a, b| a.partial_cmp(b).unwrap());
        // Hole is wound opposite the outer boundary.
        assert_eq!(areas, vec![-36.0, 100.0]);
    }

    #[test]
    fn disabled_coalescing_is_still_area_correct() {
        let mut co = Coalescer::new(false, false, false, 1 << 20);
        for i in 0..10 {
            let y = i as f64;
            co.step(y, y + 1.0, &[span(0.0, 4.0)]).unwrap();
        }
        let path = co.finish();
        assert_eq!(path.subpaths.len(), 10);
        assert_eq!(path.signed_area(), 40.0);
    }

    #[test]
    fn node_budget_surfaces_as_exhausted() {
        let mut co = Coalescer::new(false, true, false, 3);
        let err = co
            .step(0.0, 1.0, &[span(0.0, 1.0), span(2.0, 3.0)])
            .unwrap_err();
        assert_eq!(err, Error::Exhausted);
    }
}
