#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

mod clip;
mod combine;
mod geom;
mod num;
mod path;
mod segments;
pub mod sweep;

pub use clip::{
    resolve_chain, ClipOutcome, ClipRecord, Flatten, NoFlatten, RecordFlags, RegionKind,
};
pub use combine::intersect_paths;
pub use geom::Point;
pub use path::{Path, SubPath};
pub use segments::{SegIdx, Segment, Segments};
pub use sweep::{HorizontalPolicy, SweepOptions};

use kurbo::Rect;

/// A fill rule tells us how to decide whether a point is "inside" a path.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FillRule {
    /// The point is "inside" if its winding number is non-zero.
    NonZero,
    /// The point is "inside" if its winding number is odd.
    EvenOdd,
}

/// The ways a clip operation can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The output-vertex budget ran out.
    ///
    /// Normalized output can be quadratically larger than its input, so the
    /// sweep carries a budget instead of letting a hostile path exhaust
    /// memory. The partial output is discarded.
    Exhausted,
    /// The caller's cancel callback fired.
    Cancelled,
    /// An input coordinate was infinite or NaN.
    NonFinite,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Exhausted => write!(f, "output-vertex budget exhausted"),
            Error::Cancelled => write!(f, "the operation was cancelled"),
            Error::NonFinite => write!(f, "one of the inputs was infinite or NaN"),
        }
    }
}

impl std::error::Error for Error {}

/// Compatibility switches for clip-chain resolution.
///
/// These exist to reproduce the observable behavior of interpreters that
/// differ on the edge cases. Each flag defaults to the standard behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompatFlags {
    /// Treat a degenerate record at the top of a chain as "clip to the whole
    /// device" instead of "clip to nothing".
    pub degenerate_is_device: bool,
    /// Trust records marked as already normalized and skip re-sweeping them.
    pub use_cached_normalized: bool,
    /// Collapse runs of rectangular records into a single bounding-box
    /// intersection without sweeping.
    pub eliminate_rectangles: bool,
    /// Return a chain consisting of one well-behaved complex record as-is,
    /// without sweeping it.
    pub single_passthrough: bool,
    /// Coalesce output spans across scan beams. Off reproduces renderers
    /// that emit one trapezoid per beam.
    pub coalesce: bool,
}

impl Default for CompatFlags {
    fn default() -> Self {
        CompatFlags {
            degenerate_is_device: false,
            use_cached_normalized: true,
            eliminate_rectangles: true,
            single_passthrough: true,
            coalesce: true,
        }
    }
}

/// Everything ambient to one clip operation: device geometry, compatibility
/// switches, and the cancellation hook.
///
/// A context borrows its cancel callback, so it is built per operation and
/// threaded by reference through the whole resolution.
#[derive(Clone, Copy)]
pub struct ClipContext<'a> {
    /// The device page rectangle. Every resolved region is implicitly
    /// clipped to it.
    pub device_bounds: Rect,
    /// An optional further restriction, for banded rendering.
    pub aux_bounds: Option<Rect>,
    /// Compatibility switches.
    pub compat: CompatFlags,
    /// Polled once per scan beam; returning `true` aborts the operation
    /// with [`Error::Cancelled`].
    pub cancel: Option<&'a dyn Fn() -> bool>,
}

impl std::fmt::Debug for ClipContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipContext")
            .field("device_bounds", &self.device_bounds)
            .field("aux_bounds", &self.aux_bounds)
            .field("compat", &self.compat)
            .field("cancel", &self.cancel.map(|_| "..."))
            .finish()
    }
}

impl<'a> ClipContext<'a> {
    /// A context with default compatibility flags and no cancellation.
    pub fn new(device_bounds: Rect) -> Self {
        ClipContext {
            device_bounds,
            aux_bounds: None,
            compat: CompatFlags::default(),
            cancel: None,
        }
    }

    /// The device bounds, further restricted by the auxiliary bounds.
    pub fn effective_bounds(&self) -> Rect {
        match self.aux_bounds {
            Some(aux) => self.device_bounds.intersect(aux),
            None => self.device_bounds,
        }
    }

    pub(crate) fn poll(&self) -> Result<(), Error> {
        match self.cancel {
            Some(cancel) if cancel() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Normalizes a path: resolves self-intersections and winding under `rule`
/// and returns the same region as pairwise-disjoint simple subpaths, each
/// with positive area for an outer boundary and negative area for a hole.
pub fn normalize(
    path: Path,
    rule: FillRule,
    opts: &SweepOptions,
    ctx: &ClipContext<'_>,
) -> Result<Path, Error> {
    if !path.is_finite() {
        return Err(Error::NonFinite);
    }
    let mut segments = Segments::default();
    segments.add_path(path);
    sweep::sweep(&segments, rule.into(), opts, ctx)
}
