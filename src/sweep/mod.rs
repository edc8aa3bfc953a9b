//! The sweep-line normalizer.
//!
//! [`normalize`](crate::normalize) and the boolean combinator both funnel
//! into a common scan-beam loop over a segment arena, which hands the
//! emitted spans to the coalescing tracker.

pub(crate) mod coalesce;
mod normalize;

pub use normalize::{HorizontalPolicy, SweepOptions};
pub(crate) use normalize::{sweep, WindingRule};

/// One emitted trapezoid: the inside of the fill rule between two active
/// segments, over one scan beam.
///
/// The top edge runs from `xl_top` to `xr_top` at the beam's top, the
/// bottom edge from `xl_bot` to `xr_bot` at the beam's bottom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Span {
    pub xl_top: f64,
    pub xr_top: f64,
    pub xl_bot: f64,
    pub xr_bot: f64,
}
