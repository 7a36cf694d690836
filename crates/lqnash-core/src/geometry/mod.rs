//! Planar geometry for lane-based costs
//!
//! Line segments and polylines with the side convention used by the
//! lane-boundary costs: signed distance is positive to the *right* of the
//! direction of travel.

mod line_segment;
mod polyline;

pub use line_segment::LineSegment2;
pub use polyline::{ClosestPoint, Polyline2};
