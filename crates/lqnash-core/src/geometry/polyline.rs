//! Piecewise-linear curves with arc-length bookkeeping.

use crate::Point2;

use super::LineSegment2;

/// Result of a closest-point query against a [`Polyline2`].
#[derive(Debug, Clone)]
pub struct ClosestPoint {
    /// Closest point on the polyline.
    pub point: Point2,
    /// Signed distance from the query point to the polyline; positive on
    /// the right of the direction of travel.
    pub signed_distance: f64,
    /// Arc length of the closest point, measured from the first vertex.
    pub arc_length: f64,
    /// Index of the segment containing the closest point.
    pub segment: usize,
    /// True when the closest point is an interior vertex of the polyline
    /// rather than the interior of a segment.
    pub is_vertex: bool,
}

/// A polyline through an ordered list of planar points.
#[derive(Debug, Clone)]
pub struct Polyline2 {
    segments: Vec<LineSegment2>,
    /// Arc length at the start of each segment.
    cumulative_lengths: Vec<f64>,
    length: f64,
}

impl Polyline2 {
    /// Build a polyline through `points`, in order.
    ///
    /// At least two points are required; consecutive duplicates are not
    /// allowed (they would create degenerate segments).
    pub fn new(points: &[Point2]) -> Self {
        assert!(points.len() >= 2, "polyline needs at least two points");
        let mut segments = Vec::with_capacity(points.len() - 1);
        let mut cumulative_lengths = Vec::with_capacity(points.len() - 1);
        let mut length = 0.0;
        for pair in points.windows(2) {
            segments.push(LineSegment2::new(pair[0], pair[1]));
            cumulative_lengths.push(length);
            length += segments.last().map(LineSegment2::length).unwrap_or(0.0);
        }
        Self {
            segments,
            cumulative_lengths,
            length,
        }
    }

    pub fn segments(&self) -> &[LineSegment2] {
        &self.segments
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Point at a given arc length, clamped to the polyline's extent.
    pub fn point_at(&self, arc_length: f64) -> Point2 {
        let s = arc_length.clamp(0.0, self.length);
        let idx = match self
            .cumulative_lengths
            .binary_search_by(|start| start.partial_cmp(&s).unwrap())
        {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        };
        let segment = &self.segments[idx];
        segment.start() + segment.unit_direction() * (s - self.cumulative_lengths[idx])
    }

    /// Closest point on the polyline to `point`.
    pub fn closest_point(&self, point: &Point2) -> ClosestPoint {
        let mut best: Option<ClosestPoint> = None;
        let mut best_distance_sq = f64::INFINITY;

        for (idx, segment) in self.segments.iter().enumerate() {
            let (candidate, projection, interior) = segment.closest_point(point);
            let distance_sq = (point - candidate).norm_squared();
            if distance_sq < best_distance_sq {
                best_distance_sq = distance_sq;
                // Endpoints of interior segments are shared vertices; the
                // first and last vertex of the whole polyline count as
                // vertices too so that callers can fall back to an
                // isotropic quadratic there.
                let is_vertex = !interior;
                best = Some(ClosestPoint {
                    point: candidate,
                    signed_distance: segment.signed_distance(point),
                    arc_length: self.cumulative_lengths[idx] + projection,
                    segment: idx,
                    is_vertex,
                });
            }
        }

        best.unwrap()
    }
}
