//! Polyline-distance costs: lane-center attraction and lane-boundary
//! penalties.

use std::sync::Arc;

use crate::geometry::Polyline2;
use crate::{Dimension, MatX, Point2, VecX};

use super::Cost;

/// `0.5 · w · d²` where `d` is the distance from the configured position
/// dimensions to a polyline. Pulls a player toward a lane center.
#[derive(Clone)]
pub struct QuadraticPolylineCost {
    weight: f64,
    polyline: Arc<Polyline2>,
    dims: (Dimension, Dimension),
    name: String,
}

impl QuadraticPolylineCost {
    pub fn new(weight: f64, polyline: Arc<Polyline2>, dims: (Dimension, Dimension)) -> Self {
        Self {
            weight,
            polyline,
            dims,
            name: String::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    fn position(&self, input: &VecX) -> Point2 {
        Point2::new(input[self.dims.0], input[self.dims.1])
    }
}

impl Cost for QuadraticPolylineCost {
    fn evaluate(&self, _t: f64, input: &VecX) -> f64 {
        let closest = self.polyline.closest_point(&self.position(input));
        0.5 * self.weight * closest.signed_distance * closest.signed_distance
    }

    fn quadraticize(&self, _t: f64, input: &VecX, hess: &mut MatX, grad: &mut VecX) {
        let (dx, dy) = self.dims;
        let position = self.position(input);
        let closest = self.polyline.closest_point(&position);

        if closest.is_vertex {
            // Near a vertex the distance is isotropic in the position.
            let relative = position - closest.point;
            grad[dx] += self.weight * relative.x;
            grad[dy] += self.weight * relative.y;
            hess[(dx, dx)] += self.weight;
            hess[(dy, dy)] += self.weight;
        } else {
            let normal = self.polyline.segments()[closest.segment].right_normal();
            let scaled = self.weight * closest.signed_distance;
            grad[dx] += scaled * normal.x;
            grad[dy] += scaled * normal.y;
            hess[(dx, dx)] += self.weight * normal.x * normal.x;
            hess[(dy, dy)] += self.weight * normal.y * normal.y;
            let off = self.weight * normal.x * normal.y;
            hess[(dx, dy)] += off;
            hess[(dy, dx)] += off;
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// One-sided quadratic on the signed polyline distance beyond an offset:
/// penalizes crossing a lane boundary at `threshold` meters to the side of
/// the lane center.
#[derive(Clone)]
pub struct SemiquadraticPolylineCost {
    weight: f64,
    polyline: Arc<Polyline2>,
    dims: (Dimension, Dimension),
    threshold: f64,
    oriented_right: bool,
    name: String,
}

impl SemiquadraticPolylineCost {
    pub fn new(
        weight: f64,
        polyline: Arc<Polyline2>,
        dims: (Dimension, Dimension),
        threshold: f64,
        oriented_right: bool,
    ) -> Self {
        Self {
            weight,
            polyline,
            dims,
            threshold,
            oriented_right,
            name: String::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    fn violation(&self, signed_distance: f64) -> Option<f64> {
        if self.oriented_right && signed_distance > self.threshold {
            Some(signed_distance - self.threshold)
        } else if !self.oriented_right && signed_distance < self.threshold {
            Some(signed_distance - self.threshold)
        } else {
            None
        }
    }
}

impl Cost for SemiquadraticPolylineCost {
    fn evaluate(&self, _t: f64, input: &VecX) -> f64 {
        let position = Point2::new(input[self.dims.0], input[self.dims.1]);
        let closest = self.polyline.closest_point(&position);
        match self.violation(closest.signed_distance) {
            Some(delta) => 0.5 * self.weight * delta * delta,
            None => 0.0,
        }
    }

    fn quadraticize(&self, _t: f64, input: &VecX, hess: &mut MatX, grad: &mut VecX) {
        let (dx, dy) = self.dims;
        let position = Point2::new(input[dx], input[dy]);
        let closest = self.polyline.closest_point(&position);
        let Some(delta) = self.violation(closest.signed_distance) else {
            return;
        };

        let normal = self.polyline.segments()[closest.segment].right_normal();
        grad[dx] += self.weight * delta * normal.x;
        grad[dy] += self.weight * delta * normal.y;
        hess[(dx, dx)] += self.weight * normal.x * normal.x;
        hess[(dy, dy)] += self.weight * normal.y * normal.y;
        let off = self.weight * normal.x * normal.y;
        hess[(dx, dy)] += off;
        hess[(dy, dx)] += off;
    }

    fn name(&self) -> &str {
        &self.name
    }
}
