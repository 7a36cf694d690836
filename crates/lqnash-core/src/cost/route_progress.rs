//! Nominal route-progress cost
//!
//! Penalizes deviation of a player's arc-length progress along a route
//! from a nominal progression at constant speed. Unlike a plain speed
//! cost this keeps pulling the player forward along the lane even when
//! blocked, which is what produces merging and yielding behavior.

use std::sync::Arc;

use crate::geometry::Polyline2;
use crate::{Dimension, MatX, Point2, VecX};

use super::Cost;

/// `0.5 · w · (s(p) − (s₀ + v_nominal · t))²`, with `s(p)` the arc length
/// of the closest point on the route.
#[derive(Clone)]
pub struct RouteProgressCost {
    weight: f64,
    nominal_speed: f64,
    polyline: Arc<Polyline2>,
    dims: (Dimension, Dimension),
    initial_progress: f64,
    name: String,
}

impl RouteProgressCost {
    pub fn new(
        weight: f64,
        nominal_speed: f64,
        polyline: Arc<Polyline2>,
        dims: (Dimension, Dimension),
        initial_progress: f64,
    ) -> Self {
        Self {
            weight,
            nominal_speed,
            polyline,
            dims,
            initial_progress,
            name: String::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    fn progress_error(&self, t: f64, input: &VecX) -> (f64, Point2) {
        let position = Point2::new(input[self.dims.0], input[self.dims.1]);
        let closest = self.polyline.closest_point(&position);
        let target = self.initial_progress + self.nominal_speed * t;
        let tangent = *self.polyline.segments()[closest.segment].unit_direction();
        (closest.arc_length - target, tangent)
    }
}

impl Cost for RouteProgressCost {
    fn evaluate(&self, t: f64, input: &VecX) -> f64 {
        let (error, _) = self.progress_error(t, input);
        0.5 * self.weight * error * error
    }

    fn quadraticize(&self, t: f64, input: &VecX, hess: &mut MatX, grad: &mut VecX) {
        let (dx, dy) = self.dims;
        let (error, tangent) = self.progress_error(t, input);

        // Arc length varies along the local tangent direction.
        grad[dx] += self.weight * error * tangent.x;
        grad[dy] += self.weight * error * tangent.y;
        hess[(dx, dx)] += self.weight * tangent.x * tangent.x;
        hess[(dy, dy)] += self.weight * tangent.y * tangent.y;
        let off = self.weight * tangent.x * tangent.y;
        hess[(dx, dy)] += off;
        hess[(dy, dx)] += off;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::test_support::check_quadraticization;
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    fn straight_route() -> Arc<Polyline2> {
        Arc::new(Polyline2::new(&[
            Point2::new(0.0, 0.0),
            Point2::new(200.0, 0.0),
        ]))
    }

    #[test]
    fn test_on_schedule_is_free() {
        let cost = RouteProgressCost::new(10.0, 10.0, straight_route(), (0, 1), 5.0);
        // After 2 s the nominal progress is 25 m.
        assert_relative_eq!(cost.evaluate(2.0, &dvector![25.0, 0.0]), 0.0);
    }

    #[test]
    fn test_behind_schedule() {
        let cost = RouteProgressCost::new(10.0, 10.0, straight_route(), (0, 1), 0.0);
        let x = dvector![15.0, 0.5];
        // 5 m behind the 20 m target at t = 2.
        assert_relative_eq!(cost.evaluate(2.0, &x), 125.0);
        check_quadraticization(&cost, 2.0, &x, 1e-5);
    }

    #[test]
    fn test_progress_measured_along_route() {
        // Lateral offset does not change the progress error.
        let cost = RouteProgressCost::new(10.0, 10.0, straight_route(), (0, 1), 0.0);
        assert_relative_eq!(
            cost.evaluate(1.0, &dvector![12.0, 0.0]),
            cost.evaluate(1.0, &dvector![12.0, 3.0]),
        );
    }
}
